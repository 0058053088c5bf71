use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use charity_events::{EventBus, EventFilter, EventKind, EventPayload, EventStream};
use charity_types::{AccountId, Amount, ProgramIndex, Timestamp};

use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::funds::FundsGateway;
use crate::program::{Donation, Payout, Program, ProgramKey, ProgramRequest, ProgramStatus};
use crate::traits::{ProgramReader, ProgramWriter};

/// The authoritative in-memory program ledger.
///
/// All mutating calls serialize on one write lock. A call's validation,
/// its gateway transfer, its record update, and its event emission all
/// happen under that lock, so a rejected or failed call leaves no trace
/// and events are delivered in commit order.
pub struct InMemoryProgramLedger {
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
    funds: Arc<dyn FundsGateway>,
    events: EventBus,
    inner: RwLock<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    /// Creation order; a program's index is its position here.
    programs: Vec<Program>,
    by_receiver: HashMap<AccountId, Vec<ProgramIndex>>,
}

impl LedgerState {
    fn latest_index(&self, receiver: &AccountId) -> Option<ProgramIndex> {
        self.by_receiver
            .get(receiver)
            .and_then(|indices| indices.last())
            .copied()
    }

    fn latest(&self, receiver: &AccountId) -> Option<&Program> {
        self.latest_index(receiver)
            .and_then(|index| self.programs.get(index.as_usize()))
    }

    fn latest_mut(&mut self, receiver: &AccountId) -> Option<&mut Program> {
        let index = self.latest_index(receiver)?;
        self.programs.get_mut(index.as_usize())
    }
}

impl InMemoryProgramLedger {
    /// A ledger on wall-clock time with the default configuration.
    pub fn new(funds: Arc<dyn FundsGateway>) -> Self {
        Self {
            config: LedgerConfig::default(),
            clock: Arc::new(SystemClock),
            funds,
            events: EventBus::default(),
            inner: RwLock::new(LedgerState::default()),
        }
    }

    pub fn with_parts(
        config: LedgerConfig,
        clock: Arc<dyn Clock>,
        funds: Arc<dyn FundsGateway>,
    ) -> LedgerResult<Self> {
        let events = EventBus::new(config.event_capacity)
            .map_err(|e| LedgerError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            config,
            clock,
            funds,
            events,
            inner: RwLock::new(LedgerState::default()),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Subscribe to lifecycle notifications emitted after this call.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.events.subscribe(filter)
    }

    fn read_state(&self) -> LedgerResult<RwLockReadGuard<'_, LedgerState>> {
        self.inner
            .read()
            .map_err(|_| LedgerError::Internal("ledger read lock poisoned".into()))
    }

    fn write_state(&self) -> LedgerResult<RwLockWriteGuard<'_, LedgerState>> {
        self.inner
            .write()
            .map_err(|_| LedgerError::Internal("ledger write lock poisoned".into()))
    }

    fn check_text(&self, field: &'static str, value: &str) -> LedgerResult<()> {
        if value.len() > self.config.max_text_len {
            return Err(LedgerError::FieldTooLong {
                field,
                max: self.config.max_text_len,
            });
        }
        Ok(())
    }

    fn validate_request(
        &self,
        state: &LedgerState,
        request: &ProgramRequest,
        now: Timestamp,
    ) -> LedgerResult<()> {
        if request.receiver.is_zero() {
            return Err(LedgerError::InvalidReceiver);
        }
        if request.title.is_empty() {
            return Err(LedgerError::MissingTitle);
        }
        if request.description.is_empty() {
            return Err(LedgerError::MissingDescription);
        }
        self.check_text("title", &request.title)?;
        self.check_text("description", &request.description)?;
        self.check_text("image", &request.image)?;
        if !request.deadline.is_after(&now) {
            return Err(LedgerError::DeadlineNotFuture);
        }
        if state
            .latest(&request.receiver)
            .is_some_and(Program::is_active)
        {
            return Err(LedgerError::ProgramInProgress);
        }
        Ok(())
    }

    fn create_locked(&self, request: ProgramRequest) -> LedgerResult<ProgramKey> {
        let mut state = self.write_state()?;
        let now = self.clock.now();
        self.validate_request(&state, &request, now)?;

        let index = ProgramIndex::new(state.programs.len() as u64);
        let payload = EventPayload::Created {
            title: request.title.clone(),
            deadline: request.deadline,
        };
        let program = Program::open(index, request, now);
        let key = program.key();

        state.by_receiver.entry(key.receiver).or_default().push(index);
        state.programs.push(program);

        info!(receiver = %key.receiver, %index, "program created");
        self.events
            .emit(now, key.receiver, index, EventKind::ProgramCreated, payload);
        Ok(key)
    }

    fn donate_locked(
        &self,
        donor: &AccountId,
        receiver: &AccountId,
        amount: Amount,
    ) -> LedgerResult<Donation> {
        let mut state = self.write_state()?;
        let now = self.clock.now();

        let program = state
            .latest_mut(receiver)
            .ok_or(LedgerError::ProgramInvalid)?;
        if !program.is_active() {
            return Err(LedgerError::ProgramInvalid);
        }
        if program.is_expired(now) {
            return Err(LedgerError::DeadlineExpired);
        }
        if amount.is_zero() {
            return Err(LedgerError::DonationTooSmall);
        }
        let collected = program
            .collected
            .checked_add(amount)
            .ok_or(LedgerError::AmountOverflow)?;
        let escrow = program
            .escrow
            .checked_add(amount)
            .ok_or(LedgerError::AmountOverflow)?;

        // Last fallible step: once funds are in custody the record must land.
        self.funds.withdraw(donor, amount)?;

        let donation = Donation {
            donor: *donor,
            amount,
        };
        program.donations.push(donation);
        program.collected = collected;
        program.escrow = escrow;
        let index = program.index;

        info!(%receiver, %index, %donor, %amount, %collected, "donation accepted");
        self.events.emit(
            now,
            *receiver,
            index,
            EventKind::DonationReceived,
            EventPayload::Donation {
                donor: *donor,
                amount,
                collected,
            },
        );
        Ok(donation)
    }

    /// Look up the caller's program for termination.
    fn active_program<'a>(
        state: &'a mut LedgerState,
        caller: &AccountId,
    ) -> LedgerResult<&'a mut Program> {
        let program = state.latest_mut(caller).ok_or(LedgerError::NotFound)?;
        if !program.is_active() {
            return Err(LedgerError::ProgramInvalid);
        }
        Ok(program)
    }

    fn complete_locked(&self, caller: &AccountId) -> LedgerResult<ProgramKey> {
        let mut state = self.write_state()?;
        let now = self.clock.now();
        let program = Self::active_program(&mut state, caller)?;

        let released = program.escrow;
        if !released.is_zero() {
            self.funds.deposit_batch(&[Payout {
                to: program.receiver,
                amount: released,
            }])?;
        }
        program.status = ProgramStatus::Completed;
        program.escrow = Amount::ZERO;
        let key = program.key();

        info!(receiver = %key.receiver, index = %key.index, %released, "program completed");
        self.events.emit(
            now,
            key.receiver,
            key.index,
            EventKind::ProgramCompleted,
            EventPayload::Completed { released },
        );
        Ok(key)
    }

    fn cancel_locked(&self, caller: &AccountId) -> LedgerResult<Vec<Payout>> {
        let mut state = self.write_state()?;
        let now = self.clock.now();
        let program = Self::active_program(&mut state, caller)?;

        let refunds = program.refund_plan();
        let refunded = program.escrow;
        if !refunds.is_empty() {
            self.funds.deposit_batch(&refunds)?;
        }
        program.status = ProgramStatus::Cancelled;
        program.escrow = Amount::ZERO;
        let key = program.key();

        info!(
            receiver = %key.receiver,
            index = %key.index,
            %refunded,
            refunds = refunds.len(),
            "program cancelled"
        );
        self.events.emit(
            now,
            key.receiver,
            key.index,
            EventKind::ProgramCancelled,
            EventPayload::Cancelled {
                refunded,
                refunds: refunds.len() as u64,
            },
        );
        Ok(refunds)
    }
}

impl ProgramWriter for InMemoryProgramLedger {
    fn create_program(&self, request: ProgramRequest) -> LedgerResult<ProgramKey> {
        let receiver = request.receiver;
        self.create_locked(request).inspect_err(|error| {
            debug!(%receiver, %error, "program creation rejected");
        })
    }

    fn send_donation(
        &self,
        donor: &AccountId,
        receiver: &AccountId,
        amount: Amount,
    ) -> LedgerResult<Donation> {
        self.donate_locked(donor, receiver, amount)
            .inspect_err(|error| {
                debug!(%donor, %receiver, %amount, %error, "donation rejected");
            })
    }

    fn complete_program(&self, caller: &AccountId) -> LedgerResult<ProgramKey> {
        self.complete_locked(caller).inspect_err(|error| {
            debug!(%caller, %error, "completion rejected");
        })
    }

    fn cancel_program(&self, caller: &AccountId) -> LedgerResult<Vec<Payout>> {
        self.cancel_locked(caller).inspect_err(|error| {
            debug!(%caller, %error, "cancellation rejected");
        })
    }
}

impl ProgramReader for InMemoryProgramLedger {
    fn get_all_programs(&self) -> LedgerResult<Vec<Program>> {
        Ok(self.read_state()?.programs.clone())
    }

    fn get_donations(&self, receiver: &AccountId) -> LedgerResult<Vec<Donation>> {
        let state = self.read_state()?;
        state
            .latest(receiver)
            .map(|p| p.donations.clone())
            .ok_or(LedgerError::NotFound)
    }

    fn get_program(&self, receiver: &AccountId) -> LedgerResult<Option<Program>> {
        Ok(self.read_state()?.latest(receiver).cloned())
    }

    fn get_program_by_index(&self, index: ProgramIndex) -> LedgerResult<Option<Program>> {
        Ok(self.read_state()?.programs.get(index.as_usize()).cloned())
    }

    fn program_history(&self, receiver: &AccountId) -> LedgerResult<Vec<Program>> {
        let state = self.read_state()?;
        let Some(indices) = state.by_receiver.get(receiver) else {
            return Ok(vec![]);
        };
        Ok(indices
            .iter()
            .filter_map(|index| state.programs.get(index.as_usize()))
            .cloned()
            .collect())
    }

    fn program_count(&self) -> LedgerResult<u64> {
        Ok(self.read_state()?.programs.len() as u64)
    }

    fn escrow_balance(&self) -> LedgerResult<Amount> {
        let state = self.read_state()?;
        Amount::checked_sum(state.programs.iter().map(|p| p.escrow))
            .ok_or(LedgerError::AmountOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::FundsError;
    use crate::funds::InMemoryBank;

    const START: u64 = 1_700_000_000;

    struct Fixture {
        clock: Arc<ManualClock>,
        bank: Arc<InMemoryBank>,
        ledger: InMemoryProgramLedger,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(START)));
        let bank = Arc::new(InMemoryBank::with_balances([
            (donor(1), Amount::new(100)),
            (donor(2), Amount::new(100)),
        ]));
        let ledger =
            InMemoryProgramLedger::with_parts(LedgerConfig::default(), clock.clone(), bank.clone())
                .unwrap();
        Fixture { clock, bank, ledger }
    }

    fn receiver() -> AccountId {
        AccountId::from_label("R1")
    }

    fn donor(n: u8) -> AccountId {
        AccountId::from_label(&format!("D{n}"))
    }

    fn request(receiver: AccountId, deadline_in: u64) -> ProgramRequest {
        ProgramRequest::new(
            receiver,
            "Clean Water",
            "desc",
            "ipfs://water",
            Timestamp::from_secs(START + deadline_in),
        )
    }

    #[test]
    fn create_rejections_follow_check_order() {
        let f = fixture();

        let mut r = request(AccountId::ZERO, 0);
        r.title.clear();
        assert_eq!(f.ledger.create_program(r).unwrap_err(), LedgerError::InvalidReceiver);

        let mut r = request(receiver(), 0);
        r.title.clear();
        r.description.clear();
        assert_eq!(f.ledger.create_program(r).unwrap_err(), LedgerError::MissingTitle);

        let mut r = request(receiver(), 0);
        r.description.clear();
        assert_eq!(f.ledger.create_program(r).unwrap_err(), LedgerError::MissingDescription);

        assert_eq!(
            f.ledger.create_program(request(receiver(), 0)).unwrap_err(),
            LedgerError::DeadlineNotFuture
        );
        assert_eq!(f.ledger.program_count().unwrap(), 0);
    }

    #[test]
    fn oversized_fields_are_rejected() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(START)));
        let config = LedgerConfig {
            max_text_len: 8,
            ..LedgerConfig::default()
        };
        let ledger =
            InMemoryProgramLedger::with_parts(config, clock, Arc::new(InMemoryBank::new()))
                .unwrap();

        let mut r = request(receiver(), 10);
        r.title = "t".into();
        r.description = "d".into();
        r.image = "x".repeat(9);
        assert_eq!(
            ledger.create_program(r).unwrap_err(),
            LedgerError::FieldTooLong { field: "image", max: 8 }
        );

        r = request(receiver(), 10);
        r.title = "x".repeat(8);
        r.description = "d".into();
        r.image = String::new();
        ledger.create_program(r).unwrap();
    }

    #[test]
    fn oversized_fields_are_checked_title_then_description_then_image() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(START)));
        let config = LedgerConfig {
            max_text_len: 8,
            ..LedgerConfig::default()
        };
        let ledger =
            InMemoryProgramLedger::with_parts(config, clock, Arc::new(InMemoryBank::new()))
                .unwrap();
        let long = "x".repeat(9);

        let mut r = request(receiver(), 10);
        r.title = long.clone();
        r.description = long.clone();
        r.image = long.clone();
        assert_eq!(
            ledger.create_program(r.clone()).unwrap_err(),
            LedgerError::FieldTooLong { field: "title", max: 8 }
        );

        r.title = "t".into();
        assert_eq!(
            ledger.create_program(r.clone()).unwrap_err(),
            LedgerError::FieldTooLong { field: "description", max: 8 }
        );

        r.description = "d".into();
        assert_eq!(
            ledger.create_program(r).unwrap_err(),
            LedgerError::FieldTooLong { field: "image", max: 8 }
        );
        assert_eq!(ledger.program_count().unwrap(), 0);
    }

    #[test]
    fn whitespace_text_is_present() {
        let f = fixture();
        let mut r = request(receiver(), 1_000);
        r.title = " ".into();
        r.description = "   ".into();
        f.ledger.create_program(r).unwrap();
        assert_eq!(f.ledger.get_program(&receiver()).unwrap().unwrap().title, " ");
    }

    #[test]
    fn zero_event_capacity_is_invalid_config() {
        let config = LedgerConfig {
            event_capacity: 0,
            ..LedgerConfig::default()
        };
        let result = InMemoryProgramLedger::with_parts(
            config,
            Arc::new(SystemClock),
            Arc::new(InMemoryBank::new()),
        );
        assert!(matches!(result, Err(LedgerError::InvalidConfig(_))));
    }

    #[test]
    fn donation_moves_funds_into_escrow() {
        let f = fixture();
        f.ledger.create_program(request(receiver(), 3600)).unwrap();

        let donation = f
            .ledger
            .send_donation(&donor(1), &receiver(), Amount::new(5))
            .unwrap();
        assert_eq!(donation.amount, Amount::new(5));

        assert_eq!(f.bank.balance(&donor(1)), Amount::new(95));
        assert_eq!(f.bank.balance(&receiver()), Amount::ZERO);
        assert_eq!(f.ledger.escrow_balance().unwrap(), Amount::new(5));
    }

    #[test]
    fn donation_check_order() {
        let f = fixture();
        assert_eq!(
            f.ledger
                .send_donation(&donor(1), &receiver(), Amount::ZERO)
                .unwrap_err(),
            LedgerError::ProgramInvalid
        );

        f.ledger.create_program(request(receiver(), 10)).unwrap();
        f.clock.advance(11);
        assert_eq!(
            f.ledger
                .send_donation(&donor(1), &receiver(), Amount::ZERO)
                .unwrap_err(),
            LedgerError::DeadlineExpired
        );

        f.clock.set(Timestamp::from_secs(START));
        assert_eq!(
            f.ledger
                .send_donation(&donor(1), &receiver(), Amount::ZERO)
                .unwrap_err(),
            LedgerError::DonationTooSmall
        );
    }

    #[test]
    fn donation_at_deadline_instant_is_accepted() {
        let f = fixture();
        f.ledger.create_program(request(receiver(), 10)).unwrap();
        f.clock.advance(10);
        f.ledger
            .send_donation(&donor(1), &receiver(), Amount::new(1))
            .unwrap();
    }

    #[test]
    fn failed_withdrawal_records_nothing() {
        let f = fixture();
        f.ledger.create_program(request(receiver(), 3600)).unwrap();

        let err = f
            .ledger
            .send_donation(&donor(1), &receiver(), Amount::new(1_000))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Funds(FundsError::InsufficientBalance { .. })
        ));
        assert!(f.ledger.get_donations(&receiver()).unwrap().is_empty());
        assert_eq!(f.ledger.escrow_balance().unwrap(), Amount::ZERO);
        assert_eq!(f.bank.balance(&donor(1)), Amount::new(100));
    }

    #[test]
    fn donation_overflow_is_rejected_before_withdrawal() {
        let f = fixture();
        let whale = AccountId::from_label("whale");
        f.bank.set_balance(whale, Amount::new(u64::MAX));
        f.ledger.create_program(request(receiver(), 3600)).unwrap();
        f.ledger
            .send_donation(&donor(1), &receiver(), Amount::new(1))
            .unwrap();

        let err = f
            .ledger
            .send_donation(&whale, &receiver(), Amount::new(u64::MAX))
            .unwrap_err();
        assert_eq!(err, LedgerError::AmountOverflow);
        assert_eq!(f.bank.balance(&whale), Amount::new(u64::MAX));
    }

    #[test]
    fn complete_releases_escrow_to_receiver() {
        let f = fixture();
        f.ledger.create_program(request(receiver(), 3600)).unwrap();
        f.ledger
            .send_donation(&donor(1), &receiver(), Amount::new(1))
            .unwrap();
        f.ledger
            .send_donation(&donor(2), &receiver(), Amount::new(2))
            .unwrap();

        let key = f.ledger.complete_program(&receiver()).unwrap();
        assert_eq!(key.index, ProgramIndex::new(0));
        assert_eq!(f.bank.balance(&receiver()), Amount::new(3));
        assert_eq!(f.ledger.escrow_balance().unwrap(), Amount::ZERO);

        let program = f.ledger.get_program(&receiver()).unwrap().unwrap();
        assert_eq!(program.status, ProgramStatus::Completed);
        assert_eq!(program.collected, Amount::new(3));
    }

    #[test]
    fn termination_requires_an_existing_active_program() {
        let f = fixture();
        assert_eq!(
            f.ledger.complete_program(&receiver()).unwrap_err(),
            LedgerError::NotFound
        );
        assert_eq!(
            f.ledger.cancel_program(&receiver()).unwrap_err(),
            LedgerError::NotFound
        );

        f.ledger.create_program(request(receiver(), 3600)).unwrap();
        f.ledger.complete_program(&receiver()).unwrap();
        assert_eq!(
            f.ledger.complete_program(&receiver()).unwrap_err(),
            LedgerError::ProgramInvalid
        );
        assert_eq!(
            f.ledger.cancel_program(&receiver()).unwrap_err(),
            LedgerError::ProgramInvalid
        );
    }

    #[test]
    fn cancellation_is_all_or_nothing() {
        let f = fixture();
        f.ledger.create_program(request(receiver(), 3600)).unwrap();
        f.ledger
            .send_donation(&donor(1), &receiver(), Amount::new(1))
            .unwrap();
        f.ledger
            .send_donation(&donor(2), &receiver(), Amount::new(2))
            .unwrap();

        f.bank.freeze(donor(2));
        let err = f.ledger.cancel_program(&receiver()).unwrap_err();
        assert_eq!(err, LedgerError::Funds(FundsError::AccountFrozen(donor(2))));
        assert_eq!(f.bank.balance(&donor(1)), Amount::new(99));
        let program = f.ledger.get_program(&receiver()).unwrap().unwrap();
        assert!(program.is_active());
        assert_eq!(program.escrow, Amount::new(3));

        f.bank.unfreeze(&donor(2));
        let refunds = f.ledger.cancel_program(&receiver()).unwrap();
        assert_eq!(refunds.len(), 2);
        assert_eq!(f.bank.balance(&donor(1)), Amount::new(100));
        assert_eq!(f.bank.balance(&donor(2)), Amount::new(100));
    }

    #[test]
    fn receiver_can_start_again_after_termination() {
        let f = fixture();
        f.ledger.create_program(request(receiver(), 3600)).unwrap();
        f.ledger
            .send_donation(&donor(1), &receiver(), Amount::new(4))
            .unwrap();
        f.ledger.cancel_program(&receiver()).unwrap();

        let second = f.ledger.create_program(request(receiver(), 7200)).unwrap();
        assert_eq!(second.index, ProgramIndex::new(1));
        assert!(f.ledger.get_donations(&receiver()).unwrap().is_empty());

        let history = f.ledger.program_history(&receiver()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, ProgramStatus::Cancelled);
        assert_eq!(history[0].donations.len(), 1);
        assert!(history[1].is_active());
    }

    #[test]
    fn events_follow_commit_order() {
        let f = fixture();
        let mut stream = f.ledger.subscribe(EventFilter::default());

        f.ledger.create_program(request(receiver(), 3600)).unwrap();
        f.ledger
            .send_donation(&donor(1), &receiver(), Amount::new(2))
            .unwrap();
        let _ = f.ledger.send_donation(&donor(1), &receiver(), Amount::ZERO);
        f.ledger.complete_program(&receiver()).unwrap();

        let kinds: Vec<EventKind> = std::iter::from_fn(|| stream.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ProgramCreated,
                EventKind::DonationReceived,
                EventKind::ProgramCompleted,
            ]
        );
    }

    #[test]
    fn lookups_by_index_and_count() {
        let f = fixture();
        let other = AccountId::from_label("R2");
        f.ledger.create_program(request(receiver(), 3600)).unwrap();
        f.ledger.create_program(request(other, 3600)).unwrap();

        assert_eq!(f.ledger.program_count().unwrap(), 2);
        let second = f
            .ledger
            .get_program_by_index(ProgramIndex::new(1))
            .unwrap()
            .unwrap();
        assert_eq!(second.receiver, other);
        assert!(f
            .ledger
            .get_program_by_index(ProgramIndex::new(2))
            .unwrap()
            .is_none());
        assert!(f
            .ledger
            .program_history(&AccountId::from_label("nobody"))
            .unwrap()
            .is_empty());
    }
}
