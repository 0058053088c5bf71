use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use charity_ledger::{
    AuditReport, EventFilter, EventStream, InMemoryBank, InMemoryProgramLedger, LedgerAuditor,
    ManualClock, ProgramEvent, ProgramRequest, ProgramSummary, ProgramWriter, ProjectionBuilder,
};
use charity_types::{AccountId, Amount, Timestamp};

use crate::config::CliConfig;

/// A scripted ledger session, read from JSON.
///
/// ```json
/// {
///   "accounts": { "D1": 10 },
///   "steps": [
///     { "op": "create", "receiver": "R1", "title": "Clean Water",
///       "description": "desc", "deadline_in": 3600 },
///     { "op": "donate", "donor": "D1", "receiver": "R1", "amount": 1 },
///     { "op": "advance", "secs": 60 },
///     { "op": "cancel", "caller": "R1" }
///   ]
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Opening balances; merged over the config's, script wins.
    #[serde(default)]
    pub accounts: BTreeMap<String, u64>,
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Create {
        receiver: String,
        title: String,
        description: String,
        #[serde(default)]
        image: String,
        /// Deadline relative to the session clock, in seconds. May be zero
        /// to exercise the past-deadline rejection.
        deadline_in: u64,
    },
    Donate {
        donor: String,
        receiver: String,
        amount: u64,
    },
    Complete {
        caller: String,
    },
    Cancel {
        caller: String,
    },
    Advance {
        secs: u64,
    },
}

impl Step {
    pub fn op(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Donate { .. } => "donate",
            Self::Complete { .. } => "complete",
            Self::Cancel { .. } => "cancel",
            Self::Advance { .. } => "advance",
        }
    }
}

impl Script {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing script {}", path.display()))
    }
}

/// What happened at one step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: usize,
    pub op: &'static str,
    pub ok: bool,
    pub detail: String,
}

/// Everything a finished session produced.
#[derive(Clone, Debug, Serialize)]
pub struct SessionReport {
    pub outcomes: Vec<StepOutcome>,
    pub events: Vec<ProgramEvent>,
    pub programs: Vec<ProgramSummary>,
    pub balances: BTreeMap<String, Amount>,
    pub audit: AuditReport,
}

/// An in-memory ledger on a manual clock, with account labels kept for
/// display.
pub struct Session {
    clock: Arc<ManualClock>,
    bank: Arc<InMemoryBank>,
    ledger: InMemoryProgramLedger,
    events: EventStream,
    names: HashMap<AccountId, String>,
}

impl Session {
    pub fn new(config: &CliConfig, script: &Script) -> anyhow::Result<Self> {
        let start = config
            .start_time
            .map(Timestamp::from_secs)
            .unwrap_or_else(Timestamp::now);
        let clock = Arc::new(ManualClock::new(start));
        let bank = Arc::new(InMemoryBank::new());
        let ledger =
            InMemoryProgramLedger::with_parts(config.ledger.clone(), clock.clone(), bank.clone())?;
        let events = ledger.subscribe(EventFilter::default());

        let mut session = Self {
            clock,
            bank,
            ledger,
            events,
            names: HashMap::new(),
        };

        let mut balances = config.accounts.clone();
        balances.extend(script.accounts.iter().map(|(k, v)| (k.clone(), *v)));
        for (name, units) in balances {
            let account = session.account(&name)?;
            session.bank.set_balance(account, Amount::new(units));
        }
        info!(start = %start, accounts = session.names.len(), "session ready");
        Ok(session)
    }

    /// Resolve a script account reference, remembering its label.
    fn account(&mut self, reference: &str) -> anyhow::Result<AccountId> {
        let account = AccountId::parse(reference)
            .with_context(|| format!("invalid account reference {reference:?}"))?;
        self.names
            .entry(account)
            .or_insert_with(|| reference.trim().to_string());
        Ok(account)
    }

    pub fn name(&self, account: &AccountId) -> String {
        self.names
            .get(account)
            .cloned()
            .unwrap_or_else(|| account.short_id())
    }

    /// Run every step; a rejected step is recorded and the session goes on.
    pub fn run(mut self, script: &Script) -> anyhow::Result<SessionReport> {
        let mut outcomes = Vec::with_capacity(script.steps.len());
        let mut events = Vec::new();

        for (i, step) in script.steps.iter().enumerate() {
            let result = self.apply(step)?;
            let (ok, detail) = match result {
                Ok(detail) => (true, detail),
                Err(error) => (false, error.to_string()),
            };
            debug!(step = i + 1, op = step.op(), ok, %detail, "step applied");
            outcomes.push(StepOutcome {
                step: i + 1,
                op: step.op(),
                ok,
                detail,
            });
            while let Ok(event) = self.events.try_recv() {
                events.push(event);
            }
        }

        let programs = ProjectionBuilder::summaries(&self.ledger)?;
        let audit = LedgerAuditor::audit(&self.ledger)?;
        let balances = self
            .names
            .iter()
            .map(|(account, name)| (name.clone(), self.bank.balance(account)))
            .collect();

        Ok(SessionReport {
            outcomes,
            events,
            programs,
            balances,
            audit,
        })
    }

    /// The outer error is a malformed script; the inner one is the ledger
    /// rejecting the call.
    fn apply(
        &mut self,
        step: &Step,
    ) -> anyhow::Result<Result<String, charity_ledger::LedgerError>> {
        Ok(match step {
            Step::Create {
                receiver,
                title,
                description,
                image,
                deadline_in,
            } => {
                let receiver = self.account(receiver)?;
                let deadline = self.ledger.now().plus_secs(*deadline_in);
                let request =
                    ProgramRequest::new(receiver, title, description, image.as_str(), deadline);
                self.ledger
                    .create_program(request)
                    .map(|key| format!("program {} for {}", key.index, self.name(&receiver)))
            }
            Step::Donate {
                donor,
                receiver,
                amount,
            } => {
                let donor = self.account(donor)?;
                let receiver = self.account(receiver)?;
                self.ledger
                    .send_donation(&donor, &receiver, Amount::new(*amount))
                    .map(|d| {
                        format!(
                            "{} gave {} to {}",
                            self.name(&donor),
                            d.amount,
                            self.name(&receiver)
                        )
                    })
            }
            Step::Complete { caller } => {
                let caller = self.account(caller)?;
                self.ledger
                    .complete_program(&caller)
                    .map(|key| format!("program {} completed", key.index))
            }
            Step::Cancel { caller } => {
                let caller = self.account(caller)?;
                self.ledger
                    .cancel_program(&caller)
                    .map(|refunds| format!("cancelled, {} refund(s)", refunds.len()))
            }
            Step::Advance { secs } => {
                let now = self.clock.advance(*secs);
                Ok(format!("clock at {now}"))
            }
        })
    }
}
