use charity_types::{AccountId, Amount, ProgramIndex};

use crate::error::LedgerError;
use crate::program::{Donation, Payout, Program, ProgramKey, ProgramRequest};

/// Write boundary: the four mutating ledger calls.
///
/// The `donor`/`caller` argument is the identity of whoever sent the call;
/// `complete_program` and `cancel_program` act on the caller's own program.
pub trait ProgramWriter: Send + Sync {
    fn create_program(&self, request: ProgramRequest) -> Result<ProgramKey, LedgerError>;

    fn send_donation(
        &self,
        donor: &AccountId,
        receiver: &AccountId,
        amount: Amount,
    ) -> Result<Donation, LedgerError>;

    /// Close the caller's active program and release its escrow to them.
    fn complete_program(&self, caller: &AccountId) -> Result<ProgramKey, LedgerError>;

    /// Close the caller's active program and refund every donation.
    fn cancel_program(&self, caller: &AccountId) -> Result<Vec<Payout>, LedgerError>;
}

/// Read boundary for enumeration and auditing.
pub trait ProgramReader: Send + Sync {
    /// Every program ever created, in creation order.
    fn get_all_programs(&self) -> Result<Vec<Program>, LedgerError>;

    /// Donations of the receiver's most recent program.
    fn get_donations(&self, receiver: &AccountId) -> Result<Vec<Donation>, LedgerError>;

    /// The receiver's most recent program, active or not.
    fn get_program(&self, receiver: &AccountId) -> Result<Option<Program>, LedgerError>;

    fn get_program_by_index(&self, index: ProgramIndex) -> Result<Option<Program>, LedgerError>;

    /// All programs a receiver has created, in creation order.
    fn program_history(&self, receiver: &AccountId) -> Result<Vec<Program>, LedgerError>;

    fn program_count(&self) -> Result<u64, LedgerError>;

    /// Funds currently held in custody across all programs.
    fn escrow_balance(&self) -> Result<Amount, LedgerError>;
}
