use charity_types::{AccountId, Amount};

/// Errors produced by a [`FundsGateway`](crate::funds::FundsGateway).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FundsError {
    #[error("insufficient balance in {account}: available {available}, requested {requested}")]
    InsufficientBalance {
        account: AccountId,
        available: Amount,
        requested: Amount,
    },

    #[error("account {0} is frozen")]
    AccountFrozen(AccountId),

    #[error("balance overflow in {0}")]
    Overflow(AccountId),
}

/// Errors produced by ledger operations.
///
/// Display strings for the business-rule kinds are the revert reasons that
/// existing front ends match on, so a UI can render the exact cause.
/// Every error leaves the ledger untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid receiver address")]
    InvalidReceiver,

    #[error("Title is required")]
    MissingTitle,

    #[error("Description is required")]
    MissingDescription,

    #[error("{field} exceeds {max} bytes")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("Deadline should be in the future")]
    DeadlineNotFuture,

    #[error("Program is in progress")]
    ProgramInProgress,

    #[error("Program is invalid")]
    ProgramInvalid,

    #[error("Deadline has passed")]
    DeadlineExpired,

    #[error("Donation amount should be greater than 1 wei")]
    DonationTooSmall,

    #[error("Program not found")]
    NotFound,

    #[error("donation total would overflow")]
    AmountOverflow,

    #[error("funds transfer failed: {0}")]
    Funds(#[from] FundsError),

    #[error("invalid ledger configuration: {0}")]
    InvalidConfig(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Every revert reason an integration may match for this error.
    ///
    /// Expired programs historically surfaced as either "Program has
    /// finished" or "Deadline has passed"; both map to
    /// [`LedgerError::DeadlineExpired`].
    pub fn legacy_reasons(&self) -> &'static [&'static str] {
        match self {
            Self::InvalidReceiver => &["Invalid receiver address"],
            Self::MissingTitle => &["Title is required"],
            Self::MissingDescription => &["Description is required"],
            Self::DeadlineNotFuture => &["Deadline should be in the future"],
            Self::ProgramInProgress => &["Program is in progress"],
            Self::ProgramInvalid => &["Program is invalid"],
            Self::DeadlineExpired => &["Program has finished", "Deadline has passed"],
            Self::DonationTooSmall => &["Donation amount should be greater than 1 wei"],
            Self::NotFound => &["Program not found"],
            _ => &[],
        }
    }

    /// Whether a caller could succeed by retrying the same call later
    /// without changing its arguments.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Funds(_) | Self::Internal(_))
    }
}

/// Convenience alias used throughout the ledger crate.
pub type LedgerResult<T> = Result<T, LedgerError>;
