//! Foundation types for the charity program ledger.
//!
//! Every other crate in the workspace depends on `charity-types`.
//!
//! # Key Types
//!
//! - [`AccountId`]: 32-byte party identifier; the zero id is reserved
//! - [`Amount`]: checked fund quantity in the smallest unit
//! - [`Timestamp`]: unix-seconds instant used for deadlines
//! - [`ProgramIndex`]: creation-order position of a program

pub mod account;
pub mod amount;
pub mod error;
pub mod index;
pub mod time;

pub use account::AccountId;
pub use amount::Amount;
pub use error::TypeError;
pub use index::ProgramIndex;
pub use time::Timestamp;
