//! Donation program ledger.
//!
//! A receiver registers a fundraising program, donors send funds against it,
//! and the receiver resolves it exactly once: completion releases the
//! escrowed funds to the receiver, cancellation refunds every donor.
//!
//! This crate provides:
//! - `ProgramWriter` / `ProgramReader` trait boundaries
//! - `InMemoryProgramLedger`, the authoritative implementation
//! - Escrow movement through a `FundsGateway` (`InMemoryBank` for tests and
//!   embedding)
//! - Invariant auditing and listing projections

pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod funds;
pub mod memory;
pub mod program;
pub mod projection;
pub mod traits;

pub use audit::{AuditReport, LedgerAuditor, Violation, ViolationKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use error::{FundsError, LedgerError, LedgerResult};
pub use funds::{FundsGateway, InMemoryBank};
pub use memory::InMemoryProgramLedger;
pub use program::{Donation, Payout, Program, ProgramKey, ProgramRequest, ProgramStatus};
pub use projection::{DonorTotal, ProgramSummary, ProjectionBuilder};
pub use traits::{ProgramReader, ProgramWriter};

pub use charity_events::{EventFilter, EventKind, EventPayload, EventStream, ProgramEvent};
