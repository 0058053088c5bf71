//! Program lifecycle notifications for the charity ledger.
//!
//! The ledger emits a [`ProgramEvent`] for every committed state change.
//! External listeners (a UI refreshing after a transaction, an indexer)
//! subscribe through an [`EventBus`] with an [`EventFilter`] and receive a
//! broadcast stream.

pub mod bus;
pub mod error;
pub mod event;

pub use bus::{EventBus, EventFilter, EventStream};
pub use error::EventError;
pub use event::{EventId, EventKind, EventPayload, ProgramEvent};
