/// Errors produced by the event bus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// Broadcast channels need room for at least one event.
    #[error("invalid channel capacity {0}: must be at least 1")]
    InvalidCapacity(usize),
}

/// Convenience alias used throughout the events crate.
pub type Result<T> = std::result::Result<T, EventError>;
