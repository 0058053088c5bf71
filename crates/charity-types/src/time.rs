use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Absolute point in time, in whole seconds since the UNIX epoch.
///
/// Program deadlines and creation times use this resolution.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self(secs)
    }

    pub const fn as_secs(&self) -> u64 {
        self.0
    }

    /// This timestamp shifted forward, saturating at the far future.
    pub const fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// This timestamp shifted backward, saturating at the epoch.
    pub const fn minus_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t+{}", self.0)
    }
}
