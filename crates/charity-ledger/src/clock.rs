use std::sync::atomic::{AtomicU64, Ordering};

use charity_types::Timestamp;

/// Source of "now" for deadline checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to. Used by tests and scripted
/// sessions to step past deadlines without sleeping.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            secs: AtomicU64::new(start.as_secs()),
        }
    }

    pub fn set(&self, to: Timestamp) {
        self.secs.store(to.as_secs(), Ordering::SeqCst);
    }

    /// Move forward by `secs`, returning the new time.
    pub fn advance(&self, secs: u64) -> Timestamp {
        let previous = self
            .secs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                Some(s.saturating_add(secs))
            })
            .unwrap_or_default();
        Timestamp::from_secs(previous.saturating_add(secs))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_secs(self.secs.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(Timestamp::from_secs(100));
        assert_eq!(clock.now(), Timestamp::from_secs(100));
        assert_eq!(clock.advance(5), Timestamp::from_secs(105));
        assert_eq!(clock.now(), Timestamp::from_secs(105));

        clock.set(Timestamp::from_secs(7));
        assert_eq!(clock.now(), Timestamp::from_secs(7));
    }

    #[test]
    fn manual_clock_saturates() {
        let clock = ManualClock::new(Timestamp::from_secs(u64::MAX - 1));
        assert_eq!(clock.advance(10), Timestamp::from_secs(u64::MAX));
    }

    #[test]
    fn system_clock_tracks_wall_time() {
        let before = Timestamp::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
