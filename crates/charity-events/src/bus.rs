use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use charity_types::{AccountId, ProgramIndex, Timestamp};

use crate::error::{EventError, Result};
use crate::event::{EventKind, EventPayload, ProgramEvent};

/// Filter for subscribing to a subset of program events.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// If set, only events for these receivers are delivered.
    pub receivers: Option<Vec<AccountId>>,
    /// If set, only events of these kinds are delivered.
    pub kinds: Option<Vec<EventKind>>,
}

impl EventFilter {
    /// Completion and cancellation notifications only.
    pub fn terminal() -> Self {
        Self {
            receivers: None,
            kinds: Some(vec![EventKind::ProgramCompleted, EventKind::ProgramCancelled]),
        }
    }

    /// Every event concerning one receiver.
    pub fn receiver(receiver: AccountId) -> Self {
        Self {
            receivers: Some(vec![receiver]),
            kinds: None,
        }
    }

    pub fn matches(&self, event: &ProgramEvent) -> bool {
        if let Some(ref receivers) = self.receivers {
            if !receivers.contains(&event.receiver) {
                return false;
            }
        }
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        true
    }
}

/// A broadcast channel receiver for program events.
pub type EventStream = broadcast::Receiver<ProgramEvent>;

struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<ProgramEvent>,
}

/// Fan-out bus that stamps program events and delivers them to matching
/// subscribers.
///
/// Emission never fails: a lagging or dropped subscriber only loses its own
/// events, and closed subscriptions are pruned on the next emit.
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    next_seq: AtomicU64,
    capacity: usize,
}

impl EventBus {
    /// Create a bus whose per-subscriber channels hold `capacity` events.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(EventError::InvalidCapacity(capacity));
        }
        Ok(Self {
            subscribers: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(1),
            capacity,
        })
    }

    /// Register a subscriber; the returned stream sees events emitted after
    /// this call that match `filter`.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        let (sender, receiver) = broadcast::channel(self.capacity);
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { filter, sender });
        receiver
    }

    /// Stamp and route a new event.
    pub fn emit(
        &self,
        timestamp: Timestamp,
        receiver: AccountId,
        program_index: ProgramIndex,
        kind: EventKind,
        payload: EventPayload,
    ) -> ProgramEvent {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let event = ProgramEvent::new(seq, timestamp, receiver, program_index, kind, payload);
        self.route(&event);
        debug!(id = %event.id, seq, kind = %event.kind, receiver = %event.receiver, "event emitted");
        event
    }

    fn route(&self, event: &ProgramEvent) {
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subs.len();
        subs.retain(|sub| {
            if sub.filter.matches(event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                sub.sender.receiver_count() > 0
            }
        });
        let pruned = before - subs.len();
        if pruned > 0 {
            warn!(pruned, "dropped closed event subscribers");
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Sequence number the next emitted event will carry.
    pub fn next_seq(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(1),
            capacity: 1024,
        }
    }
}
