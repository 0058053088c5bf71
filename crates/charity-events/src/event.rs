use serde::{Deserialize, Serialize};

use charity_types::{AccountId, Amount, ProgramIndex, Timestamp};

/// Content-addressed identifier for a program event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    /// BLAKE3 hash of the event content.
    pub hash: [u8; 32],
}

impl EventId {
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self { hash }
    }

    /// Short hex representation (first 8 hex chars).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.hash[..4])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evt:{}", self.short_hex())
    }
}

/// Classification of program lifecycle events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A program was registered for a receiver.
    ProgramCreated,
    /// A donation was accepted into escrow.
    DonationReceived,
    /// A program was completed and its escrow released to the receiver.
    ProgramCompleted,
    /// A program was cancelled and every donor refunded.
    ProgramCancelled,
}

impl EventKind {
    /// Whether this kind closes a program.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ProgramCompleted | Self::ProgramCancelled)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ProgramCreated => "ProgramCreated",
            Self::DonationReceived => "DonationReceived",
            Self::ProgramCompleted => "ProgramCompleted",
            Self::ProgramCancelled => "ProgramCancelled",
        };
        write!(f, "{s}")
    }
}

/// Payload data carried by a program event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    Created {
        title: String,
        deadline: Timestamp,
    },
    Donation {
        donor: AccountId,
        amount: Amount,
        /// Program total after this donation.
        collected: Amount,
    },
    Completed {
        /// Escrow released to the receiver.
        released: Amount,
    },
    Cancelled {
        /// Total returned to donors.
        refunded: Amount,
        /// Number of refund transfers issued.
        refunds: u64,
    },
}

/// A single notification emitted by the ledger.
///
/// Every event carries the `(receiver, program_index)` pair identifying the
/// program, a bus-wide sequence number, the ledger time at which it was
/// emitted, and a BLAKE3 integrity hash over its content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramEvent {
    pub id: EventId,
    /// Monotonic position in the bus's emission order, starting at 1.
    pub seq: u64,
    pub timestamp: Timestamp,
    pub receiver: AccountId,
    pub program_index: ProgramIndex,
    pub kind: EventKind,
    pub payload: EventPayload,
    pub integrity_hash: [u8; 32],
}

impl ProgramEvent {
    /// Build a new event, computing its integrity hash and id.
    pub fn new(
        seq: u64,
        timestamp: Timestamp,
        receiver: AccountId,
        program_index: ProgramIndex,
        kind: EventKind,
        payload: EventPayload,
    ) -> Self {
        let integrity_hash =
            Self::compute_integrity(seq, timestamp, &receiver, program_index, kind, &payload);
        Self {
            id: EventId::from_hash(integrity_hash),
            seq,
            timestamp,
            receiver,
            program_index,
            kind,
            payload,
            integrity_hash,
        }
    }

    /// Verify the integrity hash still matches the event content.
    pub fn verify_integrity(&self) -> bool {
        let expected = Self::compute_integrity(
            self.seq,
            self.timestamp,
            &self.receiver,
            self.program_index,
            self.kind,
            &self.payload,
        );
        self.integrity_hash == expected
    }

    fn compute_integrity(
        seq: u64,
        timestamp: Timestamp,
        receiver: &AccountId,
        program_index: ProgramIndex,
        kind: EventKind,
        payload: &EventPayload,
    ) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"charity-event-v1:");
        hasher.update(&seq.to_le_bytes());
        hasher.update(&timestamp.as_secs().to_le_bytes());
        hasher.update(receiver.as_bytes());
        hasher.update(&program_index.value().to_le_bytes());

        if let Ok(kind_bytes) = bincode::serialize(&kind) {
            hasher.update(&kind_bytes);
        }
        if let Ok(payload_bytes) = bincode::serialize(payload) {
            hasher.update(&payload_bytes);
        }

        *hasher.finalize().as_bytes()
    }
}
