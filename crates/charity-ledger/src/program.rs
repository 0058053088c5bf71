use std::fmt;

use serde::{Deserialize, Serialize};

use charity_types::{AccountId, Amount, ProgramIndex, Timestamp};

/// Arguments to [`ProgramWriter::create_program`](crate::traits::ProgramWriter::create_program).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRequest {
    pub receiver: AccountId,
    pub title: String,
    pub description: String,
    /// Opaque image reference (URL, content hash, ...). May be empty.
    pub image: String,
    pub deadline: Timestamp,
}

impl ProgramRequest {
    pub fn new(
        receiver: AccountId,
        title: impl Into<String>,
        description: impl Into<String>,
        image: impl Into<String>,
        deadline: Timestamp,
    ) -> Self {
        Self {
            receiver,
            title: title.into(),
            description: description.into(),
            image: image.into(),
            deadline,
        }
    }
}

/// Identifies one program: the receiver it pays out to and its creation
/// index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramKey {
    pub receiver: AccountId,
    pub index: ProgramIndex,
}

impl fmt::Display for ProgramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.receiver, self.index)
    }
}

/// Lifecycle state of a program. Only `Active` accepts donations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgramStatus {
    Active,
    /// Escrow released to the receiver.
    Completed,
    /// Escrow returned to donors.
    Cancelled,
}

impl fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Completed => write!(f, "Completed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// One recorded contribution. Immutable once appended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub donor: AccountId,
    pub amount: Amount,
}

/// A transfer out of escrow, issued on completion or cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub to: AccountId,
    pub amount: Amount,
}

/// A fundraising campaign tied to a receiving account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub index: ProgramIndex,
    pub receiver: AccountId,
    pub title: String,
    pub description: String,
    pub image: String,
    pub deadline: Timestamp,
    pub created_at: Timestamp,
    pub status: ProgramStatus,
    /// Sum of every donation ever accepted.
    pub collected: Amount,
    /// Funds currently held in the ledger's custody for this program.
    pub escrow: Amount,
    pub donations: Vec<Donation>,
}

impl Program {
    pub(crate) fn open(index: ProgramIndex, request: ProgramRequest, created_at: Timestamp) -> Self {
        Self {
            index,
            receiver: request.receiver,
            title: request.title,
            description: request.description,
            image: request.image,
            deadline: request.deadline,
            created_at,
            status: ProgramStatus::Active,
            collected: Amount::ZERO,
            escrow: Amount::ZERO,
            donations: Vec::new(),
        }
    }

    pub fn key(&self) -> ProgramKey {
        ProgramKey {
            receiver: self.receiver,
            index: self.index,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ProgramStatus::Active
    }

    /// Whether `now` is past the deadline. The deadline instant itself still
    /// accepts donations.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now.is_after(&self.deadline)
    }

    /// Refund transfers that return every donation to its donor, in
    /// recording order.
    pub fn refund_plan(&self) -> Vec<Payout> {
        self.donations
            .iter()
            .map(|d| Payout {
                to: d.donor,
                amount: d.amount,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> Program {
        Program::open(
            ProgramIndex::new(0),
            ProgramRequest::new(
                AccountId::from_label("shelter"),
                "Clean Water",
                "desc",
                "ipfs://img",
                Timestamp::from_secs(100),
            ),
            Timestamp::from_secs(10),
        )
    }

    #[test]
    fn open_program_starts_active_and_empty() {
        let p = program();
        assert!(p.is_active());
        assert_eq!(p.collected, Amount::ZERO);
        assert_eq!(p.escrow, Amount::ZERO);
        assert!(p.donations.is_empty());
    }

    #[test]
    fn deadline_instant_is_not_expired() {
        let p = program();
        assert!(!p.is_expired(Timestamp::from_secs(99)));
        assert!(!p.is_expired(Timestamp::from_secs(100)));
        assert!(p.is_expired(Timestamp::from_secs(101)));
    }

    #[test]
    fn refund_plan_preserves_order() {
        let mut p = program();
        let d1 = AccountId::from_label("d1");
        let d2 = AccountId::from_label("d2");
        p.donations.push(Donation { donor: d1, amount: Amount::new(1) });
        p.donations.push(Donation { donor: d2, amount: Amount::new(2) });
        p.donations.push(Donation { donor: d1, amount: Amount::new(4) });

        let plan = p.refund_plan();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0], Payout { to: d1, amount: Amount::new(1) });
        assert_eq!(plan[1], Payout { to: d2, amount: Amount::new(2) });
        assert_eq!(plan[2], Payout { to: d1, amount: Amount::new(4) });
    }

    #[test]
    fn key_display() {
        let key = program().key();
        assert!(format!("{key}").ends_with("#0"));
    }
}
