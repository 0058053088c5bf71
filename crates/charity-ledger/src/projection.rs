use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use charity_types::{AccountId, Amount, ProgramIndex, Timestamp};

use crate::error::LedgerError;
use crate::program::ProgramStatus;
use crate::traits::ProgramReader;

/// One row of a program listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSummary {
    pub index: ProgramIndex,
    pub receiver: AccountId,
    pub title: String,
    pub status: ProgramStatus,
    pub collected: Amount,
    pub donation_count: u64,
    pub deadline: Timestamp,
}

/// A donor's aggregate contribution to one program.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonorTotal {
    pub donor: AccountId,
    pub total: Amount,
    pub donations: u64,
}

/// Deterministic read models derived from a [`ProgramReader`].
pub struct ProjectionBuilder;

impl ProjectionBuilder {
    /// Summaries of every program, in creation order.
    pub fn summaries<R: ProgramReader>(reader: &R) -> Result<Vec<ProgramSummary>, LedgerError> {
        Ok(reader
            .get_all_programs()?
            .into_iter()
            .map(|p| ProgramSummary {
                index: p.index,
                receiver: p.receiver,
                title: p.title,
                status: p.status,
                collected: p.collected,
                donation_count: p.donations.len() as u64,
                deadline: p.deadline,
            })
            .collect())
    }

    /// Per-donor totals for the receiver's latest program, largest first;
    /// ties keep donor id order.
    pub fn donor_totals<R: ProgramReader>(
        reader: &R,
        receiver: &AccountId,
    ) -> Result<Vec<DonorTotal>, LedgerError> {
        let donations = reader.get_donations(receiver)?;
        let mut totals: BTreeMap<AccountId, (Amount, u64)> = BTreeMap::new();
        for donation in donations {
            let entry = totals.entry(donation.donor).or_default();
            entry.0 = entry
                .0
                .checked_add(donation.amount)
                .ok_or(LedgerError::AmountOverflow)?;
            entry.1 += 1;
        }

        let mut rows: Vec<DonorTotal> = totals
            .into_iter()
            .map(|(donor, (total, donations))| DonorTotal {
                donor,
                total,
                donations,
            })
            .collect();
        rows.sort_by(|a, b| b.total.cmp(&a.total));
        Ok(rows)
    }
}
