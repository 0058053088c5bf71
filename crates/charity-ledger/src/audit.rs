use std::collections::HashSet;

use serde::Serialize;

use charity_types::{AccountId, Amount, ProgramIndex};

use crate::error::LedgerError;
use crate::program::Program;
use crate::traits::ProgramReader;

/// Result of auditing a ledger snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub program_count: u64,
    pub active_count: u64,
    /// Funds held in custody across all programs.
    pub escrow_total: Amount,
    pub violations: Vec<Violation>,
}

impl AuditReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific invariant violation found by the auditor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub index: ProgramIndex,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ViolationKind {
    /// More than one active program for the same receiver.
    DuplicateActive,
    /// `collected` differs from the sum of recorded donations.
    SumMismatch,
    /// Escrow differs from `collected` while active, or is non-zero after
    /// termination.
    EscrowMismatch,
    /// A program's stored index differs from its position.
    IndexMismatch,
}

/// Re-checks every ledger invariant over a reader's snapshot.
pub struct LedgerAuditor;

impl LedgerAuditor {
    pub fn audit<R: ProgramReader>(reader: &R) -> Result<AuditReport, LedgerError> {
        let programs = reader.get_all_programs()?;
        Ok(Self::audit_programs(&programs))
    }

    /// Audit an already-taken snapshot.
    pub fn audit_programs(programs: &[Program]) -> AuditReport {
        let mut violations = Vec::new();
        let mut active_receivers: HashSet<AccountId> = HashSet::new();
        let mut active_count = 0u64;

        for (position, program) in programs.iter().enumerate() {
            let index = program.index;

            if index.as_usize() != position {
                violations.push(Violation {
                    index,
                    kind: ViolationKind::IndexMismatch,
                    description: format!("stored index {index} at position {position}"),
                });
            }

            match Amount::checked_sum(program.donations.iter().map(|d| d.amount)) {
                Some(sum) if sum == program.collected => {}
                Some(sum) => violations.push(Violation {
                    index,
                    kind: ViolationKind::SumMismatch,
                    description: format!(
                        "collected {} but donations sum to {sum}",
                        program.collected
                    ),
                }),
                None => violations.push(Violation {
                    index,
                    kind: ViolationKind::SumMismatch,
                    description: "donation sum overflows".into(),
                }),
            }

            let expected_escrow = if program.is_active() {
                program.collected
            } else {
                Amount::ZERO
            };
            if program.escrow != expected_escrow {
                violations.push(Violation {
                    index,
                    kind: ViolationKind::EscrowMismatch,
                    description: format!(
                        "{} program holds {} in escrow, expected {expected_escrow}",
                        program.status, program.escrow
                    ),
                });
            }

            if program.is_active() {
                active_count += 1;
                if !active_receivers.insert(program.receiver) {
                    violations.push(Violation {
                        index,
                        kind: ViolationKind::DuplicateActive,
                        description: format!(
                            "receiver {} already has an active program",
                            program.receiver
                        ),
                    });
                }
            }
        }

        AuditReport {
            program_count: programs.len() as u64,
            active_count,
            escrow_total: programs.iter().map(|p| p.escrow).sum(),
            violations,
        }
    }
}
