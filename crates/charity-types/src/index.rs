use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a program in the ledger's creation order.
///
/// Indices are assigned sequentially from zero and never reused, so a
/// receiver's successive programs are told apart by index.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProgramIndex(u64);

impl ProgramIndex {
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ProgramIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
