use std::fmt;
use std::iter::Sum;

use serde::{Deserialize, Serialize};

/// A quantity of funds in the smallest indivisible unit.
///
/// All arithmetic on amounts is checked; the ledger treats overflow as a
/// rejected call rather than wrapping.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub const fn new(units: u64) -> Self {
        Self(units)
    }

    pub const fn units(&self) -> u64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Sum an iterator of amounts, returning `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Self>>(iter: I) -> Option<Self> {
        iter.into_iter()
            .try_fold(Self::ZERO, |acc, amount| acc.checked_add(amount))
    }
}

impl From<u64> for Amount {
    fn from(units: u64) -> Self {
        Self(units)
    }
}

/// Saturating sum, for reporting. Use [`Amount::checked_sum`] where overflow
/// must be detected.
impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.fold(0u64, |acc, amount| acc.saturating_add(amount.0)))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_add_detects_overflow() {
        assert_eq!(Amount::new(1).checked_add(Amount::new(2)), Some(Amount::new(3)));
        assert_eq!(Amount::new(u64::MAX).checked_add(Amount::new(1)), None);
    }

    #[test]
    fn checked_sub_detects_underflow() {
        assert_eq!(Amount::new(5).checked_sub(Amount::new(2)), Some(Amount::new(3)));
        assert_eq!(Amount::new(1).checked_sub(Amount::new(2)), None);
    }

    #[test]
    fn checked_sum() {
        let amounts = [Amount::new(1), Amount::new(2), Amount::new(3)];
        assert_eq!(Amount::checked_sum(amounts), Some(Amount::new(6)));
        assert_eq!(Amount::checked_sum([Amount::new(u64::MAX), Amount::new(1)]), None);
        assert_eq!(Amount::checked_sum(std::iter::empty::<Amount>()), Some(Amount::ZERO));
    }

    #[test]
    fn serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&Amount::new(42)).unwrap(), "42");
        let parsed: Amount = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, Amount::new(7));
    }
}
