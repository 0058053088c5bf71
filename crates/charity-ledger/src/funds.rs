use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use tracing::debug;

use charity_types::{AccountId, Amount};

use crate::error::FundsError;
use crate::program::Payout;

/// Boundary to the external balances that donations are drawn from and
/// payouts are credited to.
///
/// The ledger holds escrow itself; a gateway only moves funds between
/// external accounts and that custody.
pub trait FundsGateway: Send + Sync {
    /// Move `amount` from `from` into ledger custody.
    fn withdraw(&self, from: &AccountId, amount: Amount) -> Result<(), FundsError>;

    /// Credit every payout, or none of them.
    fn deposit_batch(&self, payouts: &[Payout]) -> Result<(), FundsError>;
}

/// In-memory balances for tests, scripted sessions, and embedding.
///
/// Accounts can be frozen to make deposits into them fail, which exercises
/// the all-or-nothing refund path.
pub struct InMemoryBank {
    inner: RwLock<BankState>,
}

#[derive(Default)]
struct BankState {
    balances: HashMap<AccountId, Amount>,
    frozen: HashSet<AccountId>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BankState::default()),
        }
    }

    /// Create a bank with opening balances.
    pub fn with_balances<I: IntoIterator<Item = (AccountId, Amount)>>(balances: I) -> Self {
        let bank = Self::new();
        for (account, amount) in balances {
            bank.set_balance(account, amount);
        }
        bank
    }

    pub fn set_balance(&self, account: AccountId, amount: Amount) {
        self.inner
            .write()
            .expect("bank lock poisoned")
            .balances
            .insert(account, amount);
    }

    pub fn balance(&self, account: &AccountId) -> Amount {
        self.inner
            .read()
            .expect("bank lock poisoned")
            .balances
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    /// Total held across all external accounts.
    pub fn total(&self) -> Amount {
        self.inner
            .read()
            .expect("bank lock poisoned")
            .balances
            .values()
            .copied()
            .sum()
    }

    pub fn freeze(&self, account: AccountId) {
        self.inner
            .write()
            .expect("bank lock poisoned")
            .frozen
            .insert(account);
    }

    pub fn unfreeze(&self, account: &AccountId) {
        self.inner
            .write()
            .expect("bank lock poisoned")
            .frozen
            .remove(account);
    }
}

impl Default for InMemoryBank {
    fn default() -> Self {
        Self::new()
    }
}

impl FundsGateway for InMemoryBank {
    fn withdraw(&self, from: &AccountId, amount: Amount) -> Result<(), FundsError> {
        let mut state = self.inner.write().expect("bank lock poisoned");
        if state.frozen.contains(from) {
            return Err(FundsError::AccountFrozen(*from));
        }
        let available = state.balances.get(from).copied().unwrap_or_default();
        let remaining = available
            .checked_sub(amount)
            .ok_or(FundsError::InsufficientBalance {
                account: *from,
                available,
                requested: amount,
            })?;
        state.balances.insert(*from, remaining);
        debug!(account = %from, %amount, "withdrew into custody");
        Ok(())
    }

    fn deposit_batch(&self, payouts: &[Payout]) -> Result<(), FundsError> {
        let mut state = self.inner.write().expect("bank lock poisoned");

        // Validate the whole batch against projected balances before
        // touching any of them.
        let mut projected: HashMap<AccountId, Amount> = HashMap::new();
        for payout in payouts {
            if state.frozen.contains(&payout.to) {
                return Err(FundsError::AccountFrozen(payout.to));
            }
            let current = projected
                .get(&payout.to)
                .copied()
                .unwrap_or_else(|| state.balances.get(&payout.to).copied().unwrap_or_default());
            let next = current
                .checked_add(payout.amount)
                .ok_or(FundsError::Overflow(payout.to))?;
            projected.insert(payout.to, next);
        }

        for (account, balance) in projected {
            state.balances.insert(account, balance);
        }
        debug!(payouts = payouts.len(), "deposited batch from custody");
        Ok(())
    }
}
