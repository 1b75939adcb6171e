//! Ledger commands: postings that commit together or not at all.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wallet_common::{CommandId, Currency, Result, Timestamp, UserId, WalletError};

use crate::balance::Balance;

/// One signed change to one user's holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub user: UserId,
    pub currency: Currency,
    /// Negative for debits.
    pub delta: Decimal,
}

impl Posting {
    /// Take `amount` out of the user's `currency` holding.
    pub fn debit(user: UserId, currency: Currency, amount: Decimal) -> Self {
        Self {
            user,
            currency,
            delta: -amount,
        }
    }

    /// Add `amount` to the user's `currency` holding.
    pub fn credit(user: UserId, currency: Currency, amount: Decimal) -> Self {
        Self {
            user,
            currency,
            delta: amount,
        }
    }
}

/// A set of postings applied atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerCommand {
    id: CommandId,
    postings: Vec<Posting>,
}

impl LedgerCommand {
    /// Create an empty command.
    pub fn new() -> Self {
        Self {
            id: CommandId::new(),
            postings: Vec::new(),
        }
    }

    /// Command with one posting.
    pub fn single(posting: Posting) -> Self {
        Self::new().with(posting)
    }

    /// Builder-style posting.
    pub fn with(mut self, posting: Posting) -> Self {
        self.postings.push(posting);
        self
    }

    /// Add a posting.
    pub fn push(&mut self, posting: Posting) {
        self.postings.push(posting);
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Users touched, in ascending order.
    pub fn users(&self) -> BTreeSet<UserId> {
        self.postings.iter().map(|p| p.user).collect()
    }

    /// Postings summed per user and currency, users in ascending order.
    pub fn net_deltas(&self) -> Result<BTreeMap<UserId, BTreeMap<Currency, Decimal>>> {
        let mut net: BTreeMap<UserId, BTreeMap<Currency, Decimal>> = BTreeMap::new();

        for posting in &self.postings {
            let slot = net
                .entry(posting.user)
                .or_default()
                .entry(posting.currency)
                .or_insert(Decimal::ZERO);
            *slot = slot.checked_add(posting.delta).ok_or_else(|| {
                WalletError::InvalidAmount(format!("postings for {} overflow", posting.user))
            })?;
        }

        Ok(net)
    }
}

impl Default for LedgerCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a committed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedCommand {
    pub id: CommandId,
    /// Resulting balance of every user the command touched.
    pub balances: BTreeMap<UserId, Balance>,
    pub applied_at: Timestamp,
}

impl AppliedCommand {
    /// Resulting balance for `user`, if the command touched it.
    pub fn balance(&self, user: UserId) -> Option<Balance> {
        self.balances.get(&user).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_net_deltas_sum_per_user_and_currency() {
        let alice = UserId::new(2);
        let bob = UserId::new(1);

        let command = LedgerCommand::new()
            .with(Posting::debit(alice, Currency::Usd, dec!(10)))
            .with(Posting::debit(alice, Currency::Usd, dec!(5)))
            .with(Posting::credit(alice, Currency::Eur, dec!(7)))
            .with(Posting::credit(bob, Currency::Usd, dec!(15)));

        let net = command.net_deltas().unwrap();

        assert_eq!(net.keys().copied().collect::<Vec<_>>(), vec![bob, alice]);
        assert_eq!(net[&alice][&Currency::Usd], dec!(-15));
        assert_eq!(net[&alice][&Currency::Eur], dec!(7));
        assert_eq!(net[&bob][&Currency::Usd], dec!(15));
    }

    #[test]
    fn test_users_sorted_and_deduplicated() {
        let command = LedgerCommand::new()
            .with(Posting::credit(UserId::new(9), Currency::Rub, dec!(1)))
            .with(Posting::credit(UserId::new(3), Currency::Rub, dec!(1)))
            .with(Posting::debit(UserId::new(9), Currency::Rub, dec!(1)));

        let users: Vec<_> = command.users().into_iter().collect();
        assert_eq!(users, vec![UserId::new(3), UserId::new(9)]);
    }
}
