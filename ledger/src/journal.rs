//! Audit journal of applied postings.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wallet_common::{CommandId, Currency, Timestamp, UserId};

/// Direction of a journal entry, from the wallet holder's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Holding decreased.
    Debit,
    /// Holding increased.
    Credit,
}

/// One applied change to one holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub command_id: CommandId,
    pub user: UserId,
    pub currency: Currency,
    /// Signed change; negative for debits.
    pub delta: Decimal,
    /// Holding right after this entry.
    pub balance_after: Decimal,
    pub created_at: Timestamp,
}

impl JournalEntry {
    pub fn entry_type(&self) -> EntryType {
        if self.delta.is_sign_negative() {
            EntryType::Debit
        } else {
            EntryType::Credit
        }
    }

    /// Unsigned amount moved.
    pub fn amount(&self) -> Decimal {
        self.delta.abs()
    }
}

/// Append-only, in-memory journal.
#[derive(Debug, Default)]
pub struct Journal {
    entries: RwLock<Vec<JournalEntry>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the entries of one command.
    pub fn append(&self, entries: impl IntoIterator<Item = JournalEntry>) {
        self.entries.write().extend(entries);
    }

    /// Copy of every entry, in append order.
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.read().clone()
    }

    /// Entries touching `user`.
    pub fn for_user(&self, user: UserId) -> Vec<JournalEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.user == user)
            .cloned()
            .collect()
    }

    /// Entries written by one command.
    pub fn for_command(&self, command_id: CommandId) -> Vec<JournalEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.command_id == command_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Net of all deltas per currency.
    ///
    /// Balances start at zero, so this equals the sum of every balance.
    pub fn net_totals(&self) -> BTreeMap<Currency, Decimal> {
        let mut totals: BTreeMap<Currency, Decimal> =
            Currency::ALL.into_iter().map(|c| (c, Decimal::ZERO)).collect();

        for entry in self.entries.read().iter() {
            *totals.entry(entry.currency).or_insert(Decimal::ZERO) += entry.delta;
        }

        totals
    }
}
