//! In-memory ledger store.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument};
use wallet_common::{now, Result, UserId, WalletError};

use crate::balance::Balance;
use crate::command::{AppliedCommand, LedgerCommand};
use crate::journal::{Journal, JournalEntry};
use crate::store::LedgerStore;

type Row = Arc<Mutex<Balance>>;

/// Ledger store backed by a `DashMap` of per-user rows.
///
/// A command locks every row it touches in ascending user order, computes
/// the new balances, then commits them without yielding. Dropping an apply
/// before the commit leaves every row as it was.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    rows: DashMap<UserId, Row>,
    journal: Journal,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The audit journal.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Users with a row, in no particular order.
    pub fn users(&self) -> Vec<UserId> {
        self.rows.iter().map(|row| *row.key()).collect()
    }

    fn row(&self, user: UserId) -> Result<Row> {
        self.rows
            .get(&user)
            .map(|row| row.value().clone())
            .ok_or(WalletError::UserNotFound(user))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn open(&self, user: UserId) -> Result<Balance> {
        let row = self
            .rows
            .entry(user)
            .or_insert_with(|| {
                debug!(user = %user, "Opened account");
                Arc::new(Mutex::new(Balance::zero()))
            })
            .value()
            .clone();

        let balance = *row.lock().await;
        Ok(balance)
    }

    async fn balance(&self, user: UserId) -> Result<Balance> {
        let row = self.row(user)?;
        let balance = *row.lock().await;
        Ok(balance)
    }

    #[instrument(skip(self, command), fields(command_id = %command.id(), postings = command.postings().len()))]
    async fn atomic_apply(&self, command: LedgerCommand) -> Result<AppliedCommand> {
        if command.is_empty() {
            return Err(WalletError::InvalidAmount("ledger command has no postings".to_string()));
        }

        let deltas = command.net_deltas()?;

        let rows = deltas
            .keys()
            .map(|user| self.row(*user).map(|row| (*user, row)))
            .collect::<Result<Vec<_>>>()?;

        let mut guards: Vec<(UserId, OwnedMutexGuard<Balance>)> = Vec::with_capacity(rows.len());
        for (user, row) in rows {
            guards.push((user, row.lock_owned().await));
        }

        let mut updated = Vec::with_capacity(guards.len());
        for (user, guard) in &guards {
            let mut balance = **guard;
            if let Some(changes) = deltas.get(user) {
                for (currency, delta) in changes {
                    balance = balance.apply(*currency, *delta)?;
                }
            }
            updated.push(balance);
        }

        let applied_at = now();
        let mut entries = Vec::new();
        for ((user, guard), balance) in guards.iter_mut().zip(updated) {
            **guard = balance;
            if let Some(changes) = deltas.get(user) {
                entries.extend(changes.iter().map(|(currency, delta)| JournalEntry {
                    command_id: command.id(),
                    user: *user,
                    currency: *currency,
                    delta: *delta,
                    balance_after: balance.get(*currency),
                    created_at: applied_at,
                }));
            }
        }
        self.journal.append(entries);

        let balances = guards.iter().map(|(user, guard)| (*user, **guard)).collect();

        debug!(users = guards.len(), "Ledger command applied");

        Ok(AppliedCommand {
            id: command.id(),
            balances,
            applied_at,
        })
    }
}
