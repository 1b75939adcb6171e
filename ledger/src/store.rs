//! Ledger store contract.

use std::sync::Arc;

use async_trait::async_trait;
use wallet_common::{Result, UserId};

use crate::balance::Balance;
use crate::command::{AppliedCommand, LedgerCommand};

/// Keyed per-user balance storage with atomic multi-posting updates.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create a zero balance for `user` if none exists. Returns the current balance.
    async fn open(&self, user: UserId) -> Result<Balance>;

    /// Current balance. Fails with `UserNotFound` if the user was never opened.
    async fn balance(&self, user: UserId) -> Result<Balance>;

    /// Apply every posting or none.
    ///
    /// Fails with `InsufficientFunds` if any holding would go negative and
    /// with `UserNotFound` if any touched user is missing.
    async fn atomic_apply(&self, command: LedgerCommand) -> Result<AppliedCommand>;
}

/// Shared ledger store.
pub type SharedLedgerStore = Arc<dyn LedgerStore>;
