//! Currency Wallet Ledger
//!
//! Per-user multi-currency balances with atomic multi-posting commands.
//! The [`LedgerStore`] trait is the persistence seam; the in-memory store
//! implements it for tests and simulations and keeps an audit journal.

pub mod balance;
pub mod command;
pub mod store;
pub mod memory;
pub mod journal;

pub use balance::Balance;
pub use command::{AppliedCommand, LedgerCommand, Posting};
pub use store::{LedgerStore, SharedLedgerStore};
pub use memory::InMemoryLedgerStore;
pub use journal::{EntryType, Journal, JournalEntry};
