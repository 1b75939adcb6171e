//! Currency Wallet Engine
//!
//! The wallet service ties rate resolution to the ledger: it validates
//! requests, resolves and bounds-checks rates, and hands each operation to
//! the ledger store as one atomic command.

pub mod config;
pub mod metrics;
pub mod records;
pub mod service;

pub use config::WalletConfig;
pub use metrics::{MetricsSnapshot, SharedMetrics, WalletMetrics};
pub use records::{
    ExchangeReceipt, ExchangeRecord, ExchangeRequest, TransferReceipt, TransferRecord, TransferRequest,
};
pub use service::WalletService;
