//! Operation counters for wallet monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Wallet metrics.
#[derive(Debug, Default)]
pub struct WalletMetrics {
    /// Exchanges attempted.
    pub exchanges_total: AtomicU64,
    /// Exchanges committed.
    pub exchanges_success: AtomicU64,
    /// Exchanges rejected or failed.
    pub exchanges_failed: AtomicU64,
    /// Exchanges refused because the rate was outside its band.
    pub rates_rejected: AtomicU64,
    /// Exchanges priced from quotes past the freshness window.
    pub stale_rates_used: AtomicU64,
    /// Deposits committed.
    pub deposits: AtomicU64,
    /// Withdrawals committed.
    pub withdrawals: AtomicU64,
    /// Transfers committed.
    pub transfers: AtomicU64,
    /// Deposits, withdrawals and transfers that failed.
    pub operations_failed: AtomicU64,
}

impl WalletMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment exchange attempted.
    pub fn exchange_initiated(&self) {
        self.exchanges_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record exchange committed.
    pub fn exchange_success(&self, stale_rate: bool) {
        self.exchanges_success.fetch_add(1, Ordering::Relaxed);
        if stale_rate {
            self.stale_rates_used.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record exchange failure.
    pub fn exchange_failed(&self) {
        self.exchanges_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an implausible rate.
    pub fn rate_rejected(&self) {
        self.rates_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn deposit_applied(&self) {
        self.deposits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn withdrawal_applied(&self) {
        self.withdrawals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transfer_applied(&self) {
        self.transfers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn operation_failed(&self) {
        self.operations_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            exchanges_total: self.exchanges_total.load(Ordering::Relaxed),
            exchanges_success: self.exchanges_success.load(Ordering::Relaxed),
            exchanges_failed: self.exchanges_failed.load(Ordering::Relaxed),
            rates_rejected: self.rates_rejected.load(Ordering::Relaxed),
            stale_rates_used: self.stale_rates_used.load(Ordering::Relaxed),
            deposits: self.deposits.load(Ordering::Relaxed),
            withdrawals: self.withdrawals.load(Ordering::Relaxed),
            transfers: self.transfers.load(Ordering::Relaxed),
            operations_failed: self.operations_failed.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let counters = [
            ("exchanges_total", "Total exchanges attempted", snapshot.exchanges_total),
            ("exchanges_success", "Exchanges committed", snapshot.exchanges_success),
            ("exchanges_failed", "Exchanges rejected or failed", snapshot.exchanges_failed),
            ("rates_rejected", "Exchanges refused for implausible rates", snapshot.rates_rejected),
            ("stale_rates_used", "Exchanges priced from stale quotes", snapshot.stale_rates_used),
            ("deposits", "Deposits committed", snapshot.deposits),
            ("withdrawals", "Withdrawals committed", snapshot.withdrawals),
            ("transfers", "Transfers committed", snapshot.transfers),
            ("operations_failed", "Deposits, withdrawals and transfers that failed", snapshot.operations_failed),
        ];

        counters
            .iter()
            .map(|(name, help, value)| {
                format!(
                    "# HELP wallet_{name} {help}\n# TYPE wallet_{name} counter\nwallet_{name} {value}\n"
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub exchanges_total: u64,
    pub exchanges_success: u64,
    pub exchanges_failed: u64,
    pub rates_rejected: u64,
    pub stale_rates_used: u64,
    pub deposits: u64,
    pub withdrawals: u64,
    pub transfers: u64,
    pub operations_failed: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<WalletMetrics>;
