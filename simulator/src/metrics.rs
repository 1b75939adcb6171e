//! Simulation metrics.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use serde::Serialize;

/// Operation kinds the workers issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Exchange,
    Transfer,
    Deposit,
    Withdraw,
}

/// Simulation metrics.
#[derive(Debug, Clone)]
pub struct SimulationMetrics {
    /// Operations attempted.
    pub total_operations: u64,
    /// Operations committed.
    pub successful_operations: u64,
    /// Operations rejected or failed.
    pub failed_operations: u64,
    /// Committed operations per kind.
    pub committed: BTreeMap<Operation, u64>,
    /// Failures keyed by error code.
    pub failures: BTreeMap<&'static str, u64>,
    /// Latency samples (µs).
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            total_operations: 0,
            successful_operations: 0,
            failed_operations: 0,
            committed: BTreeMap::new(),
            failures: BTreeMap::new(),
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record a committed operation.
    pub fn record_success(&mut self, operation: Operation, latency: Duration) {
        self.total_operations += 1;
        self.successful_operations += 1;
        *self.committed.entry(operation).or_default() += 1;
        self.record_latency(latency);
    }

    /// Record a failed operation.
    pub fn record_failure(&mut self, error_code: &'static str, latency: Duration) {
        self.total_operations += 1;
        self.failed_operations += 1;
        *self.failures.entry(error_code).or_default() += 1;
        self.record_latency(latency);
    }

    fn record_latency(&mut self, latency: Duration) {
        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples
            .push_back(u64::try_from(latency.as_micros()).unwrap_or(u64::MAX));
    }

    /// Fold another worker's metrics into these.
    pub fn merge(&mut self, other: SimulationMetrics) {
        self.total_operations += other.total_operations;
        self.successful_operations += other.successful_operations;
        self.failed_operations += other.failed_operations;
        for (operation, count) in other.committed {
            *self.committed.entry(operation).or_default() += count;
        }
        for (code, count) in other.failures {
            *self.failures.entry(code).or_default() += count;
        }
        for sample in other.latency_samples {
            if self.latency_samples.len() >= self.max_samples {
                self.latency_samples.pop_front();
            }
            self.latency_samples.push_back(sample);
        }
    }

    /// Get average latency in µs.
    pub fn average_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get p50 latency.
    pub fn p50_latency_us(&self) -> u64 {
        self.percentile_latency(50)
    }

    /// Get p99 latency.
    pub fn p99_latency_us(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Get success rate.
    pub fn success_rate(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }

        self.successful_operations as f64 / self.total_operations as f64
    }

    /// Get throughput (operations per second).
    pub fn throughput(&self, elapsed: Duration) -> f64 {
        if elapsed.is_zero() {
            return 0.0;
        }

        self.total_operations as f64 / elapsed.as_secs_f64()
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}
