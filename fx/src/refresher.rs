//! Background quote refresh.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::cache::SharedRateCache;

/// Counts from one refresher run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefresherReport {
    pub ticks: u64,
    pub successes: u64,
    pub failures: u64,
}

/// Periodically forces a cache refresh, starting immediately.
pub struct RateRefresher {
    cache: SharedRateCache,
    interval: Duration,
}

impl RateRefresher {
    /// Create a refresher for `cache`.
    pub fn new(cache: SharedRateCache, interval: Duration) -> Self {
        Self { cache, interval }
    }

    /// Start the refresh loop on the current runtime.
    pub fn spawn(self) -> RefresherHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let join = tokio::spawn(self.run(shutdown_rx));
        RefresherHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) -> RefresherReport {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut report = RefresherReport::default();

        info!(interval = ?self.interval, "Rate refresher started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    report.ticks += 1;
                    match self.cache.refresh().await {
                        Ok(snapshot) => {
                            report.successes += 1;
                            debug!(version = snapshot.version, "Background refresh succeeded");
                        }
                        Err(e) => {
                            report.failures += 1;
                            warn!(error = %e, "Background refresh failed, keeping previous quotes");
                        }
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }

        info!(
            ticks = report.ticks,
            failures = report.failures,
            "Rate refresher stopped"
        );
        report
    }
}

/// Handle to a running refresher. Dropping it also stops the loop.
pub struct RefresherHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: JoinHandle<RefresherReport>,
}

impl RefresherHandle {
    /// Signal shutdown and wait for the loop to exit.
    pub async fn stop(self) -> RefresherReport {
        let _ = self.shutdown_tx.send(()).await;

        match self.join.await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Rate refresher task failed");
                RefresherReport::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::cache::{RateCache, RateCacheConfig};
    use crate::error::FxError;
    use crate::source::StaticQuoteSource;
    use rust_decimal_macros::dec;

    #[tokio::test(start_paused = true)]
    async fn test_refresher_ticks_immediately_then_on_interval() {
        let source = Arc::new(StaticQuoteSource::new("test").with_quote("USD", dec!(80)));
        let cache = Arc::new(RateCache::new(source.clone(), RateCacheConfig::default()));

        let handle = RateRefresher::new(cache.clone(), Duration::from_secs(60)).spawn();
        tokio::time::sleep(Duration::from_secs(125)).await;
        let report = handle.stop().await;

        assert_eq!(report.ticks, 3);
        assert_eq!(report.successes, 3);
        assert_eq!(cache.snapshot().unwrap().version, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresher_swallows_failures() {
        let source = Arc::new(StaticQuoteSource::new("test").with_quote("USD", dec!(80)));
        let cache = Arc::new(RateCache::new(source.clone(), RateCacheConfig::default()));

        let handle = RateRefresher::new(cache.clone(), Duration::from_secs(60)).spawn();
        tokio::time::sleep(Duration::from_secs(1)).await;

        source.fail_with(FxError::SourceUnavailable("down".to_string()));
        tokio::time::sleep(Duration::from_secs(120)).await;
        let report = handle.stop().await;

        assert_eq!(report.ticks, 3);
        assert_eq!(report.successes, 1);
        assert_eq!(report.failures, 2);
        assert_eq!(cache.snapshot().unwrap().version, 1);
    }
}
