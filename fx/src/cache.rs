//! Quote snapshot caching with a freshness window.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};
use wallet_common::{constants, now, Currency, CurrencyCode, Timestamp};

use crate::error::{FxError, FxResult};
use crate::quotes::QuoteSet;
use crate::source::QuoteSource;

/// Configuration for the rate cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// Currency every quote is expressed against.
    pub reference: CurrencyCode,
    /// How long a snapshot counts as fresh.
    pub freshness_window: Duration,
    /// Oldest snapshot served when refreshing fails. `None` disables the ceiling.
    pub max_staleness: Option<Duration>,
    /// Upper bound on one fetch.
    pub fetch_timeout: Duration,
    /// Foreground refreshes are skipped for this long after a failed fetch.
    pub failure_backoff: Duration,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            reference: Currency::Rub.as_code(),
            freshness_window: constants::freshness_window(),
            max_staleness: Some(constants::max_staleness()),
            fetch_timeout: constants::fetch_timeout(),
            failure_backoff: constants::failure_backoff(),
        }
    }
}

/// One fetched quote set. Replaced wholesale, never mutated.
#[derive(Debug, Clone)]
pub struct QuoteSnapshot {
    pub quotes: QuoteSet,
    /// Monotonic fetch time, used for staleness.
    pub fetched_at: Instant,
    /// Wall-clock fetch time, for records and logs.
    pub fetched_at_utc: Timestamp,
    /// Increases by one on every successful refresh, starting at 1.
    pub version: u64,
    /// Name of the source that produced the quotes.
    pub source: String,
}

impl QuoteSnapshot {
    /// Time since the fetch completed.
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

#[derive(Debug, Default)]
struct RefreshState {
    last_failure: Option<Instant>,
    next_version: u64,
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub version: Option<u64>,
    pub age: Option<Duration>,
    pub fetches: u64,
    pub failures: u64,
}

/// Shared quote cache in front of a [`QuoteSource`].
///
/// Readers clone the current `Arc<QuoteSnapshot>` and never wait on I/O.
/// Every fetch, foreground or background, runs behind one async mutex, so
/// concurrent stale readers collapse into a single fetch.
pub struct RateCache {
    source: Arc<dyn QuoteSource>,
    snapshot: RwLock<Option<Arc<QuoteSnapshot>>>,
    refresh_guard: Mutex<RefreshState>,
    config: RateCacheConfig,
    fetches: AtomicU64,
    failures: AtomicU64,
}

impl RateCache {
    /// Create an empty cache.
    pub fn new(source: Arc<dyn QuoteSource>, config: RateCacheConfig) -> Self {
        Self {
            source,
            snapshot: RwLock::new(None),
            refresh_guard: Mutex::new(RefreshState::default()),
            config,
            fetches: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Cache configuration.
    pub fn config(&self) -> &RateCacheConfig {
        &self.config
    }

    /// The reference currency of every snapshot.
    pub fn reference(&self) -> &CurrencyCode {
        &self.config.reference
    }

    /// Current snapshot and its age.
    pub fn get(&self) -> Option<(Arc<QuoteSnapshot>, Duration)> {
        self.snapshot().map(|snapshot| {
            let age = snapshot.age();
            (snapshot, age)
        })
    }

    /// Current snapshot, if any fetch has succeeded.
    pub fn snapshot(&self) -> Option<Arc<QuoteSnapshot>> {
        self.snapshot.read().clone()
    }

    /// True when the cache is empty or the snapshot is past the freshness window.
    pub fn is_stale(&self) -> bool {
        match self.snapshot() {
            Some(snapshot) => self.is_stale_snapshot(&snapshot),
            None => true,
        }
    }

    /// Whether `snapshot` is past the freshness window.
    pub fn is_stale_snapshot(&self, snapshot: &QuoteSnapshot) -> bool {
        snapshot.age() > self.config.freshness_window
    }

    /// Fail with `StaleSnapshot` if `snapshot` is past the staleness ceiling.
    pub fn within_ceiling(&self, snapshot: &QuoteSnapshot) -> FxResult<()> {
        match self.config.max_staleness {
            Some(ceiling) if snapshot.age() > ceiling => Err(FxError::StaleSnapshot {
                age: snapshot.age(),
                ceiling,
            }),
            _ => Ok(()),
        }
    }

    /// Fetch unconditionally and swap in the result.
    ///
    /// Waits for any in-flight fetch first. Ignores the failure backoff. On
    /// failure the previous snapshot is kept.
    pub async fn refresh(&self) -> FxResult<Arc<QuoteSnapshot>> {
        let mut state = self.refresh_guard.lock().await;
        self.fetch_locked(&mut state).await
    }

    /// Fetch only if the cache is still stale once the guard is held.
    pub async fn refresh_if_stale(&self) -> FxResult<Arc<QuoteSnapshot>> {
        let mut state = self.refresh_guard.lock().await;

        if let Some(snapshot) = self.snapshot() {
            if !self.is_stale_snapshot(&snapshot) {
                debug!(version = snapshot.version, "Snapshot refreshed by another caller");
                return Ok(snapshot);
            }
        }

        self.check_backoff(&state)?;
        self.fetch_locked(&mut state).await
    }

    /// Fetch unless the snapshot has moved past `observed` since the caller
    /// looked at it.
    ///
    /// Used when a fresh snapshot lacks a currency: one caller fetches, the
    /// rest reuse its result.
    pub async fn refresh_after(&self, observed: Option<u64>) -> FxResult<Arc<QuoteSnapshot>> {
        let mut state = self.refresh_guard.lock().await;

        if let Some(snapshot) = self.snapshot() {
            if Some(snapshot.version) != observed {
                debug!(
                    version = snapshot.version,
                    observed = ?observed,
                    "Snapshot replaced while waiting"
                );
                return Ok(snapshot);
            }
        }

        self.check_backoff(&state)?;
        self.fetch_locked(&mut state).await
    }

    /// Cache statistics.
    pub fn stats(&self) -> CacheStats {
        let snapshot = self.snapshot();
        CacheStats {
            version: snapshot.as_ref().map(|s| s.version),
            age: snapshot.as_ref().map(|s| s.age()),
            fetches: self.fetches.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn check_backoff(&self, state: &RefreshState) -> FxResult<()> {
        if let Some(failed_at) = state.last_failure {
            let since = failed_at.elapsed();
            if since < self.config.failure_backoff {
                debug!(since_failure = ?since, "Skipping fetch during backoff");
                return Err(FxError::SourceUnavailable(format!(
                    "last fetch failed {since:?} ago, backing off"
                )));
            }
        }
        Ok(())
    }

    async fn fetch_locked(&self, state: &mut RefreshState) -> FxResult<Arc<QuoteSnapshot>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let source = self.source.name().to_string();

        let fetched = match timeout(self.config.fetch_timeout, self.source.fetch_quotes()).await {
            Ok(result) => result,
            Err(_) => Err(FxError::SourceUnavailable(format!(
                "fetch from {source} timed out after {:?}",
                self.config.fetch_timeout
            ))),
        };

        match fetched.and_then(|raw| QuoteSet::from_raw(&self.config.reference, raw)) {
            Ok(quotes) => {
                state.next_version += 1;
                state.last_failure = None;

                let snapshot = Arc::new(QuoteSnapshot {
                    quotes,
                    fetched_at: Instant::now(),
                    fetched_at_utc: now(),
                    version: state.next_version,
                    source,
                });
                *self.snapshot.write() = Some(snapshot.clone());

                info!(
                    version = snapshot.version,
                    source = %snapshot.source,
                    quotes = snapshot.quotes.len(),
                    "Quotes refreshed"
                );
                Ok(snapshot)
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                state.last_failure = Some(Instant::now());
                warn!(source = %source, error = %e, "Quote refresh failed");
                Err(e)
            }
        }
    }
}

/// Shared rate cache.
pub type SharedRateCache = Arc<RateCache>;
