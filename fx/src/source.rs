//! Quote source traits and implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{FxError, FxResult};
use crate::quotes::RawQuotes;

/// Trait for external quote sources.
///
/// A source returns every quote it knows against one reference currency.
/// It owns the wire format; callers only see codes and decimals.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Fetch the full quote set.
    async fn fetch_quotes(&self) -> FxResult<RawQuotes>;
}

/// Tries sources in order and returns the first successful fetch.
pub struct FallbackQuoteSource {
    sources: Vec<Arc<dyn QuoteSource>>,
}

impl FallbackQuoteSource {
    /// Create a new fallback chain.
    pub fn new(sources: Vec<Arc<dyn QuoteSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl QuoteSource for FallbackQuoteSource {
    fn name(&self) -> &str {
        "FALLBACK"
    }

    async fn fetch_quotes(&self) -> FxResult<RawQuotes> {
        let mut last_error = None;

        for source in &self.sources {
            match source.fetch_quotes().await {
                Ok(quotes) => {
                    debug!(
                        source = source.name(),
                        count = quotes.len(),
                        "Got quotes from source"
                    );
                    return Ok(quotes);
                }
                Err(e) => {
                    warn!(
                        source = source.name(),
                        error = %e,
                        "Source failed to return quotes"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| FxError::SourceUnavailable("no quote sources configured".to_string())))
    }
}

/// In-process quote source with settable quotes and failure injection.
///
/// Backs the simulator and the tests; production deployments put a real
/// adapter behind [`QuoteSource`].
pub struct StaticQuoteSource {
    name: String,
    quotes: RwLock<RawQuotes>,
    failure: RwLock<Option<FxError>>,
    latency: RwLock<Duration>,
    fetches: AtomicU64,
}

impl StaticQuoteSource {
    /// Create an empty source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quotes: RwLock::new(RawQuotes::new()),
            failure: RwLock::new(None),
            latency: RwLock::new(Duration::ZERO),
            fetches: AtomicU64::new(0),
        }
    }

    /// Builder-style quote insertion.
    pub fn with_quote(self, code: &str, quote: Decimal) -> Self {
        self.set_quote(code, quote);
        self
    }

    /// Set one quote.
    pub fn set_quote(&self, code: &str, quote: Decimal) {
        self.quotes.write().insert(code.to_string(), quote);
    }

    /// Replace every quote.
    pub fn set_quotes(&self, quotes: RawQuotes) {
        *self.quotes.write() = quotes;
    }

    /// Current value of one quote.
    pub fn quote(&self, code: &str) -> Option<Decimal> {
        self.quotes.read().get(code).copied()
    }

    /// Make every following fetch fail with `error`.
    pub fn fail_with(&self, error: FxError) {
        *self.failure.write() = Some(error);
    }

    /// Stop injecting failures.
    pub fn recover(&self) {
        *self.failure.write() = None;
    }

    /// Delay every fetch by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = latency;
    }

    /// Number of fetches attempted so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl QuoteSource for StaticQuoteSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_quotes(&self) -> FxResult<RawQuotes> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let latency = *self.latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = self.failure.read().clone() {
            return Err(error);
        }

        Ok(self.quotes.read().clone())
    }
}
