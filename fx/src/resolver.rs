//! Rate resolution over the cached quote snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::timeout_at;
use tracing::{debug, instrument, warn};
use wallet_common::{Currency, CurrencyPair, Deadline};

use crate::cache::{QuoteSnapshot, SharedRateCache};
use crate::error::{FxError, FxResult};
use crate::quotes::{QuoteConvention, QuoteSet};

/// A conversion rate and the snapshot it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRate {
    pub pair: CurrencyPair,
    /// Units of `pair.quote` bought by one unit of `pair.base`.
    pub rate: Decimal,
    /// `None` for identity rates, which never read the cache.
    pub snapshot_version: Option<u64>,
    pub age: Option<Duration>,
    /// Served past the freshness window because refreshing failed.
    pub stale: bool,
}

impl ResolvedRate {
    fn identity(pair: CurrencyPair) -> Self {
        Self {
            pair,
            rate: Decimal::ONE,
            snapshot_version: None,
            age: None,
            stale: false,
        }
    }
}

/// Derives rates between any two currencies from reference quotes.
pub struct RateResolver {
    cache: SharedRateCache,
    convention: QuoteConvention,
}

impl RateResolver {
    /// Create a resolver over a shared cache.
    pub fn new(cache: SharedRateCache, convention: QuoteConvention) -> Self {
        Self { cache, convention }
    }

    /// The underlying cache.
    pub fn cache(&self) -> &SharedRateCache {
        &self.cache
    }

    /// How quotes are read.
    pub fn convention(&self) -> QuoteConvention {
        self.convention
    }

    /// Rate for converting `from` into `to`.
    ///
    /// Identity pairs resolve to exactly 1 without touching the cache. A
    /// stale cache is refreshed once; if that fails the stale snapshot is
    /// served until it passes the staleness ceiling. A currency missing from
    /// the snapshot triggers one more refresh before failing with
    /// `CurrencyNotQuoted`.
    #[instrument(skip(self, deadline), fields(pair = %CurrencyPair::new(from, to)))]
    pub async fn rate(
        &self,
        from: Currency,
        to: Currency,
        deadline: Deadline,
    ) -> FxResult<ResolvedRate> {
        let pair = CurrencyPair::new(from, to);
        if pair.is_identity() {
            return Ok(ResolvedRate::identity(pair));
        }

        let snapshot = self.usable_snapshot(deadline).await?;
        let snapshot = self.ensure_quoted(snapshot, &[from, to], deadline).await?;
        let rate = cross_rate(&snapshot.quotes, self.convention, from, to)?;

        debug!(rate = %rate, version = snapshot.version, "Resolved rate");

        Ok(ResolvedRate {
            pair,
            rate,
            snapshot_version: Some(snapshot.version),
            age: Some(snapshot.age()),
            stale: self.cache.is_stale_snapshot(&snapshot),
        })
    }

    /// Current raw quotes for `currencies`, through the same refresh and
    /// fallback path as [`rate`](Self::rate). Unquoted currencies are left out.
    pub async fn quotes(
        &self,
        currencies: &[Currency],
        deadline: Deadline,
    ) -> FxResult<BTreeMap<Currency, Decimal>> {
        let snapshot = self.usable_snapshot(deadline).await?;

        Ok(currencies
            .iter()
            .filter_map(|currency| {
                snapshot
                    .quotes
                    .get(&currency.as_code())
                    .map(|quote| (*currency, quote))
            })
            .collect())
    }

    async fn usable_snapshot(&self, deadline: Deadline) -> FxResult<Arc<QuoteSnapshot>> {
        if let Some(snapshot) = self.cache.snapshot() {
            if !self.cache.is_stale_snapshot(&snapshot) {
                debug!(version = snapshot.version, "Cache hit");
                return Ok(snapshot);
            }
        }

        debug!("Cache stale or empty, refreshing");
        let refreshed = match timeout_at(deadline.instant(), self.cache.refresh_if_stale()).await {
            Ok(result) => result,
            Err(_) => Err(FxError::Timeout("deadline expired during quote refresh".to_string())),
        };

        match refreshed {
            Ok(snapshot) => Ok(snapshot),
            Err(error) => self.fall_back(error),
        }
    }

    fn fall_back(&self, error: FxError) -> FxResult<Arc<QuoteSnapshot>> {
        let Some(snapshot) = self.cache.snapshot() else {
            return Err(error);
        };

        self.cache.within_ceiling(&snapshot)?;

        warn!(
            error = %error,
            version = snapshot.version,
            age = ?snapshot.age(),
            "Refresh failed, serving stale quotes"
        );
        Ok(snapshot)
    }

    async fn ensure_quoted(
        &self,
        snapshot: Arc<QuoteSnapshot>,
        currencies: &[Currency],
        deadline: Deadline,
    ) -> FxResult<Arc<QuoteSnapshot>> {
        let Some(absent) = first_absent(&snapshot, currencies) else {
            return Ok(snapshot);
        };

        debug!(currency = %absent, version = snapshot.version, "Currency absent, refreshing");
        let refreshed = match timeout_at(
            deadline.instant(),
            self.cache.refresh_after(Some(snapshot.version)),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => return Err(FxError::Timeout("deadline expired during quote refresh".to_string())),
        };

        let snapshot = match refreshed {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(error = %error, currency = %absent, "Refresh for absent currency failed");
                snapshot
            }
        };

        match first_absent(&snapshot, currencies) {
            Some(absent) => Err(FxError::CurrencyNotQuoted(absent.as_code())),
            None => Ok(snapshot),
        }
    }
}

fn first_absent(snapshot: &QuoteSnapshot, currencies: &[Currency]) -> Option<Currency> {
    currencies
        .iter()
        .find(|currency| !snapshot.quotes.contains(&currency.as_code()))
        .copied()
}

/// Two-hop rate through the reference currency: `rate(from, ref) * rate(ref, to)`.
///
/// A hop touching the reference itself is exactly 1, so pairs with the
/// reference on one side reduce to the direct or reciprocal quote.
pub(crate) fn cross_rate(
    quotes: &QuoteSet,
    convention: QuoteConvention,
    from: Currency,
    to: Currency,
) -> FxResult<Decimal> {
    let reference = quotes.reference();
    let from_code = from.as_code();
    let to_code = to.as_code();

    let into_reference = if &from_code == reference {
        Decimal::ONE
    } else {
        convention.to_reference(&from_code, quotes.require(&from_code)?)?
    };
    let out_of_reference = if &to_code == reference {
        Decimal::ONE
    } else {
        convention.from_reference(&to_code, quotes.require(&to_code)?)?
    };

    into_reference
        .checked_mul(out_of_reference)
        .filter(|rate| !rate.is_zero())
        .ok_or(FxError::UnusableQuote(to_code))
}
