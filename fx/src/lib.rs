//! Currency Wallet FX
//!
//! Exchange-rate resolution for the wallet: a quote source seam, a shared
//! snapshot cache with a freshness window, a resolver that derives any pair
//! from reference quotes, plausibility bands, and a background refresher.
//!
//! # Features
//!
//! - Snapshot cache with single-flight refresh and failure backoff
//! - Stale fallback up to a configurable staleness ceiling
//! - Identity, direct, reciprocal and cross rates through one reference
//! - Per-pair sanity bands
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wallet_fx::{RateCache, RateCacheConfig, RateResolver, StaticQuoteSource, QuoteConvention};
//! use wallet_common::{Currency, Deadline};
//!
//! let source = Arc::new(StaticQuoteSource::new("static").with_quote("USD", dec!(80)));
//! let cache = Arc::new(RateCache::new(source, RateCacheConfig::default()));
//! let resolver = RateResolver::new(cache, QuoteConvention::default());
//!
//! let resolved = resolver.rate(Currency::Usd, Currency::Rub, Deadline::after(timeout)).await?;
//! ```

pub mod error;
pub mod quotes;
pub mod source;
pub mod cache;
pub mod resolver;
pub mod bounds;
pub mod refresher;

pub use error::{FxError, FxResult};
pub use quotes::{QuoteConvention, QuoteSet, RawQuotes};
pub use source::{FallbackQuoteSource, QuoteSource, StaticQuoteSource};
pub use cache::{CacheStats, QuoteSnapshot, RateCache, RateCacheConfig, SharedRateCache};
pub use resolver::{RateResolver, ResolvedRate};
pub use bounds::{RateBand, SanityBounds};
pub use refresher::{RateRefresher, RefresherHandle, RefresherReport};
