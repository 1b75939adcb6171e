//! FX error types.

use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use wallet_common::{CurrencyCode, CurrencyPair, WalletError};

/// Errors that can occur while fetching quotes or resolving rates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FxError {
    /// The quote source could not be reached or timed out.
    #[error("Quote source unavailable: {0}")]
    SourceUnavailable(String),

    /// The quote source returned data that cannot form a quote set.
    #[error("Quote parse error: {0}")]
    ParseError(String),

    /// The currency has no entry in the quote set.
    #[error("Currency not quoted: {0}")]
    CurrencyNotQuoted(CurrencyCode),

    /// The currency is quoted at zero, or its rate overflows.
    #[error("Quote for {0} is unusable")]
    UnusableQuote(CurrencyCode),

    /// Refresh failed and the last snapshot is past the staleness ceiling.
    #[error("Quotes are {age:?} old, ceiling is {ceiling:?}")]
    StaleSnapshot { age: Duration, ceiling: Duration },

    /// The caller's deadline expired while waiting on a refresh.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Resolved rate falls outside its sanity band.
    #[error("Implausible rate {rate} for {pair}")]
    ImplausibleRate { pair: CurrencyPair, rate: Decimal },
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;

impl From<FxError> for WalletError {
    fn from(error: FxError) -> Self {
        match error {
            FxError::SourceUnavailable(reason) => WalletError::SourceUnavailable(reason),
            FxError::ParseError(reason) => WalletError::ParseError(reason),
            FxError::CurrencyNotQuoted(code) => WalletError::CurrencyNotQuoted(code),
            unusable @ FxError::UnusableQuote(_) => {
                WalletError::SourceUnavailable(unusable.to_string())
            }
            stale @ FxError::StaleSnapshot { .. } => {
                WalletError::SourceUnavailable(stale.to_string())
            }
            FxError::Timeout(reason) => WalletError::Timeout(reason),
            FxError::ImplausibleRate { pair, rate } => WalletError::ImplausibleRate { pair, rate },
        }
    }
}
