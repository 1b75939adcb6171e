//! Error types for wallet operations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CurrencyCode, CurrencyPair, Currency, UserId};

/// Main error type for wallet operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    /// Quote fetch failed and no usable snapshot exists.
    #[error("Quote source unavailable: {0}")]
    SourceUnavailable(String),

    /// Quote fetch returned unusable data.
    #[error("Quote parse error: {0}")]
    ParseError(String),

    /// Requested currency is absent from the quote set.
    #[error("Currency not quoted: {0}")]
    CurrencyNotQuoted(CurrencyCode),

    /// Resolved rate falls outside the configured plausible band.
    #[error("Implausible rate {rate} for {pair}")]
    ImplausibleRate { pair: CurrencyPair, rate: Decimal },

    /// Applying the mutation would drive a balance negative.
    #[error("Insufficient funds in {currency}: required {required}, available {available}")]
    InsufficientFunds {
        currency: Currency,
        required: Decimal,
        available: Decimal,
    },

    /// Currency is not in the supported set.
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// Amount is non-positive, too precise, or converts to nothing.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Exchange from a currency into itself.
    #[error("Cannot exchange {0} into itself")]
    SameCurrency(Currency),

    /// Transfer from a user to themselves.
    #[error("Cannot transfer from account {0} to itself")]
    SameAccount(UserId),

    /// No ledger row for the user.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// Deadline expired.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl WalletError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletError::SourceUnavailable(_) | WalletError::Timeout(_)
        )
    }

    /// Get the stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            WalletError::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
            WalletError::ParseError(_) => "PARSE_ERROR",
            WalletError::CurrencyNotQuoted(_) => "CURRENCY_NOT_QUOTED",
            WalletError::ImplausibleRate { .. } => "IMPLAUSIBLE_RATE",
            WalletError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WalletError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            WalletError::InvalidAmount(_) => "INVALID_AMOUNT",
            WalletError::SameCurrency(_) => "SAME_CURRENCY",
            WalletError::SameAccount(_) => "SAME_ACCOUNT",
            WalletError::UserNotFound(_) => "USER_NOT_FOUND",
            WalletError::Timeout(_) => "TIMEOUT",
            WalletError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Build the caller-facing response.
    ///
    /// Upstream and timing details stay in logs; only the kind reaches the
    /// caller for those variants.
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            WalletError::SourceUnavailable(_) | WalletError::ParseError(_) => {
                "Exchange rates are temporarily unavailable".to_string()
            }
            WalletError::Timeout(_) => "The operation did not complete in time".to_string(),
            WalletError::Configuration(_) => "Service is misconfigured".to_string(),
            other => other.to_string(),
        };
        ErrorResponse {
            code: self.error_code().to_string(),
            message,
        }
    }
}

/// Result type alias for wallet operations.
pub type Result<T> = std::result::Result<T, WalletError>;

/// Structured error returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl From<&WalletError> for ErrorResponse {
    fn from(error: &WalletError) -> Self {
        error.to_response()
    }
}
