//! Monetary types for the currency wallet.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::WalletError;

/// A currency a wallet can hold.
///
/// The set is closed: balances carry exactly one field per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Rub,
    Eur,
}

impl Currency {
    /// Every currency a wallet can hold.
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Rub, Currency::Eur];

    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Rub => "RUB",
            Currency::Eur => "EUR",
        }
    }

    /// Fractional digits stored for this currency.
    pub fn decimal_places(&self) -> u32 {
        2
    }

    /// The validated quote-set code for this currency.
    pub fn as_code(&self) -> CurrencyCode {
        CurrencyCode(self.code().to_string())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "RUB" => Ok(Currency::Rub),
            "EUR" => Ok(Currency::Eur),
            _ => Err(WalletError::UnsupportedCurrency(s.trim().to_string())),
        }
    }
}

impl TryFrom<&CurrencyCode> for Currency {
    type Error = WalletError;

    fn try_from(code: &CurrencyCode) -> Result<Self, Self::Error> {
        code.as_str().parse()
    }
}

/// Malformed currency code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid currency code {0:?}: expected three ASCII letters")]
pub struct CurrencyCodeError(pub String);

/// A normalized three-letter currency code.
///
/// Quote sources publish many more currencies than a wallet holds, so quote
/// sets are keyed by this type rather than by [`Currency`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parse and upper-case a code.
    pub fn parse(code: &str) -> Result<Self, CurrencyCodeError> {
        let trimmed = code.trim();
        if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(trimmed.to_ascii_uppercase()))
        } else {
            Err(CurrencyCodeError(code.to_string()))
        }
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Currency> for CurrencyCode {
    fn from(currency: Currency) -> Self {
        currency.as_code()
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// A currency pair: one unit of `base` is worth `rate` units of `quote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Currency being sold.
    pub base: Currency,
    /// Currency being bought.
    pub quote: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    /// Get the inverse pair.
    pub fn inverse(&self) -> Self {
        Self {
            base: self.quote,
            quote: self.base,
        }
    }

    /// Whether both sides are the same currency.
    pub fn is_identity(&self) -> bool {
        self.base == self.quote
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// A monetary amount with currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount value (exact decimal).
    pub value: Decimal,
    /// Currency of the amount.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            value: Decimal::ZERO,
            currency,
        }
    }

    /// Check if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    /// Whether the value has no more fractional digits than the currency stores.
    pub fn fits_precision(&self) -> bool {
        self.value.normalize().scale() <= self.currency.decimal_places()
    }

    /// Truncate toward zero to the currency's decimal places.
    ///
    /// Conversions never credit more than the exact product.
    pub fn round_down(&self) -> Self {
        Self {
            value: self
                .value
                .round_dp_with_strategy(self.currency.decimal_places(), RoundingStrategy::ToZero),
            currency: self.currency,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}
