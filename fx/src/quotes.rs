//! Quote sets and the conventions used to read them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wallet_common::CurrencyCode;

use crate::error::{FxError, FxResult};

/// Raw quotes as returned by a source, before validation.
pub type RawQuotes = HashMap<String, Decimal>;

/// How a quote relates a currency to the reference currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteConvention {
    /// Quote is the price of one unit in the reference currency
    /// (`USD = 80` with reference RUB: 1 USD costs 80 RUB).
    #[default]
    ReferencePerUnit,
    /// Quote is how many units one reference unit buys
    /// (`USD = 80` with reference RUB: 1 RUB buys 80 USD).
    UnitsPerReference,
}

impl QuoteConvention {
    /// Rate for converting one unit of the quoted currency into the reference.
    pub fn to_reference(self, code: &CurrencyCode, quote: Decimal) -> FxResult<Decimal> {
        match self {
            QuoteConvention::ReferencePerUnit => usable(code, quote),
            QuoteConvention::UnitsPerReference => reciprocal(code, quote),
        }
    }

    /// Rate for converting one reference unit into the quoted currency.
    pub fn from_reference(self, code: &CurrencyCode, quote: Decimal) -> FxResult<Decimal> {
        match self {
            QuoteConvention::ReferencePerUnit => reciprocal(code, quote),
            QuoteConvention::UnitsPerReference => usable(code, quote),
        }
    }
}

fn usable(code: &CurrencyCode, quote: Decimal) -> FxResult<Decimal> {
    if quote.is_zero() {
        return Err(FxError::UnusableQuote(code.clone()));
    }
    Ok(quote)
}

fn reciprocal(code: &CurrencyCode, quote: Decimal) -> FxResult<Decimal> {
    Decimal::ONE
        .checked_div(quote)
        .filter(|rate| !rate.is_zero())
        .ok_or_else(|| FxError::UnusableQuote(code.clone()))
}

impl fmt::Display for QuoteConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteConvention::ReferencePerUnit => f.write_str("reference_per_unit"),
            QuoteConvention::UnitsPerReference => f.write_str("units_per_reference"),
        }
    }
}

impl FromStr for QuoteConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference_per_unit" => Ok(QuoteConvention::ReferencePerUnit),
            "units_per_reference" => Ok(QuoteConvention::UnitsPerReference),
            other => Err(format!("unknown quote convention: {other}")),
        }
    }
}

/// Validated quotes against a single reference currency.
///
/// The reference currency is always present at exactly 1.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteSet {
    reference: CurrencyCode,
    quotes: HashMap<CurrencyCode, Decimal>,
}

impl QuoteSet {
    /// Validate raw source output.
    ///
    /// Codes are normalized to upper case. Negative quotes, malformed or
    /// duplicated codes, and a reference quote other than 1 are rejected.
    /// Zero quotes are kept and fail at resolution time.
    pub fn from_raw(reference: &CurrencyCode, raw: RawQuotes) -> FxResult<Self> {
        let mut quotes = HashMap::with_capacity(raw.len() + 1);

        for (code, quote) in raw {
            let code = CurrencyCode::parse(&code)
                .map_err(|e| FxError::ParseError(e.to_string()))?;
            if quote.is_sign_negative() && !quote.is_zero() {
                return Err(FxError::ParseError(format!("negative quote {quote} for {code}")));
            }
            if &code == reference && quote != Decimal::ONE {
                return Err(FxError::ParseError(format!(
                    "reference currency {code} quoted at {quote}, expected 1"
                )));
            }
            if quotes.insert(code.clone(), quote).is_some() {
                return Err(FxError::ParseError(format!("duplicate quote for {code}")));
            }
        }

        quotes.insert(reference.clone(), Decimal::ONE);

        Ok(Self {
            reference: reference.clone(),
            quotes,
        })
    }

    /// The reference currency.
    pub fn reference(&self) -> &CurrencyCode {
        &self.reference
    }

    /// Quote for a currency, if present.
    pub fn get(&self, code: &CurrencyCode) -> Option<Decimal> {
        self.quotes.get(code).copied()
    }

    /// Look up a quote or fail with `CurrencyNotQuoted`.
    pub fn require(&self, code: &CurrencyCode) -> FxResult<Decimal> {
        self.get(code)
            .ok_or_else(|| FxError::CurrencyNotQuoted(code.clone()))
    }

    /// Whether the currency is quoted.
    pub fn contains(&self, code: &CurrencyCode) -> bool {
        self.quotes.contains_key(code)
    }

    /// Number of quoted currencies, reference included.
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// Always false: the reference is always quoted.
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Iterate over all quotes.
    pub fn iter(&self) -> impl Iterator<Item = (&CurrencyCode, Decimal)> {
        self.quotes.iter().map(|(code, quote)| (code, *quote))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rub() -> CurrencyCode {
        CurrencyCode::parse("RUB").unwrap()
    }

    #[test]
    fn test_reference_always_present() {
        let raw = RawQuotes::from([("usd".to_string(), dec!(80))]);
        let quotes = QuoteSet::from_raw(&rub(), raw).unwrap();

        assert_eq!(quotes.get(&rub()), Some(Decimal::ONE));
        assert_eq!(quotes.get(&CurrencyCode::parse("USD").unwrap()), Some(dec!(80)));
        assert_eq!(quotes.len(), 2);
    }

    #[test]
    fn test_rejects_bad_reference_quote() {
        let raw = RawQuotes::from([("RUB".to_string(), dec!(2))]);
        assert!(matches!(
            QuoteSet::from_raw(&rub(), raw),
            Err(FxError::ParseError(_))
        ));
    }

    #[test]
    fn test_rejects_negative_and_malformed() {
        let negative = RawQuotes::from([("USD".to_string(), dec!(-1))]);
        assert!(matches!(
            QuoteSet::from_raw(&rub(), negative),
            Err(FxError::ParseError(_))
        ));

        let malformed = RawQuotes::from([("US".to_string(), dec!(80))]);
        assert!(matches!(
            QuoteSet::from_raw(&rub(), malformed),
            Err(FxError::ParseError(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_after_normalization() {
        let raw = RawQuotes::from([
            ("usd".to_string(), dec!(80)),
            ("USD".to_string(), dec!(81)),
        ]);
        assert!(matches!(
            QuoteSet::from_raw(&rub(), raw),
            Err(FxError::ParseError(_))
        ));
    }

    #[test]
    fn test_zero_quote_kept_but_unusable() {
        let usd = CurrencyCode::parse("USD").unwrap();
        let raw = RawQuotes::from([("USD".to_string(), Decimal::ZERO)]);
        let quotes = QuoteSet::from_raw(&rub(), raw).unwrap();

        let quote = quotes.require(&usd).unwrap();
        for convention in [QuoteConvention::ReferencePerUnit, QuoteConvention::UnitsPerReference] {
            assert_eq!(
                convention.from_reference(&usd, quote),
                Err(FxError::UnusableQuote(usd.clone()))
            );
            assert_eq!(
                convention.to_reference(&usd, quote),
                Err(FxError::UnusableQuote(usd.clone()))
            );
        }
    }

    #[test]
    fn test_convention_direction() {
        let usd = CurrencyCode::parse("USD").unwrap();

        let reference_per_unit = QuoteConvention::ReferencePerUnit;
        assert_eq!(reference_per_unit.to_reference(&usd, dec!(80)).unwrap(), dec!(80));
        assert_eq!(reference_per_unit.from_reference(&usd, dec!(80)).unwrap(), dec!(0.0125));

        let units_per_reference = QuoteConvention::UnitsPerReference;
        assert_eq!(units_per_reference.to_reference(&usd, dec!(80)).unwrap(), dec!(0.0125));
        assert_eq!(units_per_reference.from_reference(&usd, dec!(80)).unwrap(), dec!(80));
    }

    #[test]
    fn test_convention_parse() {
        assert_eq!(
            "UNITS_PER_REFERENCE".parse::<QuoteConvention>().unwrap(),
            QuoteConvention::UnitsPerReference
        );
        assert!("per_unit".parse::<QuoteConvention>().is_err());
    }
}
