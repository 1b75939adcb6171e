//! Plausibility bands for resolved rates.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::warn;
use wallet_common::{Currency, CurrencyPair};

use crate::error::{FxError, FxResult};

/// Inclusive range a rate must fall in. Either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateBand {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

impl RateBand {
    /// Band with both sides set.
    pub fn between(min: Decimal, max: Decimal) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Band with only an upper bound.
    pub fn at_most(max: Decimal) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// Band with only a lower bound.
    pub fn at_least(min: Decimal) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Whether `rate` is inside the band.
    pub fn contains(&self, rate: Decimal) -> bool {
        self.min.map_or(true, |min| rate >= min) && self.max.map_or(true, |max| rate <= max)
    }
}

impl fmt::Display for RateBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(min) = self.min {
            write!(f, "{min}")?;
        }
        f.write_str("..")?;
        if let Some(max) = self.max {
            write!(f, "{max}")?;
        }
        Ok(())
    }
}

impl FromStr for RateBand {
    type Err = String;

    /// Parse `min..max`, `..max` or `min..`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (min, max) = s
            .split_once("..")
            .ok_or_else(|| format!("invalid rate band {s:?}: expected min..max"))?;

        let parse_side = |side: &str| -> Result<Option<Decimal>, String> {
            let side = side.trim();
            if side.is_empty() {
                return Ok(None);
            }
            side.parse::<Decimal>()
                .map(Some)
                .map_err(|e| format!("invalid bound {side:?}: {e}"))
        };

        let band = Self {
            min: parse_side(min)?,
            max: parse_side(max)?,
        };

        if let (Some(min), Some(max)) = (band.min, band.max) {
            if min > max {
                return Err(format!("invalid rate band {s:?}: min exceeds max"));
            }
        }

        Ok(band)
    }
}

/// Per-pair sanity bands. Pairs without a band pass unchecked.
#[derive(Debug, Clone, PartialEq)]
pub struct SanityBounds {
    bands: HashMap<CurrencyPair, RateBand>,
}

impl SanityBounds {
    /// No bands at all.
    pub fn unchecked() -> Self {
        Self {
            bands: HashMap::new(),
        }
    }

    /// Add or replace the band for a pair.
    pub fn with_band(mut self, pair: CurrencyPair, band: RateBand) -> Self {
        self.bands.insert(pair, band);
        self
    }

    /// Band configured for a pair.
    pub fn band(&self, pair: &CurrencyPair) -> Option<&RateBand> {
        self.bands.get(pair)
    }

    /// Number of configured bands.
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Fail with `ImplausibleRate` if `rate` is outside the pair's band.
    pub fn check(&self, pair: &CurrencyPair, rate: Decimal) -> FxResult<()> {
        if pair.is_identity() {
            return Ok(());
        }

        match self.bands.get(pair) {
            Some(band) if !band.contains(rate) => {
                warn!(pair = %pair, rate = %rate, band = %band, "Rejected implausible rate");
                Err(FxError::ImplausibleRate { pair: *pair, rate })
            }
            _ => Ok(()),
        }
    }

    /// Parse a comma-separated table such as `USD/RUB=10..100,RUB/USD=..0.05`.
    pub fn parse(table: &str) -> Result<Self, String> {
        let mut bounds = Self::unchecked();

        for entry in table.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (pair, band) = entry
                .split_once('=')
                .ok_or_else(|| format!("invalid bound entry {entry:?}: expected PAIR=min..max"))?;
            let (base, quote) = pair
                .split_once('/')
                .ok_or_else(|| format!("invalid pair {pair:?}: expected BASE/QUOTE"))?;

            let base: Currency = base.parse().map_err(|e| format!("{e}"))?;
            let quote: Currency = quote.parse().map_err(|e| format!("{e}"))?;
            let band: RateBand = band.parse()?;

            bounds.bands.insert(CurrencyPair::new(base, quote), band);
        }

        Ok(bounds)
    }
}

impl Default for SanityBounds {
    /// Bands for the pairs whose rates are well known to be stable.
    fn default() -> Self {
        let two = Decimal::TWO;
        let five_cents = Decimal::new(5, 2);

        Self::unchecked()
            .with_band(
                CurrencyPair::new(Currency::Usd, Currency::Rub),
                RateBand::between(Decimal::TEN, Decimal::ONE_HUNDRED),
            )
            .with_band(
                CurrencyPair::new(Currency::Rub, Currency::Usd),
                RateBand::at_most(five_cents),
            )
            .with_band(
                CurrencyPair::new(Currency::Usd, Currency::Eur),
                RateBand::at_most(two),
            )
            .with_band(
                CurrencyPair::new(Currency::Eur, Currency::Usd),
                RateBand::at_most(two),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_table() {
        let bounds = SanityBounds::default();
        let usd_rub = CurrencyPair::new(Currency::Usd, Currency::Rub);

        assert!(bounds.check(&usd_rub, dec!(80)).is_ok());
        assert!(bounds.check(&usd_rub, dec!(10)).is_ok());
        assert!(bounds.check(&usd_rub, dec!(100)).is_ok());
        assert_eq!(
            bounds.check(&usd_rub, dec!(9.99)),
            Err(FxError::ImplausibleRate { pair: usd_rub, rate: dec!(9.99) })
        );
        assert!(bounds.check(&usd_rub, dec!(100.01)).is_err());

        let rub_usd = usd_rub.inverse();
        assert!(bounds.check(&rub_usd, dec!(0.0125)).is_ok());
        assert!(bounds.check(&rub_usd, dec!(0.06)).is_err());

        let usd_eur = CurrencyPair::new(Currency::Usd, Currency::Eur);
        assert!(bounds.check(&usd_eur, dec!(1.125)).is_ok());
        assert!(bounds.check(&usd_eur, dec!(2.5)).is_err());
    }

    #[test]
    fn test_unbanded_pairs_pass() {
        let bounds = SanityBounds::default();
        let eur_rub = CurrencyPair::new(Currency::Eur, Currency::Rub);

        assert!(bounds.band(&eur_rub).is_none());
        assert!(bounds.check(&eur_rub, dec!(1000000)).is_ok());
    }

    #[test]
    fn test_identity_never_checked() {
        let usd = CurrencyPair::new(Currency::Usd, Currency::Usd);
        let bounds = SanityBounds::unchecked().with_band(usd, RateBand::at_least(dec!(5)));

        assert!(bounds.check(&usd, Decimal::ONE).is_ok());
    }

    #[test]
    fn test_parse_table() {
        let bounds = SanityBounds::parse("USD/RUB=10..100, rub/usd=..0.05,EUR/USD=0.5..").unwrap();

        assert_eq!(bounds.len(), 3);
        assert_eq!(
            bounds.band(&CurrencyPair::new(Currency::Rub, Currency::Usd)),
            Some(&RateBand::at_most(dec!(0.05)))
        );
        assert_eq!(
            bounds.band(&CurrencyPair::new(Currency::Eur, Currency::Usd)),
            Some(&RateBand::at_least(dec!(0.5)))
        );
        assert!(SanityBounds::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(SanityBounds::parse("USDRUB=1..2").is_err());
        assert!(SanityBounds::parse("USD/GBP=1..2").is_err());
        assert!(SanityBounds::parse("USD/RUB=5..1").is_err());
        assert!(SanityBounds::parse("USD/RUB=abc").is_err());
    }
}
