//! Drifting price model feeding the simulated quote source.

use std::collections::BTreeMap;

use rand::Rng;
use rust_decimal::Decimal;
use wallet_common::{Currency, CurrencyCode};
use wallet_fx::{QuoteConvention, RawQuotes};

/// Prices of every supported currency, in RUB.
#[derive(Debug, Clone)]
pub struct Market {
    prices: BTreeMap<Currency, Decimal>,
}

/// Range a price may drift within, in RUB.
fn band(currency: Currency) -> (Decimal, Decimal) {
    match currency {
        Currency::Usd => (Decimal::from(70), Decimal::from(95)),
        Currency::Eur => (Decimal::from(80), Decimal::from(115)),
        Currency::Rub => (Decimal::ONE, Decimal::ONE),
    }
}

impl Market {
    pub fn new() -> Self {
        let prices = [
            (Currency::Usd, Decimal::from(90)),
            (Currency::Eur, Decimal::from(100)),
            (Currency::Rub, Decimal::ONE),
        ]
        .into_iter()
        .collect();

        Self { prices }
    }

    pub fn price(&self, currency: Currency) -> Decimal {
        self.prices.get(&currency).copied().unwrap_or(Decimal::ONE)
    }

    /// Move every price by at most half a percent, staying inside its band.
    pub fn drift(&mut self, rng: &mut impl Rng) {
        for (currency, price) in self.prices.iter_mut() {
            let (low, high) = band(*currency);
            if low == high {
                continue;
            }

            let basis_points = Decimal::new(rng.gen_range(-50..=50), 4);
            *price = (*price * (Decimal::ONE + basis_points)).round_dp(4).clamp(low, high);
        }
    }

    /// Quotes against `reference`, published in `convention`.
    pub fn quotes(&self, reference: &CurrencyCode, convention: QuoteConvention) -> anyhow::Result<RawQuotes> {
        let reference_currency: Currency = reference.as_str().parse()?;
        let reference_price = self.price(reference_currency);

        let mut quotes = RawQuotes::new();
        for (currency, price) in &self.prices {
            let quote = if *currency == reference_currency {
                Decimal::ONE
            } else {
                let per_unit = price
                    .checked_div(reference_price)
                    .ok_or_else(|| anyhow::anyhow!("cannot price {currency} against {reference}"))?;
                match convention {
                    QuoteConvention::ReferencePerUnit => per_unit,
                    QuoteConvention::UnitsPerReference => Decimal::ONE
                        .checked_div(per_unit)
                        .ok_or_else(|| anyhow::anyhow!("cannot invert {currency} quote"))?,
                }
                .round_dp(10)
            };
            quotes.insert(currency.code().to_string(), quote);
        }

        Ok(quotes)
    }
}

impl Default for Market {
    fn default() -> Self {
        Self::new()
    }
}
