//! Per-user multi-currency balance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wallet_common::{Currency, Result, WalletError};

/// A user's holdings, one exact amount per currency.
///
/// Every field is non-negative; [`Balance::apply`] refuses changes that
/// would break that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    #[serde(rename = "USD")]
    pub usd: Decimal,
    #[serde(rename = "RUB")]
    pub rub: Decimal,
    #[serde(rename = "EUR")]
    pub eur: Decimal,
}

impl Balance {
    /// A zero balance.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, currency: Currency, amount: Decimal) -> Self {
        *self.slot_mut(currency) = amount;
        self
    }

    /// Amount held in `currency`.
    pub fn get(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Usd => self.usd,
            Currency::Rub => self.rub,
            Currency::Eur => self.eur,
        }
    }

    fn slot_mut(&mut self, currency: Currency) -> &mut Decimal {
        match currency {
            Currency::Usd => &mut self.usd,
            Currency::Rub => &mut self.rub,
            Currency::Eur => &mut self.eur,
        }
    }

    /// Balance after adding `delta` to `currency`.
    ///
    /// Fails with `InsufficientFunds` if the result would be negative.
    pub fn apply(&self, currency: Currency, delta: Decimal) -> Result<Self> {
        let available = self.get(currency);
        let next = available
            .checked_add(delta)
            .ok_or_else(|| WalletError::InvalidAmount(format!("{delta} {currency} overflows balance")))?;

        if next.is_sign_negative() && !next.is_zero() {
            return Err(WalletError::InsufficientFunds {
                currency,
                required: -delta,
                available,
            });
        }

        let mut updated = *self;
        *updated.slot_mut(currency) = next;
        Ok(updated)
    }

    /// Whether every amount is non-negative.
    pub fn is_non_negative(&self) -> bool {
        self.iter().all(|(_, amount)| !amount.is_sign_negative() || amount.is_zero())
    }

    /// Iterate over `(currency, amount)` in currency order.
    pub fn iter(&self) -> impl Iterator<Item = (Currency, Decimal)> + '_ {
        Currency::ALL.into_iter().map(move |currency| (currency, self.get(currency)))
    }
}
