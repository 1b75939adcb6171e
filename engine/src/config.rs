//! Wallet configuration.

use std::time::Duration;

use wallet_common::{constants, Currency, CurrencyCode, Result, WalletError};
use wallet_fx::{QuoteConvention, RateCacheConfig, SanityBounds};

/// Main wallet configuration.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// Currency every quote is expressed against.
    pub reference_currency: CurrencyCode,
    /// Currencies operations accept. A subset of [`Currency::ALL`].
    pub supported_currencies: Vec<Currency>,
    /// How the quote source's numbers are read.
    pub quote_convention: QuoteConvention,
    /// How long fetched quotes count as fresh.
    pub freshness_window: Duration,
    /// Oldest quotes served when refreshing fails. `None` disables the ceiling.
    pub max_staleness: Option<Duration>,
    /// Background refresh period.
    pub refresh_interval: Duration,
    /// Upper bound on one quote fetch.
    pub fetch_timeout: Duration,
    /// Deadline applied to operations that do not bring their own.
    pub operation_timeout: Duration,
    /// Pause between foreground refresh attempts after a failure.
    pub failure_backoff: Duration,
    /// Per-pair plausibility bands.
    pub sanity_bounds: SanityBounds,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            reference_currency: Currency::Rub.as_code(),
            supported_currencies: Currency::ALL.to_vec(),
            quote_convention: QuoteConvention::default(),
            freshness_window: constants::freshness_window(),
            max_staleness: Some(constants::max_staleness()),
            refresh_interval: constants::refresh_interval(),
            fetch_timeout: constants::fetch_timeout(),
            operation_timeout: constants::operation_timeout(),
            failure_backoff: constants::failure_backoff(),
            sanity_bounds: SanityBounds::default(),
        }
    }
}

impl WalletConfig {
    /// Load configuration from `WALLET_*` environment variables.
    ///
    /// Unset variables keep their defaults; malformed ones are an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(code) = lookup("WALLET_REFERENCE_CURRENCY") {
            config.reference_currency = CurrencyCode::parse(&code).map_err(invalid("WALLET_REFERENCE_CURRENCY"))?;
        }

        if let Some(list) = lookup("WALLET_SUPPORTED_CURRENCIES") {
            config.supported_currencies = list
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::parse::<Currency>)
                .collect::<Result<Vec<_>>>()
                .map_err(invalid("WALLET_SUPPORTED_CURRENCIES"))?;
        }

        if let Some(convention) = lookup("WALLET_QUOTE_CONVENTION") {
            config.quote_convention = convention.parse().map_err(invalid("WALLET_QUOTE_CONVENTION"))?;
        }

        if let Some(secs) = lookup("WALLET_FRESHNESS_SECS") {
            config.freshness_window = Duration::from_secs(parse_u64("WALLET_FRESHNESS_SECS", &secs)?);
        }

        if let Some(secs) = lookup("WALLET_MAX_STALENESS_SECS") {
            config.max_staleness = match parse_u64("WALLET_MAX_STALENESS_SECS", &secs)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            };
        }

        if let Some(secs) = lookup("WALLET_REFRESH_INTERVAL_SECS") {
            config.refresh_interval = Duration::from_secs(parse_u64("WALLET_REFRESH_INTERVAL_SECS", &secs)?);
        }

        if let Some(ms) = lookup("WALLET_FETCH_TIMEOUT_MS") {
            config.fetch_timeout = Duration::from_millis(parse_u64("WALLET_FETCH_TIMEOUT_MS", &ms)?);
        }

        if let Some(ms) = lookup("WALLET_OPERATION_TIMEOUT_MS") {
            config.operation_timeout = Duration::from_millis(parse_u64("WALLET_OPERATION_TIMEOUT_MS", &ms)?);
        }

        if let Some(ms) = lookup("WALLET_FAILURE_BACKOFF_MS") {
            config.failure_backoff = Duration::from_millis(parse_u64("WALLET_FAILURE_BACKOFF_MS", &ms)?);
        }

        if let Some(table) = lookup("WALLET_SANITY_BOUNDS") {
            config.sanity_bounds = SanityBounds::parse(&table).map_err(invalid("WALLET_SANITY_BOUNDS"))?;
        }

        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.supported_currencies.is_empty() {
            return Err(WalletError::Configuration("At least one currency must be supported".to_string()));
        }

        if self.freshness_window.is_zero() {
            return Err(WalletError::Configuration("Freshness window cannot be zero".to_string()));
        }

        if let Some(ceiling) = self.max_staleness {
            if ceiling < self.freshness_window {
                return Err(WalletError::Configuration(
                    "Max staleness cannot be shorter than the freshness window".to_string(),
                ));
            }
        }

        if self.refresh_interval.is_zero() {
            return Err(WalletError::Configuration("Refresh interval cannot be zero".to_string()));
        }

        if self.fetch_timeout.is_zero() || self.operation_timeout.is_zero() {
            return Err(WalletError::Configuration("Timeouts cannot be zero".to_string()));
        }

        Ok(())
    }

    /// Whether operations accept `currency`.
    pub fn supports(&self, currency: Currency) -> bool {
        self.supported_currencies.contains(&currency)
    }

    /// Settings for the rate cache.
    pub fn cache_config(&self) -> RateCacheConfig {
        RateCacheConfig {
            reference: self.reference_currency.clone(),
            freshness_window: self.freshness_window,
            max_staleness: self.max_staleness,
            fetch_timeout: self.fetch_timeout,
            failure_backoff: self.failure_backoff,
        }
    }
}

fn invalid<E: std::fmt::Display>(key: &'static str) -> impl Fn(E) -> WalletError {
    move |e| WalletError::Configuration(format!("{key}: {e}"))
}

fn parse_u64(key: &'static str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(invalid(key))
}
