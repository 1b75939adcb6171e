//! Wallet service: exchange, deposit, withdraw and transfer.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::time::timeout_at;
use tracing::{info, instrument, warn};
use wallet_common::{now, Currency, CurrencyPair, Deadline, Money, RecordId, Result, UserId, WalletError};
use wallet_fx::{QuoteSource, RateCache, RateRefresher, RateResolver, ResolvedRate, SharedRateCache};
use wallet_ledger::{AppliedCommand, Balance, LedgerCommand, Posting, SharedLedgerStore};

use crate::config::WalletConfig;
use crate::metrics::{SharedMetrics, WalletMetrics};
use crate::records::{
    ExchangeReceipt, ExchangeRecord, ExchangeRequest, TransferReceipt, TransferRecord, TransferRequest,
};

/// Entry point for every wallet operation.
///
/// Validation and rate resolution happen before the ledger is touched; the
/// ledger mutation for an operation is always one atomic command.
pub struct WalletService {
    config: WalletConfig,
    cache: SharedRateCache,
    resolver: RateResolver,
    store: SharedLedgerStore,
    metrics: SharedMetrics,
}

impl WalletService {
    /// Create a service over a quote source and a ledger store.
    pub fn new(
        config: WalletConfig,
        source: Arc<dyn QuoteSource>,
        store: SharedLedgerStore,
    ) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(RateCache::new(source, config.cache_config()));
        let resolver = RateResolver::new(cache.clone(), config.quote_convention);

        Ok(Self {
            config,
            cache,
            resolver,
            store,
            metrics: Arc::new(WalletMetrics::new()),
        })
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// The shared rate cache.
    pub fn cache(&self) -> &SharedRateCache {
        &self.cache
    }

    /// Background refresher for this service's cache, not yet started.
    pub fn refresher(&self) -> RateRefresher {
        RateRefresher::new(self.cache.clone(), self.config.refresh_interval)
    }

    /// Operation counters.
    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Rate for converting `from` into `to`, checked against its sanity band.
    #[instrument(skip(self))]
    pub async fn resolve_rate(&self, from: Currency, to: Currency) -> Result<ResolvedRate> {
        self.ensure_supported(from)?;
        self.ensure_supported(to)?;
        self.checked_rate(from, to, self.deadline(None)).await
    }

    /// Current quotes for the supported currencies.
    pub async fn quotes(&self) -> Result<BTreeMap<Currency, Decimal>> {
        let quotes = self
            .resolver
            .quotes(&self.config.supported_currencies, self.deadline(None))
            .await?;
        Ok(quotes)
    }

    /// Create a zero balance for `user` if none exists.
    pub async fn open_account(&self, user: UserId) -> Result<Balance> {
        self.store.open(user).await
    }

    /// Current balance of `user`.
    pub async fn balance(&self, user: UserId) -> Result<Balance> {
        self.store.balance(user).await
    }

    /// Convert part of a user's holding into another currency.
    #[instrument(skip(self, request), fields(
        user = %request.user,
        from = %request.from,
        to = %request.to,
        amount = %request.amount
    ))]
    pub async fn exchange(&self, request: ExchangeRequest) -> Result<ExchangeReceipt> {
        self.metrics.exchange_initiated();

        let result = self.try_exchange(&request).await;
        match &result {
            Ok(receipt) => self.metrics.exchange_success(receipt.record.stale_rate),
            Err(e) => {
                if matches!(e, WalletError::ImplausibleRate { .. }) {
                    self.metrics.rate_rejected();
                }
                self.metrics.exchange_failed();
                warn!(error = %e, code = e.error_code(), "Exchange rejected");
            }
        }
        result
    }

    async fn try_exchange(&self, request: &ExchangeRequest) -> Result<ExchangeReceipt> {
        let deadline = self.deadline(request.deadline);

        self.ensure_supported(request.from)?;
        self.ensure_supported(request.to)?;
        if request.from == request.to {
            return Err(WalletError::SameCurrency(request.from));
        }
        validate_amount(Money::new(request.amount, request.from))?;

        let resolved = self.checked_rate(request.from, request.to, deadline).await?;

        let product = request
            .amount
            .checked_mul(resolved.rate)
            .ok_or_else(|| WalletError::InvalidAmount(format!("{} {} overflows on conversion", request.amount, request.from)))?;
        let credited = Money::new(product, request.to).round_down();
        if !credited.is_positive() {
            return Err(WalletError::InvalidAmount(format!(
                "{} {} converts to less than the smallest unit of {}",
                request.amount, request.from, request.to
            )));
        }

        let command = LedgerCommand::new()
            .with(Posting::debit(request.user, request.from, request.amount))
            .with(Posting::credit(request.user, request.to, credited.value));
        let applied = self.apply(command, deadline).await?;
        let balance = resulting_balance(&applied, request.user)?;

        let record = ExchangeRecord {
            id: RecordId::new(),
            command_id: applied.id,
            user: request.user,
            from: request.from,
            to: request.to,
            source_amount: request.amount,
            rate: resolved.rate,
            result_amount: credited.value,
            snapshot_version: resolved.snapshot_version,
            stale_rate: resolved.stale,
            timestamp: now(),
        };

        info!(
            record_id = %record.id,
            command_id = %record.command_id,
            rate = %record.rate,
            result_amount = %record.result_amount,
            snapshot_version = ?record.snapshot_version,
            stale_rate = record.stale_rate,
            "Exchange committed"
        );

        Ok(ExchangeReceipt { record, balance })
    }

    /// Add funds to a user's holding.
    #[instrument(skip(self))]
    pub async fn deposit(&self, user: UserId, currency: Currency, amount: Decimal) -> Result<Balance> {
        let result = self
            .single_posting(user, currency, amount, Posting::credit)
            .await;

        match &result {
            Ok(_) => {
                self.metrics.deposit_applied();
                info!("Deposit committed");
            }
            Err(e) => self.operation_failed("Deposit", e),
        }
        result
    }

    /// Take funds out of a user's holding.
    ///
    /// The ledger refuses the debit if it would overdraw; there is no
    /// separate balance check.
    #[instrument(skip(self))]
    pub async fn withdraw(&self, user: UserId, currency: Currency, amount: Decimal) -> Result<Balance> {
        let result = self
            .single_posting(user, currency, amount, Posting::debit)
            .await;

        match &result {
            Ok(_) => {
                self.metrics.withdrawal_applied();
                info!("Withdrawal committed");
            }
            Err(e) => self.operation_failed("Withdrawal", e),
        }
        result
    }

    async fn single_posting(
        &self,
        user: UserId,
        currency: Currency,
        amount: Decimal,
        posting: fn(UserId, Currency, Decimal) -> Posting,
    ) -> Result<Balance> {
        self.ensure_supported(currency)?;
        validate_amount(Money::new(amount, currency))?;

        let applied = self
            .apply(LedgerCommand::single(posting(user, currency, amount)), self.deadline(None))
            .await?;
        resulting_balance(&applied, user)
    }

    /// Move funds between two users in one currency.
    #[instrument(skip(self, request), fields(
        from = %request.from,
        to = %request.to,
        currency = %request.currency,
        amount = %request.amount
    ))]
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt> {
        let result = self.try_transfer(&request).await;

        match &result {
            Ok(receipt) => {
                self.metrics.transfer_applied();
                info!(record_id = %receipt.record.id, "Transfer committed");
            }
            Err(e) => self.operation_failed("Transfer", e),
        }
        result
    }

    async fn try_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        self.ensure_supported(request.currency)?;
        if request.from == request.to {
            return Err(WalletError::SameAccount(request.from));
        }
        validate_amount(Money::new(request.amount, request.currency))?;

        let command = LedgerCommand::new()
            .with(Posting::debit(request.from, request.currency, request.amount))
            .with(Posting::credit(request.to, request.currency, request.amount));
        let applied = self.apply(command, self.deadline(request.deadline)).await?;

        Ok(TransferReceipt {
            record: TransferRecord::new(applied.id, request),
            from_balance: resulting_balance(&applied, request.from)?,
            to_balance: resulting_balance(&applied, request.to)?,
        })
    }

    async fn checked_rate(&self, from: Currency, to: Currency, deadline: Deadline) -> Result<ResolvedRate> {
        let resolved = self.resolver.rate(from, to, deadline).await?;
        self.config
            .sanity_bounds
            .check(&CurrencyPair::new(from, to), resolved.rate)?;
        Ok(resolved)
    }

    async fn apply(&self, command: LedgerCommand, deadline: Deadline) -> Result<AppliedCommand> {
        match timeout_at(deadline.instant(), self.store.atomic_apply(command)).await {
            Ok(result) => result,
            Err(_) => Err(WalletError::Timeout("deadline expired during ledger apply".to_string())),
        }
    }

    fn deadline(&self, requested: Option<Deadline>) -> Deadline {
        requested.unwrap_or_else(|| Deadline::after(self.config.operation_timeout))
    }

    fn ensure_supported(&self, currency: Currency) -> Result<()> {
        if self.config.supports(currency) {
            Ok(())
        } else {
            Err(WalletError::UnsupportedCurrency(currency.code().to_string()))
        }
    }

    fn operation_failed(&self, operation: &str, error: &WalletError) {
        self.metrics.operation_failed();
        warn!(error = %error, code = error.error_code(), "{operation} rejected");
    }
}

fn validate_amount(amount: Money) -> Result<()> {
    if !amount.is_positive() {
        return Err(WalletError::InvalidAmount(format!("{amount} must be positive")));
    }
    if !amount.fits_precision() {
        return Err(WalletError::InvalidAmount(format!(
            "{amount} has more than {} decimal places",
            amount.currency.decimal_places()
        )));
    }
    Ok(())
}

fn resulting_balance(applied: &AppliedCommand, user: UserId) -> Result<Balance> {
    applied.balance(user).ok_or(WalletError::UserNotFound(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use wallet_fx::{FxError, QuoteConvention, SanityBounds, StaticQuoteSource};
    use wallet_ledger::InMemoryLedgerStore;

    struct Fixture {
        service: Arc<WalletService>,
        source: Arc<StaticQuoteSource>,
        store: Arc<InMemoryLedgerStore>,
    }

    fn fixture(config: WalletConfig) -> Fixture {
        let source = Arc::new(
            StaticQuoteSource::new("test")
                .with_quote("USD", dec!(80))
                .with_quote("EUR", dec!(90)),
        );
        let store = Arc::new(InMemoryLedgerStore::new());
        let service = WalletService::new(config, source.clone(), store.clone()).unwrap();

        Fixture {
            service: Arc::new(service),
            source,
            store,
        }
    }

    fn units_per_reference() -> WalletConfig {
        WalletConfig {
            quote_convention: QuoteConvention::UnitsPerReference,
            ..WalletConfig::default()
        }
    }

    async fn funded(service: &WalletService, user: UserId, balance: Balance) {
        service.open_account(user).await.unwrap();
        for (currency, amount) in balance.iter().filter(|(_, a)| !a.is_zero()) {
            service.deposit(user, currency, amount).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_exchange_at_cross_rate() {
        let fx = fixture(units_per_reference());
        let user = UserId::new(1);
        funded(&fx.service, user, Balance::zero().with(Currency::Usd, dec!(150))).await;

        let receipt = fx
            .service
            .exchange(ExchangeRequest::new(user, Currency::Usd, Currency::Eur, dec!(100)))
            .await
            .unwrap();

        assert_eq!(receipt.record.rate, dec!(1.125));
        assert_eq!(receipt.record.result_amount, dec!(112.5));
        assert_eq!(receipt.balance.usd, dec!(50));
        assert_eq!(receipt.balance.eur, dec!(112.5));
        assert_eq!(receipt.record.snapshot_version, Some(1));
        assert_eq!(fx.service.balance(user).await.unwrap(), receipt.balance);
    }

    #[tokio::test]
    async fn test_exchange_rounds_toward_zero() {
        let fx = fixture(WalletConfig::default());
        let user = UserId::new(1);
        funded(&fx.service, user, Balance::zero().with(Currency::Usd, dec!(150))).await;

        let receipt = fx
            .service
            .exchange(ExchangeRequest::new(user, Currency::Usd, Currency::Eur, dec!(100)))
            .await
            .unwrap();

        assert_eq!(receipt.record.result_amount, dec!(88.88));
        assert_eq!(receipt.balance.eur, dec!(88.88));
    }

    #[tokio::test]
    async fn test_exchange_insufficient_funds_leaves_balance() {
        let fx = fixture(units_per_reference());
        let user = UserId::new(1);
        let initial = Balance::zero().with(Currency::Usd, dec!(50));
        funded(&fx.service, user, initial).await;

        let result = fx
            .service
            .exchange(ExchangeRequest::new(user, Currency::Usd, Currency::Eur, dec!(100)))
            .await;

        assert!(matches!(result, Err(WalletError::InsufficientFunds { .. })));
        assert_eq!(fx.service.balance(user).await.unwrap(), initial);
        assert_eq!(fx.service.metrics().snapshot().exchanges_failed, 1);
    }

    #[tokio::test]
    async fn test_implausible_rate_leaves_balance() {
        let fx = fixture(WalletConfig::default());
        let user = UserId::new(1);
        let initial = Balance::zero().with(Currency::Usd, dec!(100));
        funded(&fx.service, user, initial).await;
        fx.source.set_quote("USD", dec!(500));

        let result = fx
            .service
            .exchange(ExchangeRequest::new(user, Currency::Usd, Currency::Rub, dec!(10)))
            .await;

        assert!(matches!(result, Err(WalletError::ImplausibleRate { .. })));
        assert_eq!(fx.service.balance(user).await.unwrap(), initial);
        assert_eq!(fx.service.metrics().snapshot().rates_rejected, 1);
    }

    #[tokio::test]
    async fn test_exchange_validation() {
        let config = WalletConfig {
            supported_currencies: vec![Currency::Usd, Currency::Rub],
            ..WalletConfig::default()
        };
        let fx = fixture(config);
        let user = UserId::new(1);
        funded(&fx.service, user, Balance::zero().with(Currency::Usd, dec!(100))).await;

        let exchange = |from, to, amount| {
            fx.service
                .exchange(ExchangeRequest::new(user, from, to, amount))
        };

        assert_eq!(
            exchange(Currency::Usd, Currency::Usd, dec!(10)).await,
            Err(WalletError::SameCurrency(Currency::Usd))
        );
        assert_eq!(
            exchange(Currency::Usd, Currency::Eur, dec!(10)).await,
            Err(WalletError::UnsupportedCurrency("EUR".to_string()))
        );
        assert!(matches!(
            exchange(Currency::Usd, Currency::Rub, dec!(0)).await,
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(matches!(
            exchange(Currency::Usd, Currency::Rub, dec!(-5)).await,
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(matches!(
            exchange(Currency::Usd, Currency::Rub, dec!(1.005)).await,
            Err(WalletError::InvalidAmount(_))
        ));
        assert_eq!(fx.source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_exchange_rejects_result_below_smallest_unit() {
        let fx = fixture(WalletConfig::default());
        let user = UserId::new(1);
        funded(&fx.service, user, Balance::zero().with(Currency::Rub, dec!(100))).await;

        let result = fx
            .service
            .exchange(ExchangeRequest::new(user, Currency::Rub, Currency::Usd, dec!(0.01)))
            .await;

        assert!(matches!(result, Err(WalletError::InvalidAmount(_))));
        assert_eq!(fx.service.balance(user).await.unwrap().rub, dec!(100));
    }

    #[tokio::test]
    async fn test_exchange_with_failing_source_and_empty_cache() {
        let fx = fixture(WalletConfig::default());
        let user = UserId::new(1);
        funded(&fx.service, user, Balance::zero().with(Currency::Usd, dec!(100))).await;
        fx.source.fail_with(FxError::SourceUnavailable("down".to_string()));

        let result = fx
            .service
            .exchange(ExchangeRequest::new(user, Currency::Usd, Currency::Rub, dec!(10)))
            .await;

        let error = result.unwrap_err();
        assert_eq!(error.error_code(), "SOURCE_UNAVAILABLE");
        assert!(error.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exchange_uses_stale_rate_when_source_fails() {
        let fx = fixture(units_per_reference());
        let user = UserId::new(1);
        funded(&fx.service, user, Balance::zero().with(Currency::Usd, dec!(300))).await;
        fx.service.resolve_rate(Currency::Usd, Currency::Eur).await.unwrap();

        tokio::time::advance(Duration::from_secs(600)).await;
        fx.source.fail_with(FxError::SourceUnavailable("down".to_string()));

        let receipt = fx
            .service
            .exchange(ExchangeRequest::new(user, Currency::Usd, Currency::Eur, dec!(100)))
            .await
            .unwrap();

        assert!(receipt.record.stale_rate);
        assert_eq!(receipt.record.rate, dec!(1.125));
        assert_eq!(fx.service.metrics().snapshot().stale_rates_used, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exchange_deadline_expires_during_refresh() {
        let fx = fixture(WalletConfig::default());
        let user = UserId::new(1);
        funded(&fx.service, user, Balance::zero().with(Currency::Usd, dec!(100))).await;
        fx.source.set_latency(Duration::from_secs(3));

        let result = fx
            .service
            .exchange(
                ExchangeRequest::new(user, Currency::Usd, Currency::Rub, dec!(10))
                    .with_deadline(Deadline::after(Duration::from_millis(500))),
            )
            .await;

        assert!(matches!(result, Err(WalletError::Timeout(_))));
        assert_eq!(fx.service.balance(user).await.unwrap().usd, dec!(100));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_exchanges_never_overdraw() {
        let fx = fixture(units_per_reference());
        let user = UserId::new(1);
        funded(&fx.service, user, Balance::zero().with(Currency::Usd, dec!(1000))).await;
        fx.service.resolve_rate(Currency::Usd, Currency::Eur).await.unwrap();

        let tasks = (0..25).map(|_| {
            let service = fx.service.clone();
            tokio::spawn(async move {
                service
                    .exchange(ExchangeRequest::new(user, Currency::Usd, Currency::Eur, dec!(150)))
                    .await
            })
        });
        let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 6);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, WalletError::InsufficientFunds { .. })));

        let balance = fx.service.balance(user).await.unwrap();
        assert_eq!(balance.usd, dec!(100));
        assert_eq!(balance.eur, dec!(168.75) * Decimal::from(6));
    }

    #[tokio::test]
    async fn test_deposit_and_withdraw() {
        let fx = fixture(WalletConfig::default());
        let user = UserId::new(7);
        fx.service.open_account(user).await.unwrap();

        let balance = fx.service.deposit(user, Currency::Rub, dec!(250.50)).await.unwrap();
        assert_eq!(balance.rub, dec!(250.50));

        let balance = fx.service.withdraw(user, Currency::Rub, dec!(50.25)).await.unwrap();
        assert_eq!(balance.rub, dec!(200.25));

        assert!(matches!(
            fx.service.withdraw(user, Currency::Rub, dec!(1000)).await,
            Err(WalletError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            fx.service.deposit(user, Currency::Rub, dec!(0.001)).await,
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(matches!(
            fx.service.withdraw(user, Currency::Rub, dec!(-10)).await,
            Err(WalletError::InvalidAmount(_))
        ));
        assert_eq!(
            fx.service.deposit(UserId::new(8), Currency::Rub, dec!(1)).await,
            Err(WalletError::UserNotFound(UserId::new(8)))
        );

        let snapshot = fx.service.metrics().snapshot();
        assert_eq!(snapshot.deposits, 1);
        assert_eq!(snapshot.withdrawals, 1);
        assert_eq!(snapshot.operations_failed, 4);
    }

    #[tokio::test]
    async fn test_transfer() {
        let fx = fixture(WalletConfig::default());
        let alice = UserId::new(1);
        let bob = UserId::new(2);
        funded(&fx.service, alice, Balance::zero().with(Currency::Eur, dec!(100))).await;
        fx.service.open_account(bob).await.unwrap();

        let receipt = fx
            .service
            .transfer(TransferRequest::new(alice, bob, Currency::Eur, dec!(40)))
            .await
            .unwrap();

        assert_eq!(receipt.from_balance.eur, dec!(60));
        assert_eq!(receipt.to_balance.eur, dec!(40));
        assert_eq!(receipt.record.amount, dec!(40));
    }

    #[tokio::test]
    async fn test_transfer_rejections() {
        let fx = fixture(WalletConfig::default());
        let alice = UserId::new(1);
        let ghost = UserId::new(99);
        funded(&fx.service, alice, Balance::zero().with(Currency::Eur, dec!(100))).await;

        assert_eq!(
            fx.service
                .transfer(TransferRequest::new(alice, alice, Currency::Eur, dec!(1)))
                .await,
            Err(WalletError::SameAccount(alice))
        );
        assert_eq!(
            fx.service
                .transfer(TransferRequest::new(alice, ghost, Currency::Eur, dec!(1)))
                .await,
            Err(WalletError::UserNotFound(ghost))
        );
        assert_eq!(fx.service.balance(alice).await.unwrap().eur, dec!(100));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_transfers_conserve_money() {
        let fx = fixture(WalletConfig::default());
        let users: Vec<UserId> = (1..=5).map(UserId::new).collect();
        for user in &users {
            funded(&fx.service, *user, Balance::zero().with(Currency::Usd, dec!(100))).await;
        }

        let tasks = (0..300).map(|i| {
            let service = fx.service.clone();
            let from = users[i % users.len()];
            let to = users[(i * 3 + 1) % users.len()];
            tokio::spawn(async move {
                service
                    .transfer(TransferRequest::new(from, to, Currency::Usd, dec!(12.34)))
                    .await
            })
        });
        join_all(tasks).await;

        let mut total = Decimal::ZERO;
        for user in &users {
            let balance = fx.service.balance(*user).await.unwrap();
            assert!(balance.is_non_negative());
            total += balance.usd;
        }
        assert_eq!(total, dec!(500));
        assert_eq!(fx.store.journal().net_totals()[&Currency::Usd], dec!(500));
    }

    #[tokio::test]
    async fn test_quotes_filtered_to_supported() {
        let config = WalletConfig {
            supported_currencies: vec![Currency::Usd, Currency::Rub],
            ..WalletConfig::default()
        };
        let fx = fixture(config);

        let quotes = fx.service.quotes().await.unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[&Currency::Usd], dec!(80));
        assert_eq!(quotes[&Currency::Rub], Decimal::ONE);
    }

    #[tokio::test]
    async fn test_resolve_rate_applies_sanity_bounds() {
        let config = WalletConfig {
            sanity_bounds: SanityBounds::unchecked(),
            ..WalletConfig::default()
        };
        let fx = fixture(config);
        fx.source.set_quote("USD", dec!(500));

        let resolved = fx.service.resolve_rate(Currency::Usd, Currency::Rub).await.unwrap();
        assert_eq!(resolved.rate, dec!(500));

        let fx = fixture(WalletConfig::default());
        fx.source.set_quote("USD", dec!(500));
        assert!(matches!(
            fx.service.resolve_rate(Currency::Usd, Currency::Rub).await,
            Err(WalletError::ImplausibleRate { .. })
        ));

        let identity = fx.service.resolve_rate(Currency::Eur, Currency::Eur).await.unwrap();
        assert_eq!(identity.rate, Decimal::ONE);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_exchange_debits_exactly_and_never_over_credits(cents in 1i64..=1_500_000) {
            let amount = Decimal::new(cents, 2);
            let (result, balance, rate) = tokio_test::block_on(async {
                let fx = fixture(WalletConfig::default());
                let user = UserId::new(1);
                funded(&fx.service, user, Balance::zero().with(Currency::Usd, dec!(10000))).await;
                let rate = fx.service.resolve_rate(Currency::Usd, Currency::Eur).await.unwrap().rate;

                let result = fx
                    .service
                    .exchange(ExchangeRequest::new(user, Currency::Usd, Currency::Eur, amount))
                    .await;
                (result, fx.service.balance(user).await.unwrap(), rate)
            });

            let exact = amount * rate;
            match result {
                Ok(receipt) => {
                    prop_assert!(receipt.record.result_amount <= exact);
                    prop_assert!(exact - receipt.record.result_amount < dec!(0.01));
                    prop_assert_eq!(balance.usd, dec!(10000) - amount);
                    prop_assert_eq!(balance.eur, receipt.record.result_amount);
                }
                Err(WalletError::InsufficientFunds { .. }) => {
                    prop_assert!(amount > dec!(10000));
                    prop_assert_eq!(balance.usd, dec!(10000));
                }
                Err(WalletError::InvalidAmount(_)) => {
                    prop_assert!(exact < dec!(0.01));
                    prop_assert_eq!(balance.usd, dec!(10000));
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }
}
