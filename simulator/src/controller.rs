//! Simulation controller.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use wallet_common::{Currency, Result as WalletResult, UserId};
use wallet_engine::{ExchangeRequest, MetricsSnapshot, TransferRequest, WalletConfig, WalletService};
use wallet_fx::{FxError, RefresherReport, StaticQuoteSource};
use wallet_ledger::{InMemoryLedgerStore, LedgerStore};

use crate::market::Market;
use crate::metrics::{Operation, SimulationMetrics};
use crate::scenario::Scenario;

/// Knobs for one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    /// Number of wallet users.
    pub users: u64,
    /// Number of concurrent workers issuing operations.
    pub workers: usize,
    /// Length of the run.
    pub duration: Duration,
    /// Pause between two operations of one worker.
    pub pause: Duration,
    /// How often the simulated market moves.
    pub drift_interval: Duration,
    /// Opening deposit per user and supported currency.
    pub initial_funds: Decimal,
    /// Random seed for reproducibility.
    pub seed: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            users: 10,
            workers: 8,
            duration: Duration::from_secs(10),
            pause: Duration::from_millis(5),
            drift_interval: Duration::from_millis(250),
            initial_funds: Decimal::from(10_000),
            seed: None,
        }
    }
}

/// Outcome of a run whose ledger passed the conservation audit.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scenario: &'static str,
    pub seed: u64,
    pub elapsed_ms: u64,
    pub users: u64,
    pub workers: usize,
    pub operations: u64,
    pub committed: BTreeMap<Operation, u64>,
    pub failures: BTreeMap<&'static str, u64>,
    pub success_rate: f64,
    pub throughput: f64,
    pub latency_avg_us: u64,
    pub latency_p50_us: u64,
    pub latency_p99_us: u64,
    pub wallet: MetricsSnapshot,
    pub refresher: RefresherReport,
    pub quote_fetches: u64,
    /// Sum of every user's balance per currency.
    pub totals: BTreeMap<Currency, Decimal>,
}

/// Controls the simulation.
pub struct SimulationController {
    settings: SimulationSettings,
    scenario: Scenario,
    service: Arc<WalletService>,
    store: Arc<InMemoryLedgerStore>,
    source: Arc<StaticQuoteSource>,
    market: Market,
    seed: u64,
}

impl SimulationController {
    /// Create a controller with a fresh ledger and a simulated quote source.
    pub fn new(mut config: WalletConfig, scenario: Scenario, settings: SimulationSettings) -> anyhow::Result<Self> {
        scenario.tune(&mut config);

        let market = Market::new();
        let source = Arc::new(StaticQuoteSource::new("simulated-market"));
        source.set_quotes(market.quotes(&config.reference_currency, config.quote_convention)?);

        let store = Arc::new(InMemoryLedgerStore::new());
        let service = WalletService::new(config, source.clone(), store.clone())?;
        let seed = settings.seed.unwrap_or_else(rand::random);

        Ok(Self {
            settings,
            scenario,
            service: Arc::new(service),
            store,
            source,
            market,
            seed,
        })
    }

    /// The service under test.
    pub fn service(&self) -> &Arc<WalletService> {
        &self.service
    }

    /// Run the scenario, then audit the ledger.
    pub async fn run(self) -> anyhow::Result<SimulationReport> {
        info!(
            scenario = self.scenario.name,
            users = self.settings.users,
            workers = self.settings.workers,
            seed = self.seed,
            "Running scenario: {}",
            self.scenario.description
        );

        let users = self.fund_users().await?;
        let started = Instant::now();
        let stop_at = started + self.settings.duration;

        let refresher = self.service.refresher().spawn();
        let (stop_tx, stop_rx) = watch::channel(false);
        let drift = self.spawn_drift(stop_rx);
        let outage = self.spawn_outage();

        let workers = (0..self.settings.workers).map(|index| {
            let worker = Worker {
                service: self.service.clone(),
                users: users.clone(),
                currencies: self.service.config().supported_currencies.clone(),
                hot_user: self.scenario.hot_user,
                pause: self.settings.pause,
                rng: StdRng::seed_from_u64(self.seed.wrapping_add(index as u64 + 1)),
            };
            tokio::spawn(worker.run(stop_at))
        });

        let mut metrics = SimulationMetrics::new();
        for result in join_all(workers).await {
            metrics.merge(result?);
        }
        let elapsed = started.elapsed();

        let _ = stop_tx.send(true);
        drift.await?;
        if let Some(outage) = outage {
            outage.abort();
        }
        let refresher = refresher.stop().await;

        let totals = self.audit().await?;
        info!(
            operations = metrics.total_operations,
            failed = metrics.failed_operations,
            "Ledger audit passed"
        );

        Ok(SimulationReport {
            scenario: self.scenario.name,
            seed: self.seed,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            users: self.settings.users,
            workers: self.settings.workers,
            operations: metrics.total_operations,
            success_rate: metrics.success_rate(),
            throughput: metrics.throughput(elapsed),
            latency_avg_us: metrics.average_latency_us(),
            latency_p50_us: metrics.p50_latency_us(),
            latency_p99_us: metrics.p99_latency_us(),
            committed: metrics.committed,
            failures: metrics.failures,
            wallet: self.service.metrics().snapshot(),
            refresher,
            quote_fetches: self.source.fetch_count(),
            totals,
        })
    }

    /// Open every account and deposit the opening funds.
    async fn fund_users(&self) -> anyhow::Result<Arc<Vec<UserId>>> {
        let mut users = Vec::with_capacity(self.settings.users as usize);

        for id in 1..=self.settings.users {
            let user = UserId::new(id);
            self.service.open_account(user).await?;
            for currency in &self.service.config().supported_currencies {
                self.service
                    .deposit(user, *currency, self.settings.initial_funds)
                    .await?;
            }
            users.push(user);
        }

        info!(users = users.len(), funds = %self.settings.initial_funds, "Funded users");
        Ok(Arc::new(users))
    }

    /// Move the market until told to stop.
    fn spawn_drift(&self, mut stop_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let mut market = self.market.clone();
        let source = self.source.clone();
        let config = self.service.config();
        let reference = config.reference_currency.clone();
        let convention = config.quote_convention;
        let interval = self.settings.drift_interval;
        let mut rng = StdRng::seed_from_u64(self.seed);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        market.drift(&mut rng);
                        match market.quotes(&reference, convention) {
                            Ok(quotes) => source.set_quotes(quotes),
                            Err(e) => warn!(error = %e, "Market produced no quotes"),
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        })
    }

    /// Fail the quote source for the scenario's outage window.
    fn spawn_outage(&self) -> Option<JoinHandle<()>> {
        let (starts, ends) = self.scenario.outage?.window(self.settings.duration);
        let source = self.source.clone();

        Some(tokio::spawn(async move {
            tokio::time::sleep(starts).await;
            warn!("Quote source outage started");
            source.fail_with(FxError::SourceUnavailable("simulated outage".to_string()));

            if let Some(ends) = ends {
                tokio::time::sleep(ends.saturating_sub(starts)).await;
                source.recover();
                info!("Quote source recovered");
            }
        }))
    }

    /// Check that no balance is negative and that balances match the journal.
    async fn audit(&self) -> anyhow::Result<BTreeMap<Currency, Decimal>> {
        let mut totals: BTreeMap<Currency, Decimal> =
            Currency::ALL.iter().map(|currency| (*currency, Decimal::ZERO)).collect();

        for user in self.store.users() {
            let balance = self.store.balance(user).await?;
            if !balance.is_non_negative() {
                anyhow::bail!("user {user} has a negative balance: {balance:?}");
            }
            for (currency, amount) in balance.iter() {
                *totals.entry(currency).or_default() += amount;
            }
        }

        let journal = self.store.journal().net_totals();
        for (currency, total) in &totals {
            let journaled = journal.get(currency).copied().unwrap_or_default();
            if *total != journaled {
                anyhow::bail!("{currency} balances total {total} but the journal nets {journaled}");
            }
        }

        Ok(totals)
    }
}

/// One concurrent client of the wallet.
struct Worker {
    service: Arc<WalletService>,
    users: Arc<Vec<UserId>>,
    currencies: Vec<Currency>,
    hot_user: bool,
    pause: Duration,
    rng: StdRng,
}

impl Worker {
    async fn run(mut self, stop_at: Instant) -> SimulationMetrics {
        let mut metrics = SimulationMetrics::new();

        while Instant::now() < stop_at {
            let started = std::time::Instant::now();
            let (operation, result) = self.step().await;
            let latency = started.elapsed();

            match result {
                Ok(()) => metrics.record_success(operation, latency),
                Err(e) => {
                    debug!(?operation, error = %e, "Operation rejected");
                    metrics.record_failure(e.error_code(), latency);
                }
            }

            if self.pause.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.pause).await;
            }
        }

        metrics
    }

    async fn step(&mut self) -> (Operation, WalletResult<()>) {
        let user = self.pick_user();

        match self.rng.gen_range(0..10) {
            0..=3 if self.currencies.len() > 1 => {
                let from = self.pick_currency();
                let to = self.pick_other_currency(from);
                let request = ExchangeRequest::new(user, from, to, self.amount(50_000));
                let result = self.service.exchange(request).await.map(|_| ());
                (Operation::Exchange, result)
            }
            4..=6 if self.users.len() > 1 => {
                let other = self.pick_other_user(user);
                let (from, to) = if self.rng.gen_bool(0.5) { (user, other) } else { (other, user) };
                let request = TransferRequest::new(from, to, self.pick_currency(), self.amount(20_000));
                let result = self.service.transfer(request).await.map(|_| ());
                (Operation::Transfer, result)
            }
            9 => {
                let (currency, amount) = (self.pick_currency(), self.amount(10_000));
                let result = self.service.deposit(user, currency, amount).await.map(|_| ());
                (Operation::Deposit, result)
            }
            _ => {
                let (currency, amount) = (self.pick_currency(), self.amount(5_000));
                let result = self.service.withdraw(user, currency, amount).await.map(|_| ());
                (Operation::Withdraw, result)
            }
        }
    }

    fn pick_user(&mut self) -> UserId {
        if self.hot_user {
            return self.users[0];
        }
        self.users[self.rng.gen_range(0..self.users.len())]
    }

    fn pick_other_user(&mut self, user: UserId) -> UserId {
        loop {
            let other = self.users[self.rng.gen_range(0..self.users.len())];
            if other != user {
                return other;
            }
        }
    }

    fn pick_currency(&mut self) -> Currency {
        self.currencies[self.rng.gen_range(0..self.currencies.len())]
    }

    fn pick_other_currency(&mut self, currency: Currency) -> Currency {
        loop {
            let other = self.pick_currency();
            if other != currency {
                return other;
            }
        }
    }

    /// A random amount between 1.00 and `max_cents` / 100.
    fn amount(&mut self, max_cents: i64) -> Decimal {
        Decimal::new(self.rng.gen_range(100..max_cents), 2)
    }
}
