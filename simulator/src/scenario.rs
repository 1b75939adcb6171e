//! Simulation scenarios.

use std::time::Duration;

use serde::Serialize;
use wallet_engine::WalletConfig;

/// A simulation scenario.
#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: &'static str,
    /// Description.
    pub description: &'static str,
    /// Every worker operates on the first user.
    pub hot_user: bool,
    /// Quote source outage, as fractions of the run.
    pub outage: Option<Outage>,
}

/// Window during which the quote source fails every fetch.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Outage {
    /// Fraction of the run after which fetches start failing.
    pub starts_at: f64,
    /// Fraction of the run after which the source recovers. `None` keeps it down.
    pub ends_at: Option<f64>,
}

impl Outage {
    /// Offsets from the start of a run of length `duration`.
    pub fn window(&self, duration: Duration) -> (Duration, Option<Duration>) {
        (
            duration.mul_f64(self.starts_at),
            self.ends_at.map(|end| duration.mul_f64(end)),
        )
    }
}

impl Scenario {
    /// Names accepted by [`Scenario::load`].
    pub const NAMES: [&'static str; 3] = ["steady", "source-outage", "contention"];

    /// Load a scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "steady" => Ok(Self::steady()),
            "source-outage" => Ok(Self::source_outage()),
            "contention" => Ok(Self::contention()),
            _ => Err(anyhow::anyhow!(
                "Unknown scenario: {} (expected one of {})",
                name,
                Self::NAMES.join(", ")
            )),
        }
    }

    /// Adjust the wallet configuration for this scenario.
    ///
    /// The outage scenario shortens the freshness window so the run
    /// actually prices from stale quotes while the source is down.
    pub fn tune(&self, config: &mut WalletConfig) {
        if self.outage.is_some() {
            config.freshness_window = Duration::from_secs(1);
            config.refresh_interval = Duration::from_millis(500);
            config.failure_backoff = Duration::from_millis(250);
            config.max_staleness = Some(Duration::from_secs(3600));
        }
    }

    fn steady() -> Self {
        Self {
            name: "steady",
            description: "Random exchanges, transfers and withdrawals across all users",
            hot_user: false,
            outage: None,
        }
    }

    fn source_outage() -> Self {
        Self {
            name: "source-outage",
            description: "Quote source fails mid-run; exchanges continue on stale quotes",
            hot_user: false,
            outage: Some(Outage {
                starts_at: 0.3,
                ends_at: Some(0.8),
            }),
        }
    }

    fn contention() -> Self {
        Self {
            name: "contention",
            description: "Every worker operates on the same user",
            hot_user: true,
            outage: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_known_scenarios() {
        for name in Scenario::NAMES {
            assert_eq!(Scenario::load(name).unwrap().name, name);
        }
        assert!(Scenario::load("high-volume").is_err());
    }

    #[test]
    fn test_outage_tunes_config() {
        let scenario = Scenario::load("source-outage").unwrap();
        let mut config = WalletConfig::default();
        scenario.tune(&mut config);

        assert_eq!(config.freshness_window, Duration::from_secs(1));
        assert!(config.validate().is_ok());

        let (start, end) = scenario.outage.unwrap().window(Duration::from_secs(10));
        assert_eq!(start.as_millis(), 3000);
        assert_eq!(end.map(|end| end.as_millis()), Some(8000));
    }

    #[test]
    fn test_steady_keeps_defaults() {
        let mut config = WalletConfig::default();
        Scenario::load("steady").unwrap().tune(&mut config);
        assert_eq!(config.freshness_window, WalletConfig::default().freshness_window);
    }
}
