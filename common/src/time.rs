//! Time utilities and default timings for the wallet.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Default timings.
pub mod constants {
    use super::Duration;

    /// How long a fetched quote set counts as fresh (5 minutes).
    pub fn freshness_window() -> Duration {
        Duration::from_secs(5 * 60)
    }

    /// Oldest snapshot still served when refreshes fail (24 hours).
    pub fn max_staleness() -> Duration {
        Duration::from_secs(24 * 60 * 60)
    }

    /// Background refresh period (1 minute).
    pub fn refresh_interval() -> Duration {
        Duration::from_secs(60)
    }

    /// Upper bound on a single quote fetch (5 seconds).
    pub fn fetch_timeout() -> Duration {
        Duration::from_secs(5)
    }

    /// Default deadline for one wallet operation (5 seconds).
    pub fn operation_timeout() -> Duration {
        Duration::from_secs(5)
    }

    /// Pause between foreground refresh attempts after a failure (5 seconds).
    pub fn failure_backoff() -> Duration {
        Duration::from_secs(5)
    }
}

/// A wall-clock timestamp (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// A point in time by which an operation must finish.
///
/// Built on the tokio clock so that paused-time tests control it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `duration` from now.
    pub fn after(duration: Duration) -> Self {
        Self {
            at: Instant::now() + duration,
        }
    }

    /// Deadline at a fixed instant.
    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    /// The instant the deadline expires.
    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Check if the deadline has passed.
    pub fn is_exceeded(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Time left, saturating at zero.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// The earlier of this deadline and `duration` from now.
    pub fn cap(&self, duration: Duration) -> Self {
        let capped = Instant::now() + duration;
        Self {
            at: self.at.min(capped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expiry() {
        let deadline = Deadline::after(Duration::from_secs(10));
        assert!(!deadline.is_exceeded());
        assert_eq!(deadline.remaining(), Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(deadline.is_exceeded());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cap_takes_earlier() {
        let deadline = Deadline::after(Duration::from_secs(10));

        assert_eq!(deadline.cap(Duration::from_secs(2)).remaining(), Duration::from_secs(2));
        assert_eq!(deadline.cap(Duration::from_secs(60)), deadline);
    }
}
