//! Bounded retries for GitLab reads and consistency polls.
//!
//! Reads back off exponentially with jitter. The registry eviction poll
//! waits the same interval between every attempt.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How the wait between two attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same pause every time.
    Fixed(Duration),
    /// `base * 2^attempt`, capped at `max`, scaled by a random factor in [0.5, 1.5).
    Exponential { base: Duration, max: Duration },
}

/// Attempt budget plus backoff policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Total tries including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryConfig {
    /// Exponential backoff with jitter, for transient HTTP failures.
    pub fn backoff(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential { base, max },
        }
    }

    /// A poll that waits the same `delay` between each of `attempts` tries.
    pub fn fixed(delay: Duration, attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    /// Pause before retry number `attempt + 1` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let grown = base.as_secs_f64() * 2f64.powi(attempt.min(16) as i32);
                let capped = grown.min(max.as_secs_f64());
                if capped <= 0.0 {
                    return Duration::ZERO;
                }
                let factor = rand::rng().random_range(0.5..1.5);
                Duration::from_secs_f64((capped * factor).min(max.as_secs_f64()))
            }
        }
    }
}

/// What a retry loop ended up doing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetryStats {
    pub attempts: u32,
    /// Time spent sleeping between attempts.
    pub waited: Duration,
}

/// Run `operation` until it succeeds, `should_retry` rejects its error, or
/// the attempt budget is spent. The last error is returned on exhaustion.
pub async fn retry_async<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
) -> (Result<T, E>, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let budget = config.max_attempts.max(1);
    let mut stats = RetryStats::default();

    loop {
        stats.attempts += 1;

        let err = match operation().await {
            Ok(value) => return (Ok(value), stats),
            Err(e) => e,
        };

        if !should_retry(&err) {
            debug!("Giving up on non-retryable error: {}", err);
            return (Err(err), stats);
        }
        if stats.attempts >= budget {
            warn!("Out of attempts after {} tries: {}", stats.attempts, err);
            return (Err(err), stats);
        }

        let delay = config.delay_for(stats.attempts - 1);
        debug!(
            "Attempt {}/{} failed ({}), next try in {:?}",
            stats.attempts, budget, err, delay
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
            stats.waited += delay;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_fixed_delay_never_grows() {
        let config = RetryConfig::fixed(Duration::from_secs(20), 30);
        assert_eq!(config.delay_for(0), Duration::from_secs(20));
        assert_eq!(config.delay_for(29), Duration::from_secs(20));
    }

    #[test]
    fn test_backoff_grows_within_jitter_band() {
        let config = RetryConfig::backoff(5, Duration::from_secs(2), Duration::from_secs(60));
        for _ in 0..20 {
            let first = config.delay_for(0);
            assert!(first >= Duration::from_secs(1) && first < Duration::from_secs(3));
            let third = config.delay_for(2);
            assert!(third >= Duration::from_secs(4) && third < Duration::from_secs(12));
        }
    }

    #[test]
    fn test_backoff_respects_cap() {
        let config = RetryConfig::backoff(10, Duration::from_secs(10), Duration::from_secs(30));
        for attempt in 0..40 {
            assert!(config.delay_for(attempt) <= Duration::from_secs(30));
        }
    }

    #[tokio::test]
    async fn test_poll_until_empty() {
        let config = RetryConfig::fixed(Duration::ZERO, 30);
        let remaining = AtomicU32::new(3);

        let (result, stats) = retry_async(
            &config,
            || async {
                match remaining.fetch_sub(1, Ordering::SeqCst) {
                    1 => Ok("empty"),
                    left => Err(format!("{} repositories left", left - 1)),
                }
            },
            |_: &String| true,
        )
        .await;

        assert_eq!(result.unwrap(), "empty");
        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.waited, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_budget_exhausted_returns_last_error() {
        let config = RetryConfig::fixed(Duration::ZERO, 30);
        let calls = AtomicU32::new(0);

        let (result, stats) = retry_async(
            &config,
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err::<(), _>(format!("poll {}", n))
            },
            |_: &String| true,
        )
        .await;

        assert_eq!(result.unwrap_err(), "poll 30");
        assert_eq!(stats.attempts, 30);
        assert_eq!(calls.load(Ordering::SeqCst), 30);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let config = RetryConfig::fixed(Duration::ZERO, 3);
        let (result, stats) = retry_async(
            &config,
            || async { Err::<(), _>("404 Not Found".to_string()) },
            |e: &String| !e.starts_with("404"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(stats.attempts, 1);
    }

    #[tokio::test]
    async fn test_zero_budget_runs_once() {
        let config = RetryConfig::fixed(Duration::ZERO, 0);
        let (result, stats) =
            retry_async(&config, || async { Ok::<_, String>(()) }, |_: &String| true).await;
        assert!(result.is_ok());
        assert_eq!(stats.attempts, 1);
    }
}
