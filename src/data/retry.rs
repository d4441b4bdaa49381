//! Retry policy for explorer requests.
//!
//! One policy object, applied the same way at every call site:
//!
//! - every failed attempt (network error, 429, other non-2xx, bad body) uses up one
//!   attempt; `max_attempts` is the total number of requests issued
//! - the delay before attempt `n + 1` is derived from `base_delay` and `backoff`
//! - `retry_on` narrows which HTTP statuses are worth retrying; 429 and network
//!   errors are always retried

use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;
use rand::Rng;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FetchError;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Always `base_delay`.
    None,
    /// `base_delay * n` after the n-th failure.
    Linear,
    /// `base_delay * 2^(n-1)` after the n-th failure.
    Exponential,
}

/// Which HTTP failures are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOn {
    /// Every failure.
    Any,
    /// Only these status codes (plus 429 and network errors).
    Only(BTreeSet<u16>),
}

impl FromStr for RetryOn {
    type Err = String;

    /// `any`, or a comma-separated list of status codes (`500,502,503`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("any") {
            return Ok(RetryOn::Any);
        }
        let mut codes = BTreeSet::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let code: u16 = part
                .parse()
                .map_err(|_| format!("invalid status code '{part}'"))?;
            if StatusCode::from_u16(code).is_err() {
                return Err(format!("invalid status code '{part}'"));
            }
            codes.insert(code);
        }
        Ok(RetryOn::Only(codes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
    pub retry_on: RetryOn,
    /// Upper bound of random delay added to each wait.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            backoff: Backoff::Linear,
            retry_on: RetryOn::Any,
            jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries immediately. Handy in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            backoff: Backoff::None,
            retry_on: RetryOn::Any,
            jitter: Duration::ZERO,
        }
    }

    /// Delay (without jitter) after the `attempt`-th failure, 1-based.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self.backoff {
            Backoff::None => self.base_delay,
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
        }
    }

    pub fn should_retry(&self, err: &FetchError) -> bool {
        match err {
            FetchError::Transient(_) | FetchError::RateLimited { .. } => true,
            FetchError::Http { status } => match &self.retry_on {
                RetryOn::Any => true,
                RetryOn::Only(codes) => codes.contains(&status.as_u16()),
            },
            FetchError::Decode(_) => self.retry_on == RetryOn::Any,
            FetchError::Exhausted { .. } => false,
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the attempt
    /// budget is spent. `op` receives the 1-based attempt number.
    pub fn run<T>(
        &self,
        what: &str,
        mut op: impl FnMut(u32) -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.should_retry(&err) {
                warn!(%what, attempt, error = %err, "not retrying");
                return Err(err);
            }
            if attempt >= max_attempts {
                return Err(FetchError::Exhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.delay_after(attempt) + self.sample_jitter();
            match &err {
                FetchError::RateLimited { .. } => {
                    warn!(%what, attempt, delay_ms = delay.as_millis() as u64, "rate limit hit, retrying")
                }
                other => {
                    warn!(%what, attempt, delay_ms = delay.as_millis() as u64, error = %other, "request failed, retrying")
                }
            }
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            attempt += 1;
        }
    }

    fn sample_jitter(&self) -> Duration {
        let max_ms = self.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate_limited() -> FetchError {
        FetchError::RateLimited {
            status: StatusCode::TOO_MANY_REQUESTS,
        }
    }

    #[test]
    fn delay_grows_per_backoff() {
        let mut policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            ..RetryPolicy::default()
        };

        policy.backoff = Backoff::None;
        assert_eq!(policy.delay_after(3), Duration::from_millis(100));

        policy.backoff = Backoff::Linear;
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(3), Duration::from_millis(300));

        policy.backoff = Backoff::Exponential;
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(4), Duration::from_millis(800));
    }

    #[test]
    fn every_failure_consumes_an_attempt() {
        let policy = RetryPolicy::immediate(3);
        let mut calls = 0;
        let result: Result<(), _> = policy.run("test", |_| {
            calls += 1;
            Err(rate_limited())
        });

        assert_eq!(calls, 3);
        match result {
            Err(FetchError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::immediate(5);
        let result = policy.run("test", |attempt| {
            if attempt < 3 {
                Err(FetchError::Http {
                    status: StatusCode::BAD_GATEWAY,
                })
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn status_filter_stops_on_unlisted_codes() {
        let policy = RetryPolicy {
            retry_on: "503".parse().unwrap(),
            ..RetryPolicy::immediate(5)
        };
        let mut calls = 0;
        let result: Result<(), _> = policy.run("test", |_| {
            calls += 1;
            Err(FetchError::Http {
                status: StatusCode::NOT_FOUND,
            })
        });
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(FetchError::Http { .. })));

        // 429 stays retryable whatever the filter says.
        assert!(policy.should_retry(&rate_limited()));
    }

    #[test]
    fn parses_retry_on() {
        assert_eq!("any".parse::<RetryOn>().unwrap(), RetryOn::Any);
        assert_eq!(
            "500, 503".parse::<RetryOn>().unwrap(),
            RetryOn::Only(BTreeSet::from([500, 503]))
        );
        assert!("5xx".parse::<RetryOn>().is_err());
    }
}
