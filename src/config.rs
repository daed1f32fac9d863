use super::error::ConfigError;
use std::str::FromStr;
use std::time::Duration;

/// Clinic opens for bookings at 06:00.
pub const DEFAULT_OPENING_HOUR: u32 = 6;
/// Last bookable slot starts at 16:00.
pub const DEFAULT_CLOSING_HOUR: u32 = 16;
pub const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(2);

pub const ENV_OPENING_HOUR: &str = "CLINIC_OPENING_HOUR";
pub const ENV_CLOSING_HOUR: &str = "CLINIC_CLOSING_HOUR";
pub const ENV_COLLABORATOR_TIMEOUT_MS: &str = "CLINIC_COLLABORATOR_TIMEOUT_MS";
pub const ENV_RETRY_ATTEMPTS: &str = "CLINIC_RETRY_ATTEMPTS";
pub const ENV_RETRY_BACKOFF_MS: &str = "CLINIC_RETRY_BACKOFF_MS";

/// How often a transient collaborator failure is retried and how long to wait
/// between attempts. The delay is multiplied after every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub multiplier: u32,
}

impl RetryPolicy {
    /// One attempt, no retry.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
            multiplier: 1,
        }
    }

    pub fn exponential(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
            multiplier: 2,
        }
    }

    /// Delay before retry number `attempt`. Attempts are 1-based, so the wait
    /// after the first failure is `backoff`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_attempt()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub opening_hour: u32,
    pub closing_hour: u32,
    pub collaborator_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            opening_hour: DEFAULT_OPENING_HOUR,
            closing_hour: DEFAULT_CLOSING_HOUR,
            collaborator_timeout: DEFAULT_COLLABORATOR_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    /// Defaults overridden by the `CLINIC_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(hour) = read_number(&lookup, ENV_OPENING_HOUR)? {
            config.opening_hour = hour;
        }
        if let Some(hour) = read_number(&lookup, ENV_CLOSING_HOUR)? {
            config.closing_hour = hour;
        }
        if let Some(ms) = read_number(&lookup, ENV_COLLABORATOR_TIMEOUT_MS)? {
            config.collaborator_timeout = Duration::from_millis(ms);
        }
        if let Some(attempts) = read_number(&lookup, ENV_RETRY_ATTEMPTS)? {
            config.retry.max_attempts = attempts;
            config.retry.multiplier = 2;
        }
        if let Some(ms) = read_number(&lookup, ENV_RETRY_BACKOFF_MS)? {
            config.retry.backoff = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_window(mut self, opening_hour: u32, closing_hour: u32) -> Self {
        self.opening_hour = opening_hour;
        self.closing_hour = closing_hour;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.collaborator_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.opening_hour > self.closing_hour || self.closing_hour > 23 {
            return Err(ConfigError::InvalidWindow {
                opening: self.opening_hour,
                closing: self.closing_hour,
            });
        }
        if self.collaborator_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }
}

fn read_number<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
    }
}
