//! Runtime configuration.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_LOG_CHANNEL: &str = "storesync";
pub const DEFAULT_MAX_EXECUTION_TIME: Duration = Duration::from_secs(300);
pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_API_VERSION: &str = "2024-01";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_WORKER_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings shared by the dispatcher, runner and workers.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Lock expiry; the longest double run tolerated after a crash.
    pub lock_ttl: Duration,
    pub log_channel: String,
    /// `None` disables the execution budget.
    pub max_execution_time: Option<Duration>,
    pub chunk_size: usize,
    pub api_version: String,
    pub http_timeout: Duration,
    pub worker_poll_interval: Duration,
    pub redis_url: Option<String>,
    pub database_url: Option<SecretString>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lock_ttl: DEFAULT_LOCK_TTL,
            log_channel: DEFAULT_LOG_CHANNEL.to_string(),
            max_execution_time: Some(DEFAULT_MAX_EXECUTION_TIME),
            chunk_size: DEFAULT_CHUNK_SIZE,
            api_version: DEFAULT_API_VERSION.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            worker_poll_interval: DEFAULT_WORKER_POLL_INTERVAL,
            redis_url: None,
            database_url: None,
        }
    }
}

impl SyncConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; unset or blank keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(minutes) = parse::<u64>(&get, "STORESYNC_LOCK_TTL_MINUTES")? {
            if minutes == 0 {
                return Err(invalid("STORESYNC_LOCK_TTL_MINUTES", "0", "must be at least 1"));
            }
            let secs = minutes.checked_mul(60).ok_or_else(|| {
                invalid("STORESYNC_LOCK_TTL_MINUTES", &minutes.to_string(), "too large")
            })?;
            config.lock_ttl = Duration::from_secs(secs);
        }
        if let Some(channel) = get("STORESYNC_LOG_CHANNEL") {
            config.log_channel = channel.trim().to_string();
        }
        if let Some(secs) = parse::<u64>(&get, "STORESYNC_MAX_EXECUTION_TIME_SECS")? {
            config.max_execution_time = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(size) = parse::<usize>(&get, "STORESYNC_CHUNK_SIZE")? {
            if size == 0 {
                return Err(invalid("STORESYNC_CHUNK_SIZE", "0", "must be at least 1"));
            }
            config.chunk_size = size;
        }
        if let Some(version) = get("STORESYNC_API_VERSION") {
            config.api_version = version.trim().to_string();
        }
        if let Some(secs) = parse::<u64>(&get, "STORESYNC_HTTP_TIMEOUT_SECS")? {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse::<u64>(&get, "STORESYNC_WORKER_POLL_MS")? {
            config.worker_poll_interval = Duration::from_millis(ms);
        }
        config.redis_url = get("REDIS_URL");
        config.database_url = get("DATABASE_URL").map(SecretString::from);

        Ok(config)
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn with_log_channel(mut self, channel: impl Into<String>) -> Self {
        self.log_channel = channel.into();
        self
    }

    pub fn with_max_execution_time(mut self, limit: Option<Duration>) -> Self {
        self.max_execution_time = limit;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_worker_poll_interval(mut self, interval: Duration) -> Self {
        self.worker_poll_interval = interval;
        self
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| invalid(key, &raw, e.to_string()))
        })
        .transpose()
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}
