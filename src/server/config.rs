use std::{str::FromStr, time::Duration};

use crate::server::{error::config::ConfigError, worker::WorkerPoolConfig};

const DEFAULT_WORKER_CONCURRENCY: usize = 10;
const DEFAULT_WORKER_TASK_TIMEOUT_SECS: u64 = 60;
const DEFAULT_WORKER_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_QUEUE_PREFIX: &str = "swipex:worker";
const DEFAULT_CACHE_PREFIX: &str = "swipex:cache";
const DEFAULT_WORKER_ID: &str = "default";

/// Settings of the worker process, read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub valkey_url: String,
    pub worker_concurrency: usize,
    pub worker_task_timeout: Duration,
    pub worker_max_attempts: u32,
    pub cache_ttl: Duration,
    pub queue_prefix: String,
    pub cache_prefix: String,
    /// Distinct per worker process sharing the queues
    pub worker_id: String,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// `DATABASE_URL` and `VALKEY_URL` are required, every other variable falls back to its
    /// default when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: required(&lookup, "DATABASE_URL")?,
            valkey_url: required(&lookup, "VALKEY_URL")?,
            worker_concurrency: parsed(
                &lookup,
                "WORKER_CONCURRENCY",
                DEFAULT_WORKER_CONCURRENCY,
            )?,
            worker_task_timeout: Duration::from_secs(parsed(
                &lookup,
                "WORKER_TASK_TIMEOUT_SECS",
                DEFAULT_WORKER_TASK_TIMEOUT_SECS,
            )?),
            worker_max_attempts: parsed(
                &lookup,
                "WORKER_MAX_ATTEMPTS",
                DEFAULT_WORKER_MAX_ATTEMPTS,
            )?,
            cache_ttl: Duration::from_secs(parsed(
                &lookup,
                "CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )?),
            queue_prefix: lookup("QUEUE_PREFIX")
                .unwrap_or_else(|| DEFAULT_QUEUE_PREFIX.to_string()),
            cache_prefix: lookup("CACHE_PREFIX")
                .unwrap_or_else(|| DEFAULT_CACHE_PREFIX.to_string()),
            worker_id: lookup("WORKER_ID").unwrap_or_else(|| DEFAULT_WORKER_ID.to_string()),
        })
    }

    /// Worker pool settings derived from this configuration
    pub fn pool_config(&self) -> WorkerPoolConfig {
        let mut config = WorkerPoolConfig::new(self.worker_concurrency);
        config.job_timeout_ms = self.worker_task_timeout.as_millis() as u64;
        // A health check has to give up before a task of the same worker would time out
        config.health_check_timeout_ms = config
            .health_check_timeout_ms
            .min(config.job_timeout_ms / 2);
        config.retry.max_attempts = self.worker_max_attempts;
        config
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Result<String, ConfigError> {
    lookup(var).ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };

    let value = raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnvValue {
        var: var.to_string(),
        reason: e.to_string(),
    })?;

    if value <= T::default() {
        return Err(ConfigError::InvalidEnvValue {
            var: var.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    Ok(value)
}
