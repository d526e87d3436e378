#![forbid(unsafe_code)]

use fulcrum_core::policy::{DEFAULT_JOB_TIMEOUT, DEFAULT_MAX_RETRIES, ReconcilePolicy};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const STORAGE_DIR_ENV: &str = "FULCRUM_STORAGE_DIR";
pub const MAX_RETRIES_ENV: &str = "FULCRUM_MAX_RETRIES";
pub const JOB_TIMEOUT_ENV: &str = "FULCRUM_JOB_TIMEOUT_SECS";
pub const SWEEP_INTERVAL_ENV: &str = "FULCRUM_SWEEP_INTERVAL_SECS";

const DEFAULT_STORAGE_DIR: &str = ".fulcrum";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;
const MAX_RETRIES_LIMIT: u32 = 100;
const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must not be empty")]
    Empty { key: &'static str },
    #[error("invalid {key}: {message}")]
    InvalidNumber { key: &'static str, message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweeperConfig {
    pub storage_dir: PathBuf,
    pub policy: ReconcilePolicy,
    /// Pause between passes when looping.
    pub interval: Duration,
    pub once: bool,
}

/// Command line values; each one set wins over the environment.
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub storage_dir: Option<PathBuf>,
    pub max_retries: Option<u32>,
    pub job_timeout_secs: Option<u64>,
    pub interval_secs: Option<u64>,
    pub once: bool,
}

impl SweeperConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let storage_dir = match lookup(STORAGE_DIR_ENV) {
            Some(raw) if raw.trim().is_empty() => {
                return Err(ConfigError::Empty {
                    key: STORAGE_DIR_ENV,
                });
            }
            Some(raw) => PathBuf::from(raw.trim()),
            None => PathBuf::from(DEFAULT_STORAGE_DIR),
        };
        let max_retries = parse_u32_env_lookup(
            &lookup,
            MAX_RETRIES_ENV,
            DEFAULT_MAX_RETRIES,
            0,
            MAX_RETRIES_LIMIT,
        )?;
        let job_timeout_secs = parse_u64_env_lookup(
            &lookup,
            JOB_TIMEOUT_ENV,
            DEFAULT_JOB_TIMEOUT.as_secs(),
            1,
            MAX_DURATION_SECS,
        )?;
        let interval_secs = parse_u64_env_lookup(
            &lookup,
            SWEEP_INTERVAL_ENV,
            DEFAULT_SWEEP_INTERVAL_SECS,
            1,
            MAX_DURATION_SECS,
        )?;

        Ok(Self {
            storage_dir,
            policy: ReconcilePolicy::default()
                .with_max_retries(max_retries)
                .with_job_timeout(Duration::from_secs(job_timeout_secs)),
            interval: Duration::from_secs(interval_secs),
            once: false,
        })
    }

    pub fn with_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(storage_dir) = overrides.storage_dir {
            self.storage_dir = storage_dir;
        }
        if let Some(max_retries) = overrides.max_retries {
            self.policy = self
                .policy
                .with_max_retries(max_retries.min(MAX_RETRIES_LIMIT));
        }
        if let Some(secs) = overrides.job_timeout_secs {
            self.policy = self
                .policy
                .with_job_timeout(Duration::from_secs(secs.clamp(1, MAX_DURATION_SECS)));
        }
        if let Some(secs) = overrides.interval_secs {
            self.interval = Duration::from_secs(secs.clamp(1, MAX_DURATION_SECS));
        }
        self.once |= overrides.once;
        self
    }
}

fn parse_with_lookup<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
    parse: impl FnOnce(&str) -> Result<T, ConfigError>,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => parse(raw.trim()),
        _ => Ok(default),
    }
}

fn parse_u64_env_lookup(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    parse_with_lookup(lookup, key, default, |raw| {
        raw.parse::<u64>()
            .map_err(|error| ConfigError::InvalidNumber {
                key,
                message: error.to_string(),
            })
            .map(|value| value.clamp(min, max))
    })
}

fn parse_u32_env_lookup(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u32,
    min: u32,
    max: u32,
) -> Result<u32, ConfigError> {
    parse_with_lookup(lookup, key, default, |raw| {
        raw.parse::<u32>()
            .map_err(|error| ConfigError::InvalidNumber {
                key,
                message: error.to_string(),
            })
            .map(|value| value.clamp(min, max))
    })
}
