#![forbid(unsafe_code)]

use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(600);

/// Bounds applied to reconciliation attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcilePolicy {
    /// Number of explicit `Retry` calls accepted for one target before the
    /// failure becomes final.
    pub max_retries: u32,
    /// How long a claimed job (or a target with no job) may stay silent
    /// before the sweep fails it.
    pub job_timeout: Duration,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            job_timeout: DEFAULT_JOB_TIMEOUT,
        }
    }
}

impl ReconcilePolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_job_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = job_timeout;
        self
    }

    pub fn retries_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }
}
