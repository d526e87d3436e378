#![forbid(unsafe_code)]

use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Claimed jobs failed for silence past the deadline.
    pub jobs_failed: usize,
    /// Services with a target but no job, failed directly.
    pub services_failed: usize,
    /// Records that errored and were left for the next pass.
    pub skipped: usize,
}

impl SweepReport {
    pub fn reclaimed(&self) -> usize {
        self.jobs_failed + self.services_failed
    }
}
