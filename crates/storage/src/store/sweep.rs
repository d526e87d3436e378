#![forbid(unsafe_code)]

//! Timeout reclamation.
//!
//! A claimed job whose agent went silent is failed through the same path an
//! agent report takes, so the service callback fires exactly as it would for
//! a reported failure. A service whose target was set with no job at all is
//! failed directly. Each record is handled in its own transaction; an error
//! on one record is logged and the pass moves on.

use super::jobs::{JobOutcome, job_finish_tx, job_get_tx};
use super::services::{
    service_discard_target_properties_tx, service_get_tx, service_store_reconcile_tx,
};
use super::*;
use fulcrum_core::ids::{JobId, ServiceId};
use fulcrum_core::model::{JobAction, JobStatus};
use fulcrum_core::reconcile::TIMEOUT_MESSAGE;
use rusqlite::params;

fn cutoff_ms(timeout: Duration, now_ms: i64) -> i64 {
    let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_sub(timeout_ms)
}

impl SqliteStore {
    pub fn fail_timeout_services_and_jobs(
        &mut self,
        timeout: Duration,
    ) -> Result<SweepReport, StoreError> {
        self.fail_timeout_services_and_jobs_at(timeout, now_ms())
    }

    /// Same pass with an explicit clock reading.
    pub fn fail_timeout_services_and_jobs_at(
        &mut self,
        timeout: Duration,
        now_ms: i64,
    ) -> Result<SweepReport, StoreError> {
        let cutoff = cutoff_ms(timeout, now_ms);
        let mut report = SweepReport::default();

        for raw_id in self.stale_claimed_job_ids(cutoff)? {
            match self.reclaim_job(&raw_id, cutoff, now_ms) {
                Ok(Some(result)) => {
                    report.jobs_failed += 1;
                    tracing::debug!(
                        job_id = %result.job.id,
                        service_id = %result.service.id,
                        retries_exhausted = result.retries_exhausted,
                        "timed out job failed"
                    );
                }
                Ok(None) => {
                    tracing::debug!(job_id = %raw_id, "job reported before it could be reclaimed");
                }
                Err(err) => {
                    report.skipped += 1;
                    tracing::warn!(job_id = %raw_id, error = %err, "timeout sweep skipped job");
                }
            }
        }

        for raw_id in self.orphaned_target_service_ids(cutoff)? {
            match self.fail_orphaned_target(&raw_id, cutoff, now_ms) {
                Ok(Some(service)) => {
                    report.services_failed += 1;
                    tracing::debug!(
                        service_id = %service.id,
                        failed_action = service.failed_action.map(|action| action.as_str()),
                        "service target without job failed"
                    );
                }
                Ok(None) => {}
                Err(err) => {
                    report.skipped += 1;
                    tracing::warn!(service_id = %raw_id, error = %err, "timeout sweep skipped service");
                }
            }
        }

        if report.reclaimed() > 0 || report.skipped > 0 {
            tracing::info!(
                jobs_failed = report.jobs_failed,
                services_failed = report.services_failed,
                skipped = report.skipped,
                "timeout sweep finished"
            );
        } else {
            tracing::debug!("timeout sweep found nothing to reclaim");
        }
        Ok(report)
    }

    fn stale_claimed_job_ids(&self, cutoff: i64) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id
            FROM jobs
            WHERE status='CLAIMED' AND (claimed_at_ms IS NULL OR claimed_at_ms < ?1)
            ORDER BY seq ASC
            "#,
        )?;
        let rows = stmt.query_map(params![cutoff], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn orphaned_target_service_ids(&self, cutoff: i64) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT s.id
            FROM services s
            WHERE s.target_state IS NOT NULL
              AND s.failed_action IS NULL
              AND (s.target_set_at_ms IS NULL OR s.target_set_at_ms < ?1)
              AND NOT EXISTS (
                SELECT 1 FROM jobs j WHERE j.service_id=s.id AND j.status IN ('PENDING', 'CLAIMED')
              )
            ORDER BY s.rowid ASC
            "#,
        )?;
        let rows = stmt.query_map(params![cutoff], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// `Ok(None)` when the job was reported (or re-read fresh) in between.
    fn reclaim_job(
        &mut self,
        raw_id: &str,
        cutoff: i64,
        now_ms: i64,
    ) -> Result<Option<JobOutcomeResult>, StoreError> {
        let id = JobId::try_new(raw_id).map_err(|_| StoreError::InvalidInput("invalid job id"))?;
        let policy = self.policy;
        let tx = begin_write(&mut self.conn)?;

        let Some(job) = job_get_tx(&tx, &id)? else {
            return Ok(None);
        };
        let fresh = job.claimed_at_ms.is_some_and(|at| at >= cutoff);
        if job.status != JobStatus::Claimed || fresh {
            return Ok(None);
        }

        let result = job_finish_tx(
            &tx,
            &id,
            JobOutcome::Failed {
                message: TIMEOUT_MESSAGE,
            },
            &policy,
            now_ms,
        )?;
        tx.commit()?;
        Ok(Some(result))
    }

    fn fail_orphaned_target(
        &mut self,
        raw_id: &str,
        cutoff: i64,
        now_ms: i64,
    ) -> Result<Option<ServiceRow>, StoreError> {
        let id = ServiceId::try_new(raw_id)
            .map_err(|_| StoreError::InvalidInput("invalid service id"))?;
        let policy = self.policy;
        let tx = begin_write(&mut self.conn)?;

        let Some(service) = service_get_tx(&tx, &id)? else {
            return Ok(None);
        };
        let fresh = service.target_set_at_ms.is_some_and(|at| at >= cutoff);
        if service.target_state.is_none()
            || service.failed_action.is_some()
            || service.live_job_id.is_some()
            || fresh
        {
            return Ok(None);
        }

        let mut reconcile = service.reconcile();
        let action = reconcile
            .pending_action()
            .ok_or(StoreError::InvalidInput("service target has no job action"))?;
        let exhausted = reconcile.on_job_failed(action, TIMEOUT_MESSAGE, &policy);
        let target_set_at_ms = if exhausted {
            None
        } else {
            service.target_set_at_ms
        };
        service_store_reconcile_tx(&tx, &service, &reconcile, target_set_at_ms, now_ms)?;
        if exhausted && action == JobAction::Update {
            service_discard_target_properties_tx(&tx, &service.id)?;
        }

        let updated = service_get_tx(&tx, &id)?;
        tx.commit()?;
        Ok(updated)
    }
}
