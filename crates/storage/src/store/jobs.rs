#![forbid(unsafe_code)]

use super::services::{
    service_discard_target_properties_tx, service_require_tx, service_store_reconcile_tx,
};
use super::*;
use fulcrum_core::ids::{AgentId, JobId, ParticipantId, ServiceId};
use fulcrum_core::model::{JobAction, JobStatus};
use fulcrum_core::reconcile::ReconcileError;
use rusqlite::{OptionalExtension, params};
use serde_json::Value as JsonValue;

const JOB_COLUMNS: &str = "id, seq, revision, service_id, agent_id, provider_id, consumer_id, action, status, priority, \
     claimed_at_ms, completed_at_ms, error_message, created_at_ms, updated_at_ms";

const MAX_ERROR_MESSAGE_LEN: usize = 4096;
const MAX_EXTERNAL_ID_LEN: usize = 256;

fn read_job_row(row: &rusqlite::Row<'_>) -> Result<JobRow, rusqlite::Error> {
    Ok(JobRow {
        id: get_parsed(row, 0, JobId::try_new)?,
        seq: row.get(1)?,
        revision: row.get(2)?,
        service_id: get_parsed(row, 3, ServiceId::try_new)?,
        agent_id: get_parsed(row, 4, AgentId::try_new)?,
        provider_id: get_parsed(row, 5, ParticipantId::try_new)?,
        consumer_id: get_parsed(row, 6, ParticipantId::try_new)?,
        action: get_parsed(row, 7, |raw| JobAction::parse(&raw))?,
        status: get_parsed(row, 8, |raw| JobStatus::parse(&raw))?,
        priority: row.get(9)?,
        claimed_at_ms: row.get(10)?,
        completed_at_ms: row.get(11)?,
        error_message: row.get(12)?,
        created_at_ms: row.get(13)?,
        updated_at_ms: row.get(14)?,
    })
}

fn normalize_error_message(raw: &str) -> Result<String, StoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidInput("error_message must not be empty"));
    }
    let mut out = trimmed.to_string();
    if out.len() > MAX_ERROR_MESSAGE_LEN {
        let mut cut = MAX_ERROR_MESSAGE_LEN;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
    }
    Ok(out)
}

fn normalize_external_id(raw: Option<String>) -> Result<Option<String>, StoreError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.len() > MAX_EXTERNAL_ID_LEN {
        return Err(StoreError::InvalidInput("external_id is too long"));
    }
    Ok(Some(trimmed.to_string()))
}

pub(super) fn job_get_tx(conn: &Connection, id: &JobId) -> Result<Option<JobRow>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id=?1"),
            params![id.as_str()],
            read_job_row,
        )
        .optional()?)
}

fn job_require_tx(conn: &Connection, id: &JobId) -> Result<JobRow, StoreError> {
    job_get_tx(conn, id)?.ok_or_else(|| StoreError::unknown("job", id.as_str()))
}

pub(super) fn live_job_id_tx(
    conn: &Connection,
    service_id: &ServiceId,
) -> Result<Option<JobId>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT id FROM jobs WHERE service_id=?1 AND status IN ('PENDING', 'CLAIMED')",
            params![service_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(JobId::try_new)
        .transpose()
        .map_err(|_| StoreError::InvalidInput("invalid job id in storage"))
}

/// Inserts a `PENDING` job for `service`. Callers hold the write
/// transaction and have already checked that no live job exists; the
/// partial unique index on live jobs backs that check.
pub(super) fn job_enqueue_tx(
    tx: &Transaction<'_>,
    service: &ServiceRow,
    action: JobAction,
    priority: i64,
    now_ms: i64,
) -> Result<JobRow, StoreError> {
    let seq = next_counter_tx(tx, JOB_COUNTER)?;
    let id = JobId::from_seq(seq);

    let insert = tx.execute(
        r#"
        INSERT INTO jobs(id, seq, revision, service_id, agent_id, provider_id, consumer_id,
                         action, status, priority, created_at_ms, updated_at_ms)
        VALUES (?1, ?2, 0, ?3, ?4, ?5, ?6, ?7, 'PENDING', ?8, ?9, ?9)
        "#,
        params![
            id.as_str(),
            seq,
            service.id.as_str(),
            service.agent_id.as_str(),
            service.provider_id.as_str(),
            service.consumer_id.as_str(),
            action.as_str(),
            priority,
            now_ms
        ],
    );
    if let Err(err) = insert {
        if is_constraint_violation(&err) {
            if let Some(job_id) = live_job_id_tx(tx, &service.id)? {
                return Err(ReconcileError::JobInFlight { job_id }.into());
            }
        }
        return Err(err.into());
    }

    tracing::debug!(
        job_id = %id,
        service_id = %service.id,
        action = %action,
        priority,
        "job enqueued"
    );
    job_require_tx(tx, &id)
}

pub(super) enum JobOutcome<'a> {
    Completed {
        resources: Option<&'a JsonValue>,
        external_id: Option<&'a str>,
    },
    Failed {
        message: &'a str,
    },
}

/// Terminates a claimed job and folds the outcome into its service, inside
/// the caller's transaction.
pub(super) fn job_finish_tx(
    tx: &Transaction<'_>,
    id: &JobId,
    outcome: JobOutcome<'_>,
    policy: &ReconcilePolicy,
    now_ms: i64,
) -> Result<JobOutcomeResult, StoreError> {
    let job = job_require_tx(tx, id)?;
    if job.status != JobStatus::Claimed {
        return Err(StoreError::JobNotClaimed {
            job_id: id.to_string(),
            status: job.status,
        });
    }

    let (status, error_message) = match &outcome {
        JobOutcome::Completed { .. } => (JobStatus::Completed, None),
        JobOutcome::Failed { message } => (JobStatus::Failed, Some(*message)),
    };
    let changed = tx.execute(
        r#"
        UPDATE jobs
        SET revision=?3, status=?4, completed_at_ms=?5, error_message=?6, updated_at_ms=?5
        WHERE id=?1 AND revision=?2 AND status='CLAIMED'
        "#,
        params![
            id.as_str(),
            job.revision,
            job.revision + 1,
            status.as_str(),
            now_ms,
            error_message
        ],
    )?;
    if changed != 1 {
        return Err(StoreError::JobNotClaimed {
            job_id: id.to_string(),
            status: job.status,
        });
    }

    let service = service_require_tx(tx, &job.service_id)?;
    let mut reconcile = service.reconcile();
    let retries_exhausted = match outcome {
        JobOutcome::Completed {
            resources,
            external_id,
        } => {
            reconcile.on_job_completed();
            service_store_reconcile_tx(tx, &service, &reconcile, None, now_ms)?;
            // Only CREATE and UPDATE carry properties to the agent.
            let applies_properties = matches!(job.action, JobAction::Create | JobAction::Update);
            tx.execute(
                r#"
                UPDATE services
                SET resources_json=COALESCE(?2, resources_json),
                    external_id=COALESCE(?3, external_id),
                    current_properties_json=CASE
                      WHEN ?4 THEN COALESCE(target_properties_json, current_properties_json)
                      ELSE current_properties_json
                    END
                WHERE id=?1
                "#,
                params![
                    service.id.as_str(),
                    json_text_opt(resources)?,
                    external_id,
                    applies_properties
                ],
            )?;
            false
        }
        JobOutcome::Failed { message } => {
            let exhausted = reconcile.on_job_failed(job.action, message, policy);
            let target_set_at_ms = if exhausted {
                None
            } else {
                service.target_set_at_ms
            };
            service_store_reconcile_tx(tx, &service, &reconcile, target_set_at_ms, now_ms)?;
            if exhausted && job.action == JobAction::Update {
                service_discard_target_properties_tx(tx, &service.id)?;
            }
            exhausted
        }
    };

    Ok(JobOutcomeResult {
        job: job_require_tx(tx, id)?,
        service: service_require_tx(tx, &job.service_id)?,
        retries_exhausted,
    })
}

impl SqliteStore {
    pub fn job_get(&self, id: &JobId) -> Result<Option<JobRow>, StoreError> {
        job_get_tx(&self.conn, id)
    }

    /// Pending jobs addressed to one agent, most urgent first. Nothing is
    /// reserved; a poller claims what it picks.
    pub fn jobs_list_pending_for_agent(
        &self,
        request: JobsPendingRequest,
    ) -> Result<Vec<JobRow>, StoreError> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }
        let limit = clamp_limit(request.limit);
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE agent_id=?1 AND status='PENDING'
            ORDER BY priority ASC, seq ASC
            LIMIT ?2
            "#
        ))?;
        let rows = stmt.query_map(
            params![request.agent_id.as_str(), to_sqlite_i64(limit)?],
            read_job_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Pending -> Claimed. Of any number of concurrent callers exactly one
    /// wins; the rest see `JobNotClaimable`.
    pub fn job_claim(&mut self, request: JobClaimRequest) -> Result<JobRow, StoreError> {
        let now_ms = now_ms();
        let tx = begin_write(&mut self.conn)?;

        let job = match job_get_tx(&tx, &request.id)? {
            Some(job) if job.agent_id == request.agent_id => job,
            _ => return Err(StoreError::unknown("job", request.id.as_str())),
        };
        if job.status != JobStatus::Pending {
            return Err(StoreError::JobNotClaimable {
                job_id: job.id.into_string(),
                status: job.status,
            });
        }

        let changed = tx.execute(
            r#"
            UPDATE jobs
            SET revision=?3, status='CLAIMED', claimed_at_ms=?4, updated_at_ms=?4
            WHERE id=?1 AND revision=?2 AND status='PENDING'
            "#,
            params![request.id.as_str(), job.revision, job.revision + 1, now_ms],
        )?;
        if changed != 1 {
            return Err(StoreError::JobNotClaimable {
                job_id: job.id.into_string(),
                status: JobStatus::Pending,
            });
        }

        let claimed = job_require_tx(&tx, &request.id)?;
        tx.commit()?;

        tracing::debug!(job_id = %claimed.id, agent_id = %claimed.agent_id, "job claimed");
        Ok(claimed)
    }

    pub fn job_complete(
        &mut self,
        request: JobCompleteRequest,
    ) -> Result<JobOutcomeResult, StoreError> {
        let external_id = normalize_external_id(request.external_id)?;
        let now_ms = now_ms();
        let policy = self.policy;
        let tx = begin_write(&mut self.conn)?;

        let result = job_finish_tx(
            &tx,
            &request.id,
            JobOutcome::Completed {
                resources: request.resources.as_ref(),
                external_id: external_id.as_deref(),
            },
            &policy,
            now_ms,
        )?;
        tx.commit()?;

        tracing::debug!(
            job_id = %result.job.id,
            service_id = %result.service.id,
            state = %result.service.current_state,
            "job completed"
        );
        Ok(result)
    }

    pub fn job_fail(&mut self, request: JobFailRequest) -> Result<JobOutcomeResult, StoreError> {
        let message = normalize_error_message(&request.error_message)?;
        let now_ms = now_ms();
        let policy = self.policy;
        let tx = begin_write(&mut self.conn)?;

        let result = job_finish_tx(
            &tx,
            &request.id,
            JobOutcome::Failed { message: &message },
            &policy,
            now_ms,
        )?;
        tx.commit()?;

        tracing::debug!(
            job_id = %result.job.id,
            service_id = %result.service.id,
            retries_exhausted = result.retries_exhausted,
            "job failed"
        );
        Ok(result)
    }

    pub fn jobs_list(&self, request: JobsListRequest) -> Result<JobsListResult, StoreError> {
        let limit = clamp_limit(request.limit);
        let offset = to_sqlite_i64(request.offset)?;

        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {JOB_COLUMNS}
            FROM jobs
            WHERE (?1 IS NULL OR consumer_id=?1)
              AND (?2 IS NULL OR agent_id=?2)
              AND (?3 IS NULL OR service_id=?3)
              AND (?4 IS NULL OR status=?4)
            ORDER BY seq ASC
            LIMIT ?5 OFFSET ?6
            "#
        ))?;
        let rows = stmt.query_map(
            params![
                request.scope.consumer_param(),
                request.scope.agent_param(),
                request.service_id.as_ref().map(ServiceId::as_str),
                request.status.map(JobStatus::as_str),
                to_sqlite_i64(limit + 1)?,
                offset
            ],
            read_job_row,
        )?;
        let mut jobs = rows.collect::<Result<Vec<_>, _>>()?;

        let has_more = jobs.len() > limit;
        if has_more {
            jobs.truncate(limit);
        }
        Ok(JobsListResult { jobs, has_more })
    }
}
