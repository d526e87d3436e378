#![forbid(unsafe_code)]

use super::agents::{agent_get_tx, service_group_get_tx};
use super::jobs::job_enqueue_tx;
use super::*;
use fulcrum_core::ids::{AgentId, GroupId, JobId, ParticipantId, ServiceId, ServiceTypeId};
use fulcrum_core::model::{JobAction, ServiceState};
use fulcrum_core::reconcile::{ReconcileError, ServiceReconcile};
use rusqlite::{OptionalExtension, params};

const SERVICE_COLUMNS: &str = "s.id, s.revision, s.name, s.agent_id, s.provider_id, s.consumer_id, s.group_id, \
     s.service_type_id, s.current_state, s.target_state, s.failed_action, s.error_message, s.retry_count, \
     s.attributes_json, s.current_properties_json, s.target_properties_json, s.resources_json, s.external_id, \
     s.target_set_at_ms, s.created_at_ms, s.updated_at_ms, \
     (SELECT j.id FROM jobs j WHERE j.service_id=s.id AND j.status IN ('PENDING', 'CLAIMED')) AS live_job_id";

pub(super) fn read_service_row(row: &rusqlite::Row<'_>) -> Result<ServiceRow, rusqlite::Error> {
    Ok(ServiceRow {
        id: get_parsed(row, 0, ServiceId::try_new)?,
        revision: row.get(1)?,
        name: row.get(2)?,
        agent_id: get_parsed(row, 3, AgentId::try_new)?,
        provider_id: get_parsed(row, 4, ParticipantId::try_new)?,
        consumer_id: get_parsed(row, 5, ParticipantId::try_new)?,
        group_id: get_parsed(row, 6, GroupId::try_new)?,
        service_type_id: get_parsed(row, 7, ServiceTypeId::try_new)?,
        current_state: get_parsed(row, 8, |raw| ServiceState::parse(&raw))?,
        target_state: get_parsed_opt(row, 9, |raw| ServiceState::parse(&raw))?,
        failed_action: get_parsed_opt(row, 10, |raw| JobAction::parse(&raw))?,
        error_message: row.get(11)?,
        retry_count: row.get(12)?,
        attributes: get_json(row, 13)?,
        current_properties: get_json_opt(row, 14)?,
        target_properties: get_json_opt(row, 15)?,
        resources: get_json_opt(row, 16)?,
        external_id: row.get(17)?,
        target_set_at_ms: row.get(18)?,
        created_at_ms: row.get(19)?,
        updated_at_ms: row.get(20)?,
        live_job_id: get_parsed_opt(row, 21, JobId::try_new)?,
    })
}

pub(super) fn service_get_tx(
    conn: &Connection,
    id: &ServiceId,
) -> Result<Option<ServiceRow>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {SERVICE_COLUMNS} FROM services s WHERE s.id=?1"),
            params![id.as_str()],
            read_service_row,
        )
        .optional()?)
}

pub(super) fn service_require_tx(conn: &Connection, id: &ServiceId) -> Result<ServiceRow, StoreError> {
    service_get_tx(conn, id)?.ok_or_else(|| StoreError::unknown("service", id.as_str()))
}

/// Persists the reconciliation fields of `service`, guarded by the revision
/// it was read at.
pub(super) fn service_store_reconcile_tx(
    tx: &Transaction<'_>,
    service: &ServiceRow,
    next: &ServiceReconcile,
    target_set_at_ms: Option<i64>,
    now_ms: i64,
) -> Result<(), StoreError> {
    let target_set_at_ms = next.target_state.and(target_set_at_ms);
    let changed = tx.execute(
        r#"
        UPDATE services
        SET revision=?3, current_state=?4, target_state=?5, failed_action=?6, error_message=?7,
            retry_count=?8, target_set_at_ms=?9, updated_at_ms=?10
        WHERE id=?1 AND revision=?2
        "#,
        params![
            service.id.as_str(),
            service.revision,
            service.revision + 1,
            next.current_state.as_str(),
            next.target_state.map(ServiceState::as_str),
            next.failed_action.map(JobAction::as_str),
            next.error_message.as_deref(),
            next.retry_count,
            target_set_at_ms,
            now_ms
        ],
    )?;
    if changed != 1 {
        return Err(StoreError::RevisionMismatch {
            entity: "service",
            id: service.id.to_string(),
            expected: service.revision,
        });
    }
    Ok(())
}

/// Drops a reconfiguration the agent never applied, once its `UPDATE` has
/// failed for good.
pub(super) fn service_discard_target_properties_tx(
    tx: &Transaction<'_>,
    id: &ServiceId,
) -> Result<(), StoreError> {
    tx.execute(
        r#"
        UPDATE services
        SET target_properties_json=COALESCE(current_properties_json, target_properties_json)
        WHERE id=?1
        "#,
        params![id.as_str()],
    )?;
    Ok(())
}

/// Writes the new reconciliation state and enqueues the job driving it.
fn schedule_tx(
    tx: &Transaction<'_>,
    service: &ServiceRow,
    next: &ServiceReconcile,
    action: JobAction,
    priority: Option<i64>,
    now_ms: i64,
) -> Result<ServiceMutationResult, StoreError> {
    service_store_reconcile_tx(tx, service, next, Some(now_ms), now_ms)?;
    let priority = priority.unwrap_or_else(|| action.default_priority());
    let job = job_enqueue_tx(tx, service, action, priority, now_ms)?;
    Ok(ServiceMutationResult {
        service: service_require_tx(tx, &service.id)?,
        job: Some(job),
    })
}

impl SqliteStore {
    pub fn service_get(&self, id: &ServiceId) -> Result<Option<ServiceRow>, StoreError> {
        service_get_tx(&self.conn, id)
    }

    /// Creates a service in `CREATED` already driving toward `STARTED`, with
    /// its `CREATE` job enqueued in the same transaction.
    pub fn service_create(
        &mut self,
        request: ServiceCreateRequest,
    ) -> Result<ServiceMutationResult, StoreError> {
        let name = normalize_name(&request.name, "service name must not be empty")?;
        self.validator.validate_attributes(&request.attributes)?;
        self.validator.validate_properties(&request.properties)?;
        let attributes_json = json_text(&request.attributes)?;
        let properties_json = json_text(&request.properties)?;

        let now_ms = now_ms();
        let tx = begin_write(&mut self.conn)?;

        let agent = agent_get_tx(&tx, &request.agent_id)?
            .ok_or_else(|| StoreError::unknown("agent", request.agent_id.as_str()))?;
        let group = service_group_get_tx(&tx, &request.group_id)?
            .ok_or_else(|| StoreError::unknown("service group", request.group_id.as_str()))?;

        let seq = next_counter_tx(&tx, SERVICE_COUNTER)?;
        let id = ServiceId::from_seq(seq);
        let (reconcile, action) = ServiceReconcile::new_created();

        tx.execute(
            r#"
            INSERT INTO services(
              id, revision, name, agent_id, provider_id, consumer_id, group_id, service_type_id,
              current_state, target_state, retry_count, attributes_json, target_properties_json,
              target_set_at_ms, created_at_ms, updated_at_ms)
            VALUES (?1, 0, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11, ?12, ?12, ?12)
            "#,
            params![
                id.as_str(),
                name,
                agent.id.as_str(),
                agent.provider_id.as_str(),
                group.consumer_id.as_str(),
                group.id.as_str(),
                request.service_type_id.as_str(),
                reconcile.current_state.as_str(),
                reconcile.target_state.map(ServiceState::as_str),
                attributes_json,
                properties_json,
                now_ms
            ],
        )?;

        let service = service_require_tx(&tx, &id)?;
        let priority = request
            .priority
            .unwrap_or_else(|| action.default_priority());
        let job = job_enqueue_tx(&tx, &service, action, priority, now_ms)?;
        let service = service_require_tx(&tx, &id)?;
        tx.commit()?;

        tracing::debug!(service_id = %service.id, job_id = %job.id, "service created");
        Ok(ServiceMutationResult {
            service,
            job: Some(job),
        })
    }

    /// Renames and/or reconfigures a service. Only a change of properties
    /// needs the agent, so only that enqueues an `UPDATE` job (and is
    /// refused while another job is live).
    pub fn service_update(
        &mut self,
        request: ServiceUpdateRequest,
    ) -> Result<ServiceMutationResult, StoreError> {
        let name = request
            .name
            .as_deref()
            .map(|raw| normalize_name(raw, "service name must not be empty"))
            .transpose()?;
        if let Some(properties) = request.properties.as_ref() {
            self.validator.validate_properties(properties)?;
        }

        let now_ms = now_ms();
        let tx = begin_write(&mut self.conn)?;
        let service = service_require_tx(&tx, &request.id)?;
        if service.current_state.is_terminal() {
            return Err(ReconcileError::ServiceDeleted.into());
        }

        // Before the first CREATE completes, the requested config is the baseline.
        let applied_properties = service
            .current_properties
            .as_ref()
            .or(service.target_properties.as_ref());
        let changed_properties = request
            .properties
            .as_ref()
            .filter(|properties| applied_properties != Some(*properties));

        let mut reconcile = service.reconcile();
        let action = match changed_properties {
            Some(_) => Some(reconcile.begin_update(service.live_job_id.as_ref())?),
            None => None,
        };

        let changed = tx.execute(
            r#"
            UPDATE services
            SET revision=?3, name=COALESCE(?4, name),
                target_properties_json=COALESCE(?5, target_properties_json), updated_at_ms=?6
            WHERE id=?1 AND revision=?2
            "#,
            params![
                service.id.as_str(),
                service.revision,
                service.revision + 1,
                name,
                json_text_opt(changed_properties)?,
                now_ms
            ],
        )?;
        if changed != 1 {
            return Err(StoreError::RevisionMismatch {
                entity: "service",
                id: service.id.into_string(),
                expected: service.revision,
            });
        }

        let result = match action {
            Some(action) => {
                let renamed = service_require_tx(&tx, &request.id)?;
                schedule_tx(&tx, &renamed, &reconcile, action, request.priority, now_ms)?
            }
            None => ServiceMutationResult {
                service: service_require_tx(&tx, &request.id)?,
                job: None,
            },
        };
        tx.commit()?;

        tracing::debug!(
            service_id = %result.service.id,
            job_id = result.job.as_ref().map(|job| job.id.as_str()),
            "service updated"
        );
        Ok(result)
    }

    /// Sets a new target state. A new target resets the retry budget.
    pub fn service_transition(
        &mut self,
        request: ServiceTransitionRequest,
    ) -> Result<ServiceMutationResult, StoreError> {
        let now_ms = now_ms();
        let tx = begin_write(&mut self.conn)?;
        let service = service_require_tx(&tx, &request.id)?;

        let mut reconcile = service.reconcile();
        let action = reconcile.begin_transition(request.target, service.live_job_id.as_ref())?;
        service_discard_target_properties_tx(&tx, &service.id)?;
        let result = schedule_tx(&tx, &service, &reconcile, action, request.priority, now_ms)?;
        tx.commit()?;

        tracing::debug!(
            service_id = %result.service.id,
            target = %request.target,
            action = %action,
            "service transition scheduled"
        );
        Ok(result)
    }

    /// Moves the service to `DELETED` once its delete job completes.
    pub fn service_delete(
        &mut self,
        id: ServiceId,
        priority: Option<i64>,
    ) -> Result<ServiceMutationResult, StoreError> {
        self.service_transition(ServiceTransitionRequest {
            id,
            target: ServiceState::Deleted,
            priority,
        })
    }

    /// Re-drives the failed action toward the preserved target.
    pub fn service_retry(
        &mut self,
        request: ServiceRetryRequest,
    ) -> Result<ServiceMutationResult, StoreError> {
        let now_ms = now_ms();
        let policy = self.policy;
        let tx = begin_write(&mut self.conn)?;
        let service = service_require_tx(&tx, &request.id)?;

        let mut reconcile = service.reconcile();
        let action = reconcile.begin_retry(service.live_job_id.as_ref(), &policy)?;
        let result = schedule_tx(&tx, &service, &reconcile, action, request.priority, now_ms)?;
        tx.commit()?;

        tracing::debug!(
            service_id = %result.service.id,
            action = %action,
            retry_count = result.service.retry_count,
            "service retry scheduled"
        );
        Ok(result)
    }

    pub fn services_list(
        &self,
        request: ServicesListRequest,
    ) -> Result<ServicesListResult, StoreError> {
        let limit = clamp_limit(request.limit);
        let offset = to_sqlite_i64(request.offset)?;

        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {SERVICE_COLUMNS}
            FROM services s
            WHERE (?1 IS NULL OR s.consumer_id=?1)
              AND (?2 IS NULL OR s.agent_id=?2)
            ORDER BY s.rowid ASC
            LIMIT ?3 OFFSET ?4
            "#
        ))?;
        let rows = stmt.query_map(
            params![
                request.scope.consumer_param(),
                request.scope.agent_param(),
                to_sqlite_i64(limit + 1)?,
                offset
            ],
            read_service_row,
        )?;
        let mut services = rows.collect::<Result<Vec<_>, _>>()?;

        let has_more = services.len() > limit;
        if has_more {
            services.truncate(limit);
        }
        Ok(ServicesListResult { services, has_more })
    }
}
