#![forbid(unsafe_code)]

use super::JobRow;
use fulcrum_core::auth::AuthTargetScope;
use fulcrum_core::ids::{AgentId, GroupId, JobId, ParticipantId, ServiceId, ServiceTypeId};
use fulcrum_core::model::{JobAction, ServiceState};
use fulcrum_core::reconcile::{ReconcileStatus, ServiceReconcile};
use serde::Serialize;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, Serialize)]
pub struct ServiceRow {
    pub id: ServiceId,
    pub revision: i64,
    pub name: String,
    pub agent_id: AgentId,
    pub provider_id: ParticipantId,
    pub consumer_id: ParticipantId,
    pub group_id: GroupId,
    pub service_type_id: ServiceTypeId,
    pub current_state: ServiceState,
    pub target_state: Option<ServiceState>,
    pub failed_action: Option<JobAction>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub attributes: JsonValue,
    pub current_properties: Option<JsonValue>,
    pub target_properties: Option<JsonValue>,
    pub resources: Option<JsonValue>,
    pub external_id: Option<String>,
    pub target_set_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    /// Pending or claimed job driving the target, if any.
    pub live_job_id: Option<JobId>,
}

impl ServiceRow {
    pub fn target_scope(&self) -> AuthTargetScope {
        AuthTargetScope::workload(
            self.provider_id.clone(),
            self.consumer_id.clone(),
            self.agent_id.clone(),
        )
    }

    pub fn reconcile(&self) -> ServiceReconcile {
        ServiceReconcile {
            current_state: self.current_state,
            target_state: self.target_state,
            failed_action: self.failed_action,
            error_message: self.error_message.clone(),
            retry_count: self.retry_count,
        }
    }

    pub fn reconcile_status(&self) -> ReconcileStatus {
        self.reconcile().status(self.live_job_id.as_ref())
    }
}

#[derive(Clone, Debug)]
pub struct ServiceCreateRequest {
    pub agent_id: AgentId,
    pub service_type_id: ServiceTypeId,
    pub group_id: GroupId,
    pub name: String,
    pub attributes: JsonValue,
    pub properties: JsonValue,
    pub priority: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct ServiceUpdateRequest {
    pub id: ServiceId,
    pub name: Option<String>,
    /// New desired configuration. A change schedules an `UPDATE` job.
    pub properties: Option<JsonValue>,
    pub priority: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct ServiceTransitionRequest {
    pub id: ServiceId,
    pub target: ServiceState,
    pub priority: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct ServiceRetryRequest {
    pub id: ServiceId,
    pub priority: Option<i64>,
}

/// Service after a mutation, plus the job it enqueued (if any).
#[derive(Clone, Debug, Serialize)]
pub struct ServiceMutationResult {
    pub service: ServiceRow,
    pub job: Option<JobRow>,
}

#[derive(Clone, Debug)]
pub struct ServicesListRequest {
    pub scope: super::ListScope,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServicesListResult {
    pub services: Vec<ServiceRow>,
    pub has_more: bool,
}
