#![forbid(unsafe_code)]

use super::{ListScope, ServiceRow};
use fulcrum_core::auth::AuthTargetScope;
use fulcrum_core::ids::{AgentId, JobId, ParticipantId, ServiceId};
use fulcrum_core::model::{JobAction, JobStatus};
use serde::Serialize;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, Serialize)]
pub struct JobRow {
    pub id: JobId,
    pub seq: i64,
    pub revision: i64,
    pub service_id: ServiceId,
    pub agent_id: AgentId,
    pub provider_id: ParticipantId,
    pub consumer_id: ParticipantId,
    pub action: JobAction,
    pub status: JobStatus,
    pub priority: i64,
    pub claimed_at_ms: Option<i64>,
    pub completed_at_ms: Option<i64>,
    pub error_message: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl JobRow {
    pub fn target_scope(&self) -> AuthTargetScope {
        AuthTargetScope::workload(
            self.provider_id.clone(),
            self.consumer_id.clone(),
            self.agent_id.clone(),
        )
    }
}

#[derive(Clone, Debug)]
pub struct JobsPendingRequest {
    pub agent_id: AgentId,
    pub limit: usize,
}

#[derive(Clone, Debug)]
pub struct JobClaimRequest {
    pub id: JobId,
    pub agent_id: AgentId,
}

#[derive(Clone, Debug)]
pub struct JobCompleteRequest {
    pub id: JobId,
    pub resources: Option<JsonValue>,
    pub external_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct JobFailRequest {
    pub id: JobId,
    pub error_message: String,
}

/// Terminal job plus the service the outcome was folded into.
#[derive(Clone, Debug, Serialize)]
pub struct JobOutcomeResult {
    pub job: JobRow,
    pub service: ServiceRow,
    /// Set on failure when no retry budget is left.
    pub retries_exhausted: bool,
}

#[derive(Clone, Debug)]
pub struct JobsListRequest {
    pub scope: ListScope,
    pub service_id: Option<ServiceId>,
    pub status: Option<JobStatus>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct JobsListResult {
    pub jobs: Vec<JobRow>,
    pub has_more: bool,
}
