#![forbid(unsafe_code)]

use fulcrum_core::auth::AuthTargetScope;
use fulcrum_core::ids::{AgentId, GroupId, ParticipantId};
use fulcrum_core::model::AgentStatus;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct AgentRow {
    pub id: AgentId,
    pub provider_id: ParticipantId,
    pub name: String,
    pub status: AgentStatus,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl AgentRow {
    pub fn target_scope(&self) -> AuthTargetScope {
        AuthTargetScope::agent(self.id.clone(), self.provider_id.clone())
    }
}

#[derive(Clone, Debug)]
pub struct AgentRegisterRequest {
    pub id: AgentId,
    pub provider_id: ParticipantId,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct AgentStatusRequest {
    pub id: AgentId,
    pub status: AgentStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServiceGroupRow {
    pub id: GroupId,
    pub consumer_id: ParticipantId,
    pub name: String,
    pub created_at_ms: i64,
}

impl ServiceGroupRow {
    pub fn target_scope(&self) -> AuthTargetScope {
        AuthTargetScope::participant(self.consumer_id.clone())
    }
}

#[derive(Clone, Debug)]
pub struct ServiceGroupRegisterRequest {
    pub id: GroupId,
    pub consumer_id: ParticipantId,
    pub name: String,
}
