#![forbid(unsafe_code)]

use super::super::StoreError;
use fulcrum_core::auth::{AuthIdentity, AuthRole};
use fulcrum_core::ids::{AgentId, ParticipantId};

/// Row visibility for list queries, mirroring the scope an identity is
/// bound to when authorizing single-record reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListScope {
    All,
    Consumer(ParticipantId),
    Agent(AgentId),
}

impl ListScope {
    pub fn for_identity(identity: &AuthIdentity) -> Result<Self, StoreError> {
        match identity.role {
            AuthRole::FulcrumAdmin => Ok(Self::All),
            AuthRole::Participant => identity
                .scope
                .participant_id
                .clone()
                .map(Self::Consumer)
                .ok_or(StoreError::InvalidInput(
                    "participant identity has no participant_id",
                )),
            AuthRole::Agent => identity
                .scope
                .agent_id
                .clone()
                .map(Self::Agent)
                .ok_or(StoreError::InvalidInput("agent identity has no agent_id")),
        }
    }

    pub(crate) fn consumer_param(&self) -> Option<&str> {
        match self {
            Self::Consumer(id) => Some(id.as_str()),
            _ => None,
        }
    }

    pub(crate) fn agent_param(&self) -> Option<&str> {
        match self {
            Self::Agent(id) => Some(id.as_str()),
            _ => None,
        }
    }
}
