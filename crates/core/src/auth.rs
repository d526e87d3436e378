#![forbid(unsafe_code)]

//! Authorization scope model.
//!
//! Every authenticated identity carries a home [`AuthScope`]; every
//! authorizable resource exposes an [`AuthTargetScope`]. A request is
//! allowed when the identity's role permits the `(subject, action)` pair and
//! every scope field the role is bound to agrees with the target. Null target
//! fields are wildcards. The check is stateless and side-effect free.

use crate::ids::{AgentId, ParticipantId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthRole {
    FulcrumAdmin,
    Participant,
    Agent,
}

impl AuthRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FulcrumAdmin => "fulcrum_admin",
            Self::Participant => "participant",
            Self::Agent => "agent",
        }
    }

    /// Target scope fields this role is bound to. An admin is bound to none.
    ///
    /// A participant is bound to `participant_id`, which a workload sets to
    /// its consumer. Providers reach the workloads on their agents through
    /// agent identities, not participant ones.
    pub fn scoped_fields(self) -> &'static [ScopeField] {
        match self {
            Self::FulcrumAdmin => &[],
            Self::Participant => &[ScopeField::Participant],
            Self::Agent => &[ScopeField::Agent],
        }
    }
}

impl std::fmt::Display for AuthRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthSubject {
    Service,
    Job,
    Agent,
    ServiceGroup,
}

impl AuthSubject {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Job => "job",
            Self::Agent => "agent",
            Self::ServiceGroup => "service_group",
        }
    }
}

impl std::fmt::Display for AuthSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthAction {
    Create,
    Read,
    Update,
    Start,
    Stop,
    Delete,
    Retry,
    ListPending,
    Claim,
    Complete,
    Fail,
    UpdateStatus,
}

impl AuthAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Delete => "delete",
            Self::Retry => "retry",
            Self::ListPending => "list_pending",
            Self::Claim => "claim",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::UpdateStatus => "update_status",
        }
    }
}

impl std::fmt::Display for AuthAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeField {
    Participant,
    Agent,
}

impl ScopeField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Participant => "participant_id",
            Self::Agent => "agent_id",
        }
    }
}

impl std::fmt::Display for ScopeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Home scope of an identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthScope {
    pub participant_id: Option<ParticipantId>,
    pub agent_id: Option<AgentId>,
}

impl AuthScope {
    fn value(&self, field: ScopeField) -> Option<&str> {
        match field {
            ScopeField::Participant => self.participant_id.as_ref().map(ParticipantId::as_str),
            ScopeField::Agent => self.agent_id.as_ref().map(AgentId::as_str),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub id: String,
    pub name: String,
    pub role: AuthRole,
    pub scope: AuthScope,
}

impl AuthIdentity {
    pub fn admin(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            role: AuthRole::FulcrumAdmin,
            scope: AuthScope::default(),
        }
    }

    pub fn participant(id: impl Into<String>, participant_id: ParticipantId) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            role: AuthRole::Participant,
            scope: AuthScope {
                participant_id: Some(participant_id),
                agent_id: None,
            },
        }
    }

    /// An agent identity is scoped to itself and its provider.
    pub fn agent(id: impl Into<String>, agent_id: AgentId, provider_id: ParticipantId) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            role: AuthRole::Agent,
            scope: AuthScope {
                participant_id: Some(provider_id),
                agent_id: Some(agent_id),
            },
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == AuthRole::FulcrumAdmin
    }
}

/// Ownership scope of an authorizable resource. `None` fields are wildcards.
///
/// `provider_id` and `consumer_id` describe the workload for callers; only
/// `participant_id` and `agent_id` take part in matching.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTargetScope {
    pub participant_id: Option<ParticipantId>,
    pub provider_id: Option<ParticipantId>,
    pub consumer_id: Option<ParticipantId>,
    pub agent_id: Option<AgentId>,
}

impl AuthTargetScope {
    /// Matches anything.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn participant(participant_id: ParticipantId) -> Self {
        Self {
            participant_id: Some(participant_id),
            ..Self::default()
        }
    }

    pub fn agent(agent_id: AgentId, provider_id: ParticipantId) -> Self {
        Self {
            participant_id: Some(provider_id.clone()),
            provider_id: Some(provider_id),
            consumer_id: None,
            agent_id: Some(agent_id),
        }
    }

    /// Services and jobs are owned by their consumer and executed by the
    /// provider's agent.
    pub fn workload(provider_id: ParticipantId, consumer_id: ParticipantId, agent_id: AgentId) -> Self {
        Self {
            participant_id: Some(consumer_id.clone()),
            provider_id: Some(provider_id),
            consumer_id: Some(consumer_id),
            agent_id: Some(agent_id),
        }
    }

    fn value(&self, field: ScopeField) -> Option<&str> {
        match field {
            ScopeField::Participant => self.participant_id.as_ref().map(ParticipantId::as_str),
            ScopeField::Agent => self.agent_id.as_ref().map(AgentId::as_str),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("unauthorized: {role} may not {action} {subject}")]
    ActionNotPermitted {
        role: AuthRole,
        subject: AuthSubject,
        action: AuthAction,
    },
    #[error("unauthorized: {role} identity has no {field} in its scope")]
    IdentityScopeMissing { role: AuthRole, field: ScopeField },
    #[error("unauthorized: {role} scope does not match target {field}")]
    ScopeMismatch { role: AuthRole, field: ScopeField },
}

pub trait Authorizer {
    fn authorize(
        &self,
        identity: &AuthIdentity,
        subject: AuthSubject,
        action: AuthAction,
        target: &AuthTargetScope,
    ) -> Result<(), AuthError>;
}

/// Role permission table plus conjunctive scope matching.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScopeAuthorizer;

impl Authorizer for ScopeAuthorizer {
    fn authorize(
        &self,
        identity: &AuthIdentity,
        subject: AuthSubject,
        action: AuthAction,
        target: &AuthTargetScope,
    ) -> Result<(), AuthError> {
        authorize(identity, subject, action, target)
    }
}

pub fn authorize(
    identity: &AuthIdentity,
    subject: AuthSubject,
    action: AuthAction,
    target: &AuthTargetScope,
) -> Result<(), AuthError> {
    let role = identity.role;
    if role == AuthRole::FulcrumAdmin {
        return Ok(());
    }
    if !permits(role, subject, action) {
        return Err(AuthError::ActionNotPermitted {
            role,
            subject,
            action,
        });
    }
    for &field in role.scoped_fields() {
        let Some(expected) = target.value(field) else {
            continue;
        };
        let Some(actual) = identity.scope.value(field) else {
            return Err(AuthError::IdentityScopeMissing { role, field });
        };
        if actual != expected {
            return Err(AuthError::ScopeMismatch { role, field });
        }
    }
    Ok(())
}

pub fn permits(role: AuthRole, subject: AuthSubject, action: AuthAction) -> bool {
    use AuthAction as A;
    use AuthSubject as S;

    match role {
        AuthRole::FulcrumAdmin => true,
        AuthRole::Participant => match subject {
            S::Service => matches!(
                action,
                A::Create | A::Read | A::Update | A::Start | A::Stop | A::Delete | A::Retry
            ),
            S::ServiceGroup => matches!(action, A::Create | A::Read | A::Update | A::Delete),
            S::Job | S::Agent => action == A::Read,
        },
        AuthRole::Agent => match subject {
            S::Job => matches!(
                action,
                A::Read | A::ListPending | A::Claim | A::Complete | A::Fail
            ),
            S::Agent => matches!(action, A::Read | A::UpdateStatus),
            S::Service => action == A::Read,
            S::ServiceGroup => false,
        },
    }
}
