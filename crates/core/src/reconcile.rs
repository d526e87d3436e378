#![forbid(unsafe_code)]

//! Service reconciliation state machine.
//!
//! The persisted shape keeps nullable columns (`target_state`,
//! `failed_action`, `error_message`, `retry_count`); [`ReconcileStatus`] is
//! the tagged view over them. Every mutator checks its guard first and only
//! then writes, so a rejected call leaves the value untouched.

use crate::ids::JobId;
use crate::model::{JobAction, ServiceState};
use crate::policy::ReconcilePolicy;
use serde::Serialize;

pub const TIMEOUT_MESSAGE: &str = "timeout";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("service has a live job {job_id}")]
    JobInFlight { job_id: JobId },
    #[error("service is deleted")]
    ServiceDeleted,
    #[error("service is already {state}")]
    UnchangedTarget { state: ServiceState },
    #[error("cannot move service from {from} to {to}")]
    InvalidTransition { from: ServiceState, to: ServiceState },
    #[error("service has no failed transition to retry")]
    NothingToRetry,
    #[error("retry budget exhausted ({retry_count}/{max_retries})")]
    RetryBudgetExhausted { retry_count: u32, max_retries: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileStatus {
    AtRest,
    Reconciling {
        target: ServiceState,
        job_id: JobId,
    },
    Failed {
        action: JobAction,
        message: Option<String>,
        retry_count: u32,
        /// `None` once retries are exhausted.
        target: Option<ServiceState>,
    },
}

/// Action a job must perform to move a service from `current` to `target`.
pub fn action_for(current: ServiceState, target: ServiceState) -> Result<JobAction, ReconcileError> {
    use ServiceState as S;

    if current == S::Deleted {
        return Err(ReconcileError::ServiceDeleted);
    }
    if current == target {
        return Err(ReconcileError::UnchangedTarget { state: current });
    }
    match (current, target) {
        (S::Created, S::Started) => Ok(JobAction::Create),
        (S::Stopped, S::Started) => Ok(JobAction::Start),
        (S::Started, S::Stopped) => Ok(JobAction::Stop),
        (_, S::Deleted) => Ok(JobAction::Delete),
        (from, to) => Err(ReconcileError::InvalidTransition { from, to }),
    }
}

/// Reconciliation fields of one service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceReconcile {
    pub current_state: ServiceState,
    pub target_state: Option<ServiceState>,
    pub failed_action: Option<JobAction>,
    pub error_message: Option<String>,
    pub retry_count: u32,
}

impl ServiceReconcile {
    /// Freshly created service, already driving toward `Started`.
    pub fn new_created() -> (Self, JobAction) {
        let value = Self {
            current_state: ServiceState::Created,
            target_state: Some(ServiceState::Started),
            failed_action: None,
            error_message: None,
            retry_count: 0,
        };
        (value, JobAction::Create)
    }

    pub fn status(&self, live_job: Option<&JobId>) -> ReconcileStatus {
        if let (Some(target), Some(job_id)) = (self.target_state, live_job) {
            return ReconcileStatus::Reconciling {
                target,
                job_id: job_id.clone(),
            };
        }
        match self.failed_action {
            Some(action) => ReconcileStatus::Failed {
                action,
                message: self.error_message.clone(),
                retry_count: self.retry_count,
                target: self.target_state,
            },
            None => ReconcileStatus::AtRest,
        }
    }

    fn ensure_idle(&self, live_job: Option<&JobId>) -> Result<(), ReconcileError> {
        if self.current_state.is_terminal() {
            return Err(ReconcileError::ServiceDeleted);
        }
        if let Some(job_id) = live_job {
            return Err(ReconcileError::JobInFlight {
                job_id: job_id.clone(),
            });
        }
        Ok(())
    }

    /// New target means a new attempt budget.
    pub fn begin_transition(
        &mut self,
        target: ServiceState,
        live_job: Option<&JobId>,
    ) -> Result<JobAction, ReconcileError> {
        self.ensure_idle(live_job)?;
        let action = action_for(self.current_state, target)?;
        self.target_state = Some(target);
        self.failed_action = None;
        self.error_message = None;
        self.retry_count = 0;
        Ok(action)
    }

    /// Reconfigure in place: the target is the current state.
    pub fn begin_update(&mut self, live_job: Option<&JobId>) -> Result<JobAction, ReconcileError> {
        self.ensure_idle(live_job)?;
        if !matches!(
            self.current_state,
            ServiceState::Started | ServiceState::Stopped
        ) {
            return Err(ReconcileError::InvalidTransition {
                from: self.current_state,
                to: self.current_state,
            });
        }
        self.target_state = Some(self.current_state);
        self.failed_action = None;
        self.error_message = None;
        self.retry_count = 0;
        Ok(JobAction::Update)
    }

    /// Re-drive the failed action toward the preserved target.
    ///
    /// The previous error is cleared; the next job outcome rewrites it.
    pub fn begin_retry(
        &mut self,
        live_job: Option<&JobId>,
        policy: &ReconcilePolicy,
    ) -> Result<JobAction, ReconcileError> {
        self.ensure_idle(live_job)?;
        let Some(action) = self.failed_action else {
            return Err(ReconcileError::NothingToRetry);
        };
        if policy.retries_exhausted(self.retry_count) {
            return Err(ReconcileError::RetryBudgetExhausted {
                retry_count: self.retry_count,
                max_retries: policy.max_retries,
            });
        }
        if self.target_state.is_none() {
            return Err(ReconcileError::NothingToRetry);
        }
        self.retry_count += 1;
        self.failed_action = None;
        self.error_message = None;
        Ok(action)
    }

    pub fn on_job_completed(&mut self) {
        if let Some(target) = self.target_state.take() {
            self.current_state = target;
        }
        self.failed_action = None;
        self.error_message = None;
        self.retry_count = 0;
    }

    /// Returns `true` when the failure is final (target dropped).
    pub fn on_job_failed(
        &mut self,
        action: JobAction,
        message: impl Into<String>,
        policy: &ReconcilePolicy,
    ) -> bool {
        self.failed_action = Some(action);
        self.error_message = Some(message.into());
        let exhausted = policy.retries_exhausted(self.retry_count);
        if exhausted {
            self.target_state = None;
        }
        exhausted
    }

    /// Action that was driving the current target, used when a target is
    /// found without any job and must be failed directly.
    pub fn pending_action(&self) -> Option<JobAction> {
        let target = self.target_state?;
        if target == self.current_state {
            return Some(JobAction::Update);
        }
        action_for(self.current_state, target).ok()
    }
}
