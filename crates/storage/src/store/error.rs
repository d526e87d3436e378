#![forbid(unsafe_code)]

use fulcrum_core::auth::AuthError;
use fulcrum_core::model::JobStatus;
use fulcrum_core::properties::PropertiesError;
use fulcrum_core::reconcile::ReconcileError;

/// Coarse error classes surfaced to the request boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Unauthorized,
    InvalidState,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid input: {0}")]
    InvalidProperties(#[from] PropertiesError),
    #[error("unknown {entity} id: {id}")]
    UnknownId { entity: &'static str, id: String },
    #[error(transparent)]
    Unauthorized(#[from] AuthError),
    #[error("{0}")]
    Reconcile(#[from] ReconcileError),
    #[error("job {job_id} is not claimable (status={status})")]
    JobNotClaimable { job_id: String, status: JobStatus },
    #[error("job {job_id} is not claimed (status={status})")]
    JobNotClaimed { job_id: String, status: JobStatus },
    #[error("revision mismatch on {entity} {id} (expected={expected})")]
    RevisionMismatch {
        entity: &'static str,
        id: String,
        expected: i64,
    },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Sql(_) | Self::Json(_) => ErrorKind::Internal,
            Self::InvalidInput(_) | Self::InvalidProperties(_) => ErrorKind::InvalidInput,
            Self::UnknownId { .. } => ErrorKind::NotFound,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Reconcile(_)
            | Self::JobNotClaimable { .. }
            | Self::JobNotClaimed { .. }
            | Self::RevisionMismatch { .. } => ErrorKind::InvalidState,
        }
    }

    pub(crate) fn unknown(entity: &'static str, id: impl Into<String>) -> Self {
        Self::UnknownId {
            entity,
            id: id.into(),
        }
    }
}
