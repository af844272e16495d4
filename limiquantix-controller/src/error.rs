//! Control plane error taxonomy.
//!
//! One enum per visible error code; everything the orchestrator surfaces is
//! one of these, and the service layer maps them onto `tonic::Status`
//! unchanged.

use thiserror::Error;
use tonic::Status;

use crate::repository::RepositoryError;
use limiquantix_nodeclient::AgentError;

/// Errors surfaced by the control plane core.
#[derive(Error, Debug)]
pub enum ControlPlaneError {
    /// A request failed shape or range validation.
    #[error("invalid argument: {field}: {message}")]
    InvalidArgument { field: String, message: String },

    /// The referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The VM is not in a state that admits the operation.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// A channel to a node agent could not be established; retryable.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The remote side refused or errored, or persistence failed.
    #[error("internal: {0}")]
    Internal(String),
}

impl ControlPlaneError {
    /// Build a validation error for a named field.
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<RepositoryError> for ControlPlaneError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => ControlPlaneError::NotFound(msg),
            RepositoryError::AlreadyExists(msg) => ControlPlaneError::AlreadyExists(msg),
            RepositoryError::Conflict(msg) => {
                ControlPlaneError::Internal(format!("concurrent modification: {msg}"))
            }
            RepositoryError::Storage(msg) => ControlPlaneError::Internal(msg),
        }
    }
}

impl From<AgentError> for ControlPlaneError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::ConnectFailed { .. } => ControlPlaneError::Unavailable(err.to_string()),
            other => ControlPlaneError::Internal(other.to_string()),
        }
    }
}

impl From<ControlPlaneError> for Status {
    fn from(err: ControlPlaneError) -> Self {
        let message = err.to_string();
        match err {
            ControlPlaneError::InvalidArgument { .. } => Status::invalid_argument(message),
            ControlPlaneError::NotFound(_) => Status::not_found(message),
            ControlPlaneError::AlreadyExists(_) => Status::already_exists(message),
            ControlPlaneError::FailedPrecondition(_) => Status::failed_precondition(message),
            ControlPlaneError::Unavailable(_) => Status::unavailable(message),
            ControlPlaneError::Internal(_) => Status::internal(message),
        }
    }
}

/// Result type alias for control plane operations.
pub type Result<T> = std::result::Result<T, ControlPlaneError>;
