//! Centralized error handling for the loan service
//!
//! Every operation reports one of three kinds of failure: the caller sent something
//! that cannot be accepted (invalid), a referenced record does not exist (not found),
//! or a collaborator failed underneath us (internal).

use thiserror::Error;

use crate::models::{LoanAction, LoanStatus};

/// Service error type shared by the state machine, coordinator and collaborators
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("ineligible action")]
    IneligibleAction {
        status: LoanStatus,
        action: LoanAction,
    },

    #[error("unknown state")]
    UnknownState(i16),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0:#}")]
    Internal(#[source] anyhow::Error),
}

/// Coarse classification of a [`ServiceError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Invalid,
    NotFound,
    Internal,
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::Invalid(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ServiceError::Internal(anyhow::anyhow!(message.into()))
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::IneligibleAction { .. }
            | ServiceError::UnknownState(_)
            | ServiceError::Invalid(_) => ErrorKind::Invalid,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Invalid => "INVALID",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.kind() == ErrorKind::Invalid
    }
}

// Adapters build their failures with anyhow::Context; anything that reaches us that
// way is a collaborator failure.
impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Internal(err)
    }
}

/// Result type alias using ServiceError
pub type ServiceResult<T> = Result<T, ServiceError>;
