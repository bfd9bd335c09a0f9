// src/utils/errors.rs
//! Error taxonomy shared by every layer of the engine
//!
//! Synchronous request validation surfaces `NotFound`, `Conflict` and the
//! `Unsupported*`/`Invalid*` family directly to the HTTP caller. Failures
//! raised inside a background operation (`ProtocolError`, `InternalFailure`)
//! never reach a caller; the task runner records them on the agent instead.

use hyper::StatusCode;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, LabError>;

/// Errors produced by the engine
#[derive(Debug, Error)]
pub enum LabError {
    /// Unknown agent or simulator id
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Operation requested on a busy agent
    #[error("{0}")]
    Conflict(String),

    /// Unrecognised simulated environment name
    #[error("Unknown simulator environment: {0}")]
    UnsupportedEnvironment(String),

    /// Simulator configuration rejected at creation
    #[error("Invalid simulator config: {0}")]
    InvalidConfig(String),

    /// Action outside the environment's discrete action set
    #[error("Invalid action {action}: expected a value in 0..{action_count}")]
    InvalidAction { action: i64, action_count: usize },

    /// Malformed request body or parameters
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Remote simulator call failed or returned a malformed payload
    #[error("Simulator protocol error: {0}")]
    ProtocolError(String),

    /// The training/evaluation routine itself failed
    #[error("{0}")]
    InternalFailure(String),

    /// Engine configuration could not be loaded
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP server failure
    #[error("Server error: {0}")]
    ServerError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LabError {
    pub fn agent_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Agent",
            id: id.to_string(),
        }
    }

    pub fn simulator_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Simulator",
            id: id.to_string(),
        }
    }

    /// HTTP status reported to callers of the service facades
    pub fn status_code(&self) -> StatusCode {
        match self {
            LabError::NotFound { .. } => StatusCode::NOT_FOUND,
            LabError::Conflict(_)
            | LabError::UnsupportedEnvironment(_)
            | LabError::InvalidConfig(_)
            | LabError::InvalidAction { .. }
            | LabError::BadRequest(_) => StatusCode::BAD_REQUEST,
            LabError::ProtocolError(_) => StatusCode::BAD_GATEWAY,
            LabError::InternalFailure(_)
            | LabError::ConfigError(_)
            | LabError::ServerError(_)
            | LabError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<config::ConfigError> for LabError {
    fn from(err: config::ConfigError) -> Self {
        LabError::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            LabError::agent_not_found("abc").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LabError::Conflict("busy".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LabError::UnsupportedEnvironment("CartPole-v1".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LabError::ProtocolError("boom".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            LabError::InternalFailure("diverged".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages_name_the_culprit() {
        let err = LabError::UnsupportedEnvironment("CartPole-v1".into());
        assert!(err.to_string().contains("CartPole-v1"));

        let err = LabError::simulator_not_found("01H");
        assert_eq!(err.to_string(), "Simulator not found: 01H");
    }
}
