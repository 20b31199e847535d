//! Error type for the simulation server.

use shared::{FrameError, ProtocolError, AUTH_FAILED_MSG};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// Bad credentials, blocked user or wrong simulation password. Carries no detail.
    #[error("{}", AUTH_FAILED_MSG)]
    Auth,

    /// Input for one session this tick was rejected; the rest of the batch is unaffected.
    #[error("invalid client update data: {0}")]
    Validation(String),

    /// A resource file (boat, map, simulation, contacts) is inconsistent.
    #[error("failed to load resource: {0}")]
    Load(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_message_is_generic() {
        assert_eq!(SimError::Auth.to_string(), AUTH_FAILED_MSG);
    }

    #[test]
    fn test_validation_message() {
        let err = SimError::Validation("rudder angle 120 is outside [-90, 90]".into());
        assert!(err.to_string().contains("rudder angle 120"));
    }
}
