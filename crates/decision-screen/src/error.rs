//! Error types

use thiserror::Error;

/// Failure of the page's send primitive
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("send primitive is not available yet")]
    NotReady,
    #[error("send failed: {0}")]
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ControllerError {
    /// Inbound message missing a field or carrying an invalid value; the
    /// message is dropped and state stays as it was
    #[error("malformed server message: {0}")]
    MalformedMessage(String),

    #[error("malformed session payload: {0}")]
    MalformedSession(String),

    #[error("transport unavailable: {0}")]
    TransportUnavailable(#[from] TransportError),

    #[error("{operation} is not allowed while {phase}")]
    InvalidTransition {
        operation: &'static str,
        phase: &'static str,
    },
}
