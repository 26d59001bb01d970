//! Session error types

use std::sync::Arc;

use cloudsfu_controller::{ControllerError, MediaKind};
use thiserror::Error;

use crate::cleanup::CleanupStep;

/// Failures raised by the local media engine
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("device already loaded")]
    AlreadyLoaded,

    #[error("device not loaded")]
    NotLoaded,

    #[error("device cannot produce {0}")]
    CannotProduce(MediaKind),

    #[error("transport closed")]
    TransportClosed,

    #[error("negotiation callback dropped without an answer")]
    CallbackDropped,

    /// A transport event handler answered a negotiation with an error.
    #[error("handler rejected negotiation: {0}")]
    Rejected(Box<SessionError>),

    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by [`crate::MediaSession`] operations
///
/// `Clone` so that one in-flight transport creation can be awaited by
/// several callers.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// An operation was invoked before its dependency was ready.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Router already exists and is connected")]
    AlreadyConnected,

    #[error("Device already loaded")]
    DeviceAlreadyLoaded,

    /// A race was detected between a suspended operation and another
    /// mutation of the session.
    #[error("Inconsistent session state: {0}")]
    Inconsistent(String),

    #[error(transparent)]
    Remote(Arc<ControllerError>),

    #[error("Media engine error: {0}")]
    Engine(EngineError),
}

impl SessionError {
    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    /// The controller error behind a remote failure, if any.
    #[must_use]
    pub fn as_remote(&self) -> Option<&ControllerError> {
        match self {
            Self::Remote(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ControllerError> for SessionError {
    fn from(err: ControllerError) -> Self {
        Self::Remote(Arc::new(err))
    }
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Rejected(inner) => *inner,
            other => Self::Engine(other),
        }
    }
}

/// One failed step of a cleanup run. Recorded and logged, never returned as
/// an error.
#[derive(Debug, Clone, Error)]
#[error("cleanup step {step} failed: {message}")]
pub struct CleanupStepFailed {
    pub step: CleanupStep,
    pub message: String,
}
