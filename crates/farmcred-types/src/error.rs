use thiserror::Error;

use crate::request::{RequestEvent, RequestStatus};

#[derive(Debug, Error)]
pub enum FarmCredError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state: cannot apply {event:?} while request is {from:?}")]
    InvalidState {
        from: RequestStatus,
        event: RequestEvent,
    },

    #[error("Verification request not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("Agent not found: {0}")]
    AgentNotFound(uuid::Uuid),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FarmCredError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::ExternalService(message.into())
    }
}

impl From<serde_json::Error> for FarmCredError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FarmCredError>;
