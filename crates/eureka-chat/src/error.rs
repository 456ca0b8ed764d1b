//! Error types for the conversational core.

use std::time::Duration;

use eureka_core::error::EurekaError;
use eureka_core::types::IncidentPhase;
use eureka_session::SessionError;

/// Errors surfaced by the orchestrator.
///
/// Only a session-store failure escapes `handle_turn`; everything else is
/// recovered inside the cycle.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("session store error: {0}")]
    Session(#[from] SessionError),
}

impl From<ChatError> for EurekaError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Config(msg) => EurekaError::Config(msg),
            ChatError::Session(e) => EurekaError::Session(e.to_string()),
        }
    }
}

/// Errors from the text-completion service.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Failed(String),
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),
    #[error("completion service returned an empty response")]
    EmptyResponse,
}

impl From<CompletionError> for EurekaError {
    fn from(err: CompletionError) -> Self {
        EurekaError::Completion(err.to_string())
    }
}

/// Errors from the incident conversation lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Invalid phase transition: {0} -> {1}")]
    InvalidTransition(IncidentPhase, IncidentPhase),
    #[error("Incident conversation has no composed instruction")]
    MissingInstruction,
}
