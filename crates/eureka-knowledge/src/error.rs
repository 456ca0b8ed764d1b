//! Error types for knowledge lookups.

use eureka_core::error::EurekaError;

/// Errors from a knowledge backend.
///
/// An absent key is never an error; these variants describe a backend that
/// could not answer at all.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("knowledge backend unavailable: {0}")]
    Unavailable(String),
    #[error("invalid knowledge data: {0}")]
    InvalidData(String),
}

impl From<serde_json::Error> for KnowledgeError {
    fn from(err: serde_json::Error) -> Self {
        KnowledgeError::InvalidData(err.to_string())
    }
}

impl From<std::io::Error> for KnowledgeError {
    fn from(err: std::io::Error) -> Self {
        KnowledgeError::Unavailable(err.to_string())
    }
}

impl From<KnowledgeError> for EurekaError {
    fn from(err: KnowledgeError) -> Self {
        EurekaError::Knowledge(err.to_string())
    }
}
