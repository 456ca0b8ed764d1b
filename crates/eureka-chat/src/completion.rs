//! Seam to the external text-completion service.

use std::time::Duration;

use async_trait::async_trait;
use eureka_core::types::HistoryEntry;

use crate::error::CompletionError;

/// One call to the completion service: a fixed instruction plus the
/// conversational input (a single utterance or a full history).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    pub instruction: String,
    pub messages: Vec<HistoryEntry>,
}

impl CompletionRequest {
    /// Instruction plus one user utterance.
    pub fn single(instruction: impl Into<String>, utterance: &str) -> Self {
        Self {
            instruction: instruction.into(),
            messages: vec![HistoryEntry::user(utterance)],
        }
    }

    /// Instruction plus a conversation transcript.
    pub fn with_history(instruction: impl Into<String>, history: &[HistoryEntry]) -> Self {
        Self {
            instruction: instruction.into(),
            messages: history.to_vec(),
        }
    }
}

/// Generates text from an instruction and conversational input.
///
/// Implementations never touch routing state.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

/// Call `service` with an upper bound on latency.
///
/// A timeout and a blank reply are reported as errors so callers have a
/// single failure path.
pub async fn complete_bounded(
    service: &dyn CompletionService,
    request: &CompletionRequest,
    timeout: Duration,
) -> Result<String, CompletionError> {
    match tokio::time::timeout(timeout, service.complete(request)).await {
        Ok(Ok(text)) if text.trim().is_empty() => Err(CompletionError::EmptyResponse),
        Ok(result) => result,
        Err(_) => Err(CompletionError::Timeout(timeout)),
    }
}
