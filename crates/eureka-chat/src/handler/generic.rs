//! Generic conversation handler.
//!
//! History-aware but task-less: every reply is generated from the whole
//! session history.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eureka_core::types::{HistoryEntry, SessionContext, TaskKind};
use tracing::{debug, warn};

use crate::completion::{complete_bounded, CompletionRequest, CompletionService};
use crate::handler::{TaskHandler, TurnInput, APOLOGY, EMPTY_PROMPT, GENERIC_CLOSING};

/// Instruction for general-purpose questions.
pub const GENERIC_INSTRUCTION: &str = "\
You are Eureka, a helpful IT support assistant for a banking organisation.
Answer clearly and concisely, in the language of the user.
If the user wants an incident analysed, ask for its identifier (for example INC2309845).";

pub struct GenericHandler {
    completion: Arc<dyn CompletionService>,
    timeout: Duration,
    history_limit: usize,
}

impl GenericHandler {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        timeout: Duration,
        history_limit: usize,
    ) -> Self {
        Self {
            completion,
            timeout,
            history_limit,
        }
    }
}

#[async_trait]
impl TaskHandler for GenericHandler {
    fn task(&self) -> TaskKind {
        TaskKind::Generic
    }

    async fn handle(&self, turn: &TurnInput<'_>, context: &mut SessionContext) -> String {
        if turn.exit_requested {
            debug!(token = %context.token, "Generic conversation closed");
            context.clear_history();
            return GENERIC_CLOSING.to_string();
        }

        if turn.utterance.trim().is_empty() {
            return EMPTY_PROMPT.to_string();
        }

        context.push_history(HistoryEntry::user(turn.utterance), self.history_limit);
        let request = CompletionRequest::with_history(GENERIC_INSTRUCTION, &context.history);

        match complete_bounded(self.completion.as_ref(), &request, self.timeout).await {
            Ok(reply) => {
                context.push_history(HistoryEntry::assistant(reply.as_str()), self.history_limit);
                reply
            }
            Err(e) => {
                warn!(token = %context.token, error = %e, "Generic completion failed");
                APOLOGY.to_string()
            }
        }
    }
}
