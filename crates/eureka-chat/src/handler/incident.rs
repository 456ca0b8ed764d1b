//! Incident-analysis handler.
//!
//! Drives one incident conversation through its phases. The first turn runs
//! the enrichment pipeline and answers with a summary; later turns answer
//! from the cached instruction. Any failure resets the session to idle so a
//! conversation can never get stuck.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eureka_core::types::{HistoryEntry, IncidentPhase, SessionContext, TaskKind};
use tracing::{debug, error, info, warn};

use crate::completion::{complete_bounded, CompletionRequest, CompletionService};
use crate::enrichment::EnrichmentPipeline;
use crate::error::TaskError;
use crate::handler::{TaskHandler, TurnInput, APOLOGY, EMPTY_PROMPT, INCIDENT_CLOSING};
use crate::state_machine::validate_transition;

pub struct IncidentHandler {
    pipeline: EnrichmentPipeline,
    completion: Arc<dyn CompletionService>,
    timeout: Duration,
    history_limit: usize,
}

impl IncidentHandler {
    pub fn new(
        pipeline: EnrichmentPipeline,
        completion: Arc<dyn CompletionService>,
        timeout: Duration,
        history_limit: usize,
    ) -> Self {
        Self {
            pipeline,
            completion,
            timeout,
            history_limit,
        }
    }

    /// Starting -> Enriching: run the pipeline once and reply with its summary.
    async fn start(
        &self,
        phase: IncidentPhase,
        utterance: &str,
        context: &mut SessionContext,
    ) -> String {
        if let Err(e) = validate_transition(phase, IncidentPhase::Enriching) {
            return self.abort(context, &e.to_string());
        }

        let bound = context.incident_id().map(str::to_string);
        let outcome = self.pipeline.run(bound.as_deref(), utterance).await;
        context.bind_incident_id(&outcome.context.incident_id);

        if let Some(conv) = context.incident_mut() {
            conv.phase = IncidentPhase::Enriching;
            conv.composed_instruction = Some(outcome.instruction);
            conv.turn_count = 1;
        }
        info!(
            token = %context.token,
            incident_id = %outcome.context.incident_id,
            "Incident conversation started"
        );

        self.record(context, utterance, &outcome.summary);
        outcome.summary
    }

    /// Enriching/Conversing -> Conversing: answer from the cached instruction.
    async fn converse(
        &self,
        phase: IncidentPhase,
        utterance: &str,
        context: &mut SessionContext,
    ) -> String {
        if utterance.trim().is_empty() {
            return EMPTY_PROMPT.to_string();
        }
        if let Err(e) = validate_transition(phase, IncidentPhase::Conversing) {
            return self.abort(context, &e.to_string());
        }
        let instruction = match context.composed_instruction() {
            Some(text) => text.to_string(),
            None => return self.abort(context, &TaskError::MissingInstruction.to_string()),
        };

        let request = CompletionRequest::single(instruction, utterance);
        match complete_bounded(self.completion.as_ref(), &request, self.timeout).await {
            Ok(reply) => {
                if let Some(conv) = context.incident_mut() {
                    conv.phase = IncidentPhase::Conversing;
                    conv.turn_count += 1;
                }
                debug!(
                    token = %context.token,
                    turn_count = context.turn_count(),
                    "Incident follow-up answered"
                );
                self.record(context, utterance, &reply);
                reply
            }
            Err(e) => {
                warn!(
                    token = %context.token,
                    incident_id = context.incident_id().unwrap_or_default(),
                    error = %e,
                    "Incident completion failed, resetting conversation"
                );
                context.reset_task();
                APOLOGY.to_string()
            }
        }
    }

    /// Any phase -> Terminated. Nothing of the conversation is kept.
    fn terminate(&self, phase: IncidentPhase, context: &mut SessionContext) -> String {
        if let Err(e) = validate_transition(phase, IncidentPhase::Terminated) {
            debug!(error = %e, "Terminating from unexpected phase");
        }
        info!(
            token = %context.token,
            incident_id = context.incident_id().unwrap_or_default(),
            "Incident conversation closed"
        );
        context.reset_task();
        context.clear_history();
        INCIDENT_CLOSING.to_string()
    }

    fn abort(&self, context: &mut SessionContext, reason: &str) -> String {
        error!(token = %context.token, reason = %reason, "Incident conversation aborted");
        context.reset_task();
        APOLOGY.to_string()
    }

    fn record(&self, context: &mut SessionContext, utterance: &str, reply: &str) {
        context.push_history(HistoryEntry::user(utterance), self.history_limit);
        context.push_history(HistoryEntry::assistant(reply), self.history_limit);
    }
}

#[async_trait]
impl TaskHandler for IncidentHandler {
    fn task(&self) -> TaskKind {
        TaskKind::IncidentAnalysis
    }

    async fn handle(&self, turn: &TurnInput<'_>, context: &mut SessionContext) -> String {
        let phase = match context.incident() {
            Some(conv) => conv.phase,
            None => {
                context.begin_incident(None);
                IncidentPhase::Starting
            }
        };

        if turn.exit_requested {
            return self.terminate(phase, context);
        }

        match phase {
            IncidentPhase::Starting => self.start(phase, turn.utterance, context).await,
            IncidentPhase::Enriching | IncidentPhase::Conversing => {
                self.converse(phase, turn.utterance, context).await
            }
            IncidentPhase::Terminated => {
                // Never persisted; treat a leftover as a fresh start.
                context.reset_task();
                context.begin_incident(None);
                self.start(IncidentPhase::Starting, turn.utterance, context)
                    .await
            }
        }
    }
}
