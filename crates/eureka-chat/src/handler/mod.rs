//! Task handler trait and fixed reply texts.
//!
//! Each [`TaskKind`] has exactly one handler. Handlers own every mutation of
//! the task-scoped part of the session context, including termination.

pub mod generic;
pub mod incident;

use async_trait::async_trait;
use eureka_core::types::{SessionContext, TaskKind};

pub use generic::GenericHandler;
pub use incident::IncidentHandler;

/// Reply when the generic conversation is closed by an exit phrase.
pub const GENERIC_CLOSING: &str = "You're welcome. Feel free to come back if you need anything else.";

/// Reply when an incident conversation is closed by an exit phrase.
pub const INCIDENT_CLOSING: &str =
    "Incident analysis closed. Mention another incident whenever you need help with one.";

/// Reply whenever the completion service fails or times out.
pub const APOLOGY: &str =
    "Sorry, I could not process your request right now. Please try again in a moment.";

/// Reply to a blank utterance.
pub const EMPTY_PROMPT: &str = "I didn't catch that. What would you like to know?";

/// One routed turn as seen by a handler.
#[derive(Clone, Copy, Debug)]
pub struct TurnInput<'a> {
    pub utterance: &'a str,
    /// The router saw an exit phrase; the handler must terminate.
    pub exit_requested: bool,
}

/// Handles turns routed to one task.
///
/// Handlers never fail: every error is recovered into a reply and a
/// consistent context.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn task(&self) -> TaskKind;

    async fn handle(&self, turn: &TurnInput<'_>, context: &mut SessionContext) -> String;
}
