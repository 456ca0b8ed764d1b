//! Conversational core of the Eureka incident desk.
//!
//! Routes user turns to task handlers, keeps per-session conversation state
//! and enriches incident conversations from the knowledge tables before
//! handing them to the completion service.

pub mod completion;
pub mod enrichment;
pub mod error;
pub mod handler;
pub mod orchestrator;
pub mod router;
pub mod state_machine;

pub use completion::{complete_bounded, CompletionRequest, CompletionService};
pub use enrichment::{
    ApplicationProfile, EnrichmentContext, EnrichmentOutcome, EnrichmentPipeline, UNKNOWN_INCIDENT,
};
pub use error::{ChatError, CompletionError, TaskError};
pub use handler::{
    GenericHandler, IncidentHandler, TaskHandler, TurnInput, APOLOGY, EMPTY_PROMPT,
    GENERIC_CLOSING, INCIDENT_CLOSING,
};
pub use orchestrator::ChatOrchestrator;
pub use router::{ExitDetector, IncidentIdExtractor, RouteDecision, TaskRouter, ROUTER_INSTRUCTION};
pub use state_machine::validate_transition;
