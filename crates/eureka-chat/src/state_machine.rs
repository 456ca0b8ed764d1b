//! Incident conversation state machine with validated transitions.
//!
//! Starting -> Enriching -> Conversing -> Conversing ...
//! Starting/Enriching/Conversing -> Terminated

use eureka_core::types::IncidentPhase;

use crate::error::TaskError;

/// Validate that a phase transition is allowed.
///
/// Valid transitions:
/// - Starting -> Enriching (identifier bound, pipeline runs once)
/// - Enriching -> Conversing (next turn)
/// - Conversing -> Conversing
/// - Starting -> Terminated
/// - Enriching -> Terminated
/// - Conversing -> Terminated
pub fn validate_transition(from: IncidentPhase, to: IncidentPhase) -> Result<(), TaskError> {
    let valid = matches!(
        (from, to),
        (IncidentPhase::Starting, IncidentPhase::Enriching)
            | (IncidentPhase::Enriching, IncidentPhase::Conversing)
            | (IncidentPhase::Conversing, IncidentPhase::Conversing)
            | (IncidentPhase::Starting, IncidentPhase::Terminated)
            | (IncidentPhase::Enriching, IncidentPhase::Terminated)
            | (IncidentPhase::Conversing, IncidentPhase::Terminated)
    );

    if valid {
        Ok(())
    } else {
        Err(TaskError::InvalidTransition(from, to))
    }
}
