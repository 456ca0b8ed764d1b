//! Incident enrichment pipeline.
//!
//! Four sequential stages gather context for an incident from the knowledge
//! tables: resolve the identifier, map it to application codes, enrich each
//! code with its record, and correlate related incidents. The result is
//! rendered into an instruction for the completion service and a one-line
//! summary for the user. The pipeline never calls the completion service.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use eureka_knowledge::{ApplicationRecord, KnowledgeLookup, RelatedIncident, UNSPECIFIED};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::router::IncidentIdExtractor;

/// Identifier bound when none can be derived from the conversation.
pub const UNKNOWN_INCIDENT: &str = "unknown";

/// An application with every descriptive field filled in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApplicationProfile {
    pub code: String,
    pub name: String,
    pub owner: String,
    pub environment: String,
    pub version: String,
    pub status: String,
    pub description: String,
}

impl ApplicationProfile {
    pub fn from_record(code: &str, record: Option<ApplicationRecord>) -> Self {
        let record = record.unwrap_or_else(|| ApplicationRecord::bare(code));
        let fill = |field: Option<String>| {
            field
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| UNSPECIFIED.to_string())
        };
        Self {
            code: code.to_string(),
            name: fill(record.name),
            owner: fill(record.owner),
            environment: fill(record.environment),
            version: fill(record.version),
            status: fill(record.status),
            description: fill(record.description),
        }
    }
}

/// Everything gathered for one incident during a single pipeline run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnrichmentContext {
    pub incident_id: String,
    pub applications: Vec<ApplicationProfile>,
    pub related_incidents: Vec<RelatedIncident>,
}

/// The pipeline's externally visible outputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichmentOutcome {
    pub context: EnrichmentContext,
    /// Instruction text reused on every later turn of the conversation.
    pub instruction: String,
    /// Short user-facing sentence returned as the turn's reply.
    pub summary: String,
}

/// Stateless pipeline, built once and shared by every request.
pub struct EnrichmentPipeline {
    knowledge: Arc<dyn KnowledgeLookup>,
    extractor: IncidentIdExtractor,
}

impl EnrichmentPipeline {
    pub fn new(knowledge: Arc<dyn KnowledgeLookup>, extractor: IncidentIdExtractor) -> Self {
        Self {
            knowledge,
            extractor,
        }
    }

    /// Run every stage for one incident. Always completes.
    pub async fn run(&self, bound_id: Option<&str>, utterance: &str) -> EnrichmentOutcome {
        let incident_id = self.resolve_identifier(bound_id, utterance);
        let codes = self.map_applications(&incident_id).await;
        let applications = self.enrich_applications(&codes).await;
        let related_incidents = self.correlate(&incident_id).await;

        let context = EnrichmentContext {
            incident_id,
            applications,
            related_incidents,
        };
        info!(
            incident_id = %context.incident_id,
            applications = context.applications.len(),
            related = context.related_incidents.len(),
            "Enrichment complete"
        );

        EnrichmentOutcome {
            instruction: compose_instruction(&context),
            summary: compose_summary(&context),
            context,
        }
    }

    /// Stage 1: keep a bound identifier, otherwise derive one or use the sentinel.
    fn resolve_identifier(&self, bound_id: Option<&str>, utterance: &str) -> String {
        if let Some(id) = bound_id.filter(|id| !id.trim().is_empty()) {
            return id.to_string();
        }
        match self.extractor.extract_loose(utterance) {
            Some(id) => id,
            None => {
                debug!("No incident identifier in utterance, using sentinel");
                UNKNOWN_INCIDENT.to_string()
            }
        }
    }

    /// Stage 2: incident -> application codes, deduplicated in order.
    async fn map_applications(&self, incident_id: &str) -> Vec<String> {
        match self.knowledge.applications_for_incident(incident_id).await {
            Ok(codes) => {
                let mut seen = HashSet::new();
                codes
                    .into_iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty() && seen.insert(c.clone()))
                    .collect()
            }
            Err(e) => {
                warn!(incident_id = %incident_id, error = %e, "Application mapping failed");
                Vec::new()
            }
        }
    }

    /// Stage 3: one profile per code; missing records become bare profiles.
    async fn enrich_applications(&self, codes: &[String]) -> Vec<ApplicationProfile> {
        let mut profiles = Vec::with_capacity(codes.len());
        for code in codes {
            let record = match self.knowledge.application(code).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(code = %code, error = %e, "Application lookup failed");
                    None
                }
            };
            profiles.push(ApplicationProfile::from_record(code, record));
        }
        profiles
    }

    /// Stage 4: incident -> related incidents.
    async fn correlate(&self, incident_id: &str) -> Vec<RelatedIncident> {
        match self.knowledge.related_incidents(incident_id).await {
            Ok(related) => related,
            Err(e) => {
                warn!(incident_id = %incident_id, error = %e, "Related incident lookup failed");
                Vec::new()
            }
        }
    }
}

/// Render the context into the instruction sent with every follow-up question.
pub fn compose_instruction(context: &EnrichmentContext) -> String {
    let mut out = String::new();
    out.push_str(
        "You are an IT incident analyst. Answer the user's questions about the incident \
         below using only this context. If the context does not contain the answer, say so.\n\n",
    );
    let _ = writeln!(out, "Incident: {}", context.incident_id);

    out.push_str("\nImpacted applications:\n");
    if context.applications.is_empty() {
        out.push_str("- none found\n");
    }
    for app in &context.applications {
        let _ = writeln!(
            out,
            "- {} | name: {} | owner: {} | environment: {} | version: {} | status: {} | description: {}",
            app.code, app.name, app.owner, app.environment, app.version, app.status, app.description
        );
    }

    out.push_str("\nRelated incidents:\n");
    if context.related_incidents.is_empty() {
        out.push_str("- none found\n");
    }
    for rel in &context.related_incidents {
        let _ = writeln!(
            out,
            "- {} | status: {} | description: {}",
            rel.id, rel.status, rel.description
        );
    }
    out
}

/// One sentence reporting what was found.
pub fn compose_summary(context: &EnrichmentContext) -> String {
    format!(
        "Incident {} loaded: {} application(s) and {} related incident(s) found. \
         Ask me anything about it, or say \"stop\" to finish.",
        context.incident_id,
        context.applications.len(),
        context.related_incidents.len()
    )
}

// =============================================================================
// Tests
// =============================================================================
