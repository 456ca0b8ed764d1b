//! Read-only knowledge tables used to enrich incident conversations.
//!
//! Three independent tables are exposed through [`KnowledgeLookup`]:
//! incident -> application codes, application code -> application record,
//! and incident -> related incidents.

pub mod error;
pub mod memory;
pub mod types;

use async_trait::async_trait;

pub use error::KnowledgeError;
pub use memory::InMemoryKnowledge;
pub use types::{ApplicationRecord, RelatedIncident, UNSPECIFIED};

/// Key -> record lookups against the knowledge tables.
///
/// An absent key yields an empty result, never an error. Errors are reserved
/// for a backend that cannot answer.
#[async_trait]
pub trait KnowledgeLookup: Send + Sync {
    /// Application codes impacted by an incident.
    async fn applications_for_incident(
        &self,
        incident_id: &str,
    ) -> Result<Vec<String>, KnowledgeError>;

    /// Record for one application code.
    async fn application(&self, code: &str) -> Result<Option<ApplicationRecord>, KnowledgeError>;

    /// Incidents correlated with `incident_id`.
    async fn related_incidents(
        &self,
        incident_id: &str,
    ) -> Result<Vec<RelatedIncident>, KnowledgeError>;
}
