//! In-memory knowledge tables loaded from a JSON document.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::error::KnowledgeError;
use crate::types::{ApplicationRecord, RelatedIncident};
use crate::KnowledgeLookup;

/// On-disk shape of the knowledge document.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KnowledgeDocument {
    incident_applications: HashMap<String, Vec<String>>,
    applications: HashMap<String, ApplicationRecord>,
    related_incidents: HashMap<String, Vec<RelatedIncident>>,
}

/// Read-only lookup tables held in memory.
///
/// Keys are normalised (trimmed, upper-cased) on insert and on lookup so
/// `inc2309845` and `INC2309845` resolve to the same row.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKnowledge {
    incident_applications: HashMap<String, Vec<String>>,
    applications: HashMap<String, ApplicationRecord>,
    related_incidents: HashMap<String, Vec<RelatedIncident>>,
}

impl InMemoryKnowledge {
    /// Empty tables: every lookup yields an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the three tables from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, KnowledgeError> {
        let doc: KnowledgeDocument = serde_json::from_str(json)?;
        let mut knowledge = Self::new();
        for (incident, codes) in doc.incident_applications {
            knowledge = knowledge.with_incident_applications(&incident, codes);
        }
        for (code, mut record) in doc.applications {
            if record.code.trim().is_empty() {
                record.code = code.clone();
            }
            knowledge = knowledge.with_application(record);
        }
        for (incident, related) in doc.related_incidents {
            knowledge = knowledge.with_related_incidents(&incident, related);
        }
        Ok(knowledge)
    }

    /// Load the tables from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, KnowledgeError> {
        let content = std::fs::read_to_string(path)?;
        let knowledge = Self::from_json_str(&content)?;
        info!(
            path = %path.display(),
            incidents = knowledge.incident_applications.len(),
            applications = knowledge.applications.len(),
            "Knowledge tables loaded"
        );
        Ok(knowledge)
    }

    pub fn with_incident_applications(
        mut self,
        incident_id: &str,
        codes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.incident_applications.insert(
            normalize_key(incident_id),
            codes.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn with_application(mut self, record: ApplicationRecord) -> Self {
        self.applications.insert(normalize_key(&record.code), record);
        self
    }

    pub fn with_related_incidents(
        mut self,
        incident_id: &str,
        related: impl IntoIterator<Item = RelatedIncident>,
    ) -> Self {
        self.related_incidents
            .insert(normalize_key(incident_id), related.into_iter().collect());
        self
    }
}

#[async_trait]
impl KnowledgeLookup for InMemoryKnowledge {
    async fn applications_for_incident(
        &self,
        incident_id: &str,
    ) -> Result<Vec<String>, KnowledgeError> {
        Ok(self
            .incident_applications
            .get(&normalize_key(incident_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn application(&self, code: &str) -> Result<Option<ApplicationRecord>, KnowledgeError> {
        Ok(self.applications.get(&normalize_key(code)).cloned())
    }

    async fn related_incidents(
        &self,
        incident_id: &str,
    ) -> Result<Vec<RelatedIncident>, KnowledgeError> {
        Ok(self
            .related_incidents
            .get(&normalize_key(incident_id))
            .cloned()
            .unwrap_or_default())
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_uppercase()
}
