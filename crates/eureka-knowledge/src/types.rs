//! Records served by the knowledge tables.

use serde::{Deserialize, Serialize};

/// An application as stored in the application table.
///
/// Descriptive fields are optional in the source data; consumers substitute
/// a sentinel for anything missing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationRecord {
    pub code: String,
    pub name: Option<String>,
    pub owner: Option<String>,
    pub environment: Option<String>,
    pub version: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
}

impl ApplicationRecord {
    /// A record carrying only its code.
    pub fn bare(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }
}

/// An incident correlated with another one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedIncident {
    pub id: String,
    #[serde(default = "unspecified")]
    pub status: String,
    #[serde(default = "unspecified")]
    pub description: String,
}

/// Placeholder for descriptive fields absent from the source data.
pub const UNSPECIFIED: &str = "unspecified";

fn unspecified() -> String {
    UNSPECIFIED.to_string()
}
