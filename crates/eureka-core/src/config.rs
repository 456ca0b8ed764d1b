use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EurekaError, Result};

/// Top-level configuration for the Eureka incident desk.
///
/// Loaded from `~/.eureka/config.toml` by default. Each section corresponds
/// to one component of the routing core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EurekaConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

impl EurekaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EurekaConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| EurekaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values that would make the routing core misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.session.ttl_minutes == 0 {
            return Err(EurekaError::Config(
                "session.ttl_minutes must be greater than zero".to_string(),
            ));
        }
        if self.session.eviction_interval_requests == 0 {
            return Err(EurekaError::Config(
                "session.eviction_interval_requests must be greater than zero".to_string(),
            ));
        }
        if self.router.incident_prefix.trim().is_empty() {
            return Err(EurekaError::Config(
                "router.incident_prefix must not be empty".to_string(),
            ));
        }
        if self.completion.timeout_secs == 0 {
            return Err(EurekaError::Config(
                "completion.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Session store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is discarded.
    pub ttl_minutes: u32,
    /// Run eviction after every N handled requests.
    pub eviction_interval_requests: u64,
    /// Maximum number of history entries kept per session.
    pub history_limit: usize,
    /// Utterances longer than this are truncated.
    pub max_utterance_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 30,
            eviction_interval_requests: 50,
            history_limit: 40,
            max_utterance_chars: 4000,
        }
    }
}

/// Task router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Prefix of incident identifiers, followed by digits (e.g. `INC2309845`).
    pub incident_prefix: String,
    /// Phrases that end a conversation, matched case-insensitively on word boundaries.
    pub exit_phrases: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            incident_prefix: "INC".to_string(),
            exit_phrases: [
                "end",
                "stop",
                "quit",
                "thanks",
                "thank you",
                "done",
                "goodbye",
                "bye",
                "merci",
                "fin",
                "au revoir",
                "terminé",
                "quitter",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Text-completion service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on a single completion call.
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.1,
            timeout_secs: 30,
        }
    }
}

/// Knowledge tables configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// JSON file holding the incident, application and related-incident tables.
    /// When unset the tables are empty.
    pub data_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = EurekaConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.session.ttl_minutes, 30);
        assert_eq!(config.session.eviction_interval_requests, 50);
        assert_eq!(config.router.incident_prefix, "INC");
        assert!(config.router.exit_phrases.contains(&"merci".to_string()));
        assert_eq!(config.completion.model, "gpt-4o-mini");
        assert!(config.knowledge.data_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[session]
ttl_minutes = 5
eviction_interval_requests = 10

[router]
incident_prefix = "CHG"
exit_phrases = ["ciao"]

[knowledge]
data_path = "/srv/eureka/knowledge.json"
"#;
        let file = create_temp_config(content);
        let config = EurekaConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.session.ttl_minutes, 5);
        assert_eq!(config.session.eviction_interval_requests, 10);
        // Unspecified fields keep their defaults.
        assert_eq!(config.session.history_limit, 40);
        assert_eq!(config.router.incident_prefix, "CHG");
        assert_eq!(config.router.exit_phrases, vec!["ciao".to_string()]);
        assert_eq!(config.completion.timeout_secs, 30);
        assert_eq!(
            config.knowledge.data_path.as_deref(),
            Some("/srv/eureka/knowledge.json")
        );
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        let file = create_temp_config("");
        let config = EurekaConfig::load(file.path()).unwrap();
        assert_eq!(config.session.ttl_minutes, 30);
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let file = create_temp_config("[session\nttl_minutes = ");
        let result = EurekaConfig::load(file.path());
        assert!(matches!(result, Err(EurekaError::Config(_))));
    }

    #[test]
    fn test_load_rejects_zero_ttl() {
        let file = create_temp_config("[session]\nttl_minutes = 0\n");
        let result = EurekaConfig::load(file.path());
        assert!(matches!(result, Err(EurekaError::Config(_))));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = EurekaConfig::load(Path::new("/nonexistent/eureka/config.toml"));
        assert!(matches!(result, Err(EurekaError::Io(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = EurekaConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.router.incident_prefix, "INC");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = EurekaConfig::default();
        config.session.ttl_minutes = 12;
        config.router.exit_phrases = vec!["basta".to_string()];
        config.save(&path).unwrap();

        let reloaded = EurekaConfig::load(&path).unwrap();
        assert_eq!(reloaded.session.ttl_minutes, 12);
        assert_eq!(reloaded.router.exit_phrases, vec!["basta".to_string()]);
    }

    #[test]
    fn test_validate_empty_prefix() {
        let mut config = EurekaConfig::default();
        config.router.incident_prefix = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = EurekaConfig::default();
        config.completion.timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
