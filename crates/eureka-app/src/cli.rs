//! CLI argument definitions for the Eureka application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Eureka: an incident desk assistant that routes questions and analyses incidents.
#[derive(Parser, Debug)]
#[command(name = "eureka", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// JSON file holding the knowledge tables.
    #[arg(short = 'k', long = "knowledge")]
    pub knowledge: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Resume an existing session token instead of generating one.
    #[arg(short = 's', long = "session")]
    pub session: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > EUREKA_CONFIG env var > ~/.eureka/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("EUREKA_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the knowledge file.
    ///
    /// Priority: --knowledge flag > config file value. `None` means empty tables.
    pub fn resolve_knowledge_path(&self, config_path: Option<&str>) -> Option<PathBuf> {
        self.knowledge
            .clone()
            .or_else(|| config_path.map(PathBuf::from))
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".eureka").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".eureka").join("config.toml");
    }
    PathBuf::from("config.toml")
}
