//! Eureka application binary - composition root.
//!
//! 1. Load configuration from TOML
//! 2. Load the knowledge tables
//! 3. Build the session store, completion adapter and orchestrator
//! 4. Run an interactive terminal conversation

mod cli;
mod completion;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use eureka_chat::ChatOrchestrator;
use eureka_core::config::EurekaConfig;
use eureka_core::types::{ActiveTask, SessionToken, TurnMetadata};
use eureka_knowledge::InMemoryKnowledge;
use eureka_session::InMemorySessionStore;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::cli::CliArgs;
use crate::completion::OpenAiCompletion;

/// Load the knowledge tables, falling back to empty tables on any error.
fn load_knowledge(path: Option<&Path>) -> InMemoryKnowledge {
    let Some(path) = path else {
        tracing::warn!("No knowledge file configured, incident enrichment will find nothing");
        return InMemoryKnowledge::new();
    };
    match InMemoryKnowledge::from_json_file(path) {
        Ok(kb) => kb,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Knowledge file unusable, using empty tables");
            InMemoryKnowledge::new()
        }
    }
}

/// Badge shown in front of every reply.
fn badge(metadata: &TurnMetadata) -> String {
    match metadata.active_task {
        ActiveTask::None => "[generic]".to_string(),
        ActiveTask::IncidentAnalysis => format!(
            "[incident_analysis · {}]",
            metadata.incident_id.as_deref().unwrap_or("?")
        ),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let config = if config_file.exists() {
        EurekaConfig::load(&config_file)?
    } else {
        EurekaConfig::load_or_default(&config_file)
    };

    // Tracing.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting Eureka v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Collaborators.
    let knowledge_path = args.resolve_knowledge_path(config.knowledge.data_path.as_deref());
    let knowledge = Arc::new(load_knowledge(knowledge_path.as_deref()));
    let store = Arc::new(InMemorySessionStore::with_ttl_minutes(
        config.session.ttl_minutes,
    ));
    let completion = Arc::new(OpenAiCompletion::from_config(&config.completion));

    let orchestrator = ChatOrchestrator::new(&config, store, knowledge, completion)?;

    let mut token = args
        .session
        .map(SessionToken::new)
        .unwrap_or_else(SessionToken::generate);
    tracing::info!(token = %token, "Session ready");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Eureka ready. Type /new for a new session, /quit to leave.\n> ")
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" => break,
            "/new" => {
                token = SessionToken::generate();
                tracing::info!(token = %token, "New session");
                stdout.write_all(b"New session started.\n> ").await?;
                stdout.flush().await?;
                continue;
            }
            _ => {}
        }

        let response = orchestrator.handle_turn(&token, &line).await?;
        token = response.session_token;
        let out = format!("{} {}\n> ", badge(&response.metadata), response.text);
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
    }

    let removed = orchestrator.evict_now().await?;
    tracing::info!(removed, "Eureka stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eureka_core::types::TaskKind;

    #[test]
    fn test_badge_rendering() {
        let mut meta = TurnMetadata {
            active_task: ActiveTask::None,
            incident_id: None,
            turn_count: 0,
            handled_by: TaskKind::Generic,
        };
        assert_eq!(badge(&meta), "[generic]");

        meta.active_task = ActiveTask::IncidentAnalysis;
        meta.incident_id = Some("INC2309845".to_string());
        assert_eq!(badge(&meta), "[incident_analysis · INC2309845]");
    }

    #[tokio::test]
    async fn test_missing_knowledge_file_yields_empty_tables() {
        use eureka_knowledge::KnowledgeLookup;

        for kb in [
            load_knowledge(Some(Path::new("/nonexistent/knowledge.json"))),
            load_knowledge(None),
        ] {
            assert!(kb.applications_for_incident("INC1").await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_sample_knowledge_file_loads() {
        use eureka_knowledge::KnowledgeLookup;

        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/knowledge.sample.json");
        let kb = load_knowledge(Some(&path));
        assert!(!kb.applications_for_incident("INC2309845").await.unwrap().is_empty());
    }
}
