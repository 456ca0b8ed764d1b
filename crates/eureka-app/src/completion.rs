//! OpenAI-compatible completion adapter.

use async_trait::async_trait;
use eureka_chat::{CompletionError, CompletionRequest, CompletionService};
use eureka_core::config::CompletionConfig;
use eureka_core::types::Speaker;
use serde::{Deserialize, Serialize};

/// Calls `{base_url}/chat/completions`.
///
/// The API key is read from the configured environment variable once, at
/// construction. Without a key every call fails and the core falls back to
/// its apology path.
#[derive(Clone)]
pub struct OpenAiCompletion {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

impl OpenAiCompletion {
    pub fn from_config(config: &CompletionConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "No API key set, completion calls will fail"
            );
        }
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        }
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> ChatBody<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: &request.instruction,
        });
        messages.extend(request.messages.iter().map(|m| ChatMessage {
            role: match m.speaker {
                Speaker::User => "user",
                Speaker::Assistant => "assistant",
            },
            content: &m.text,
        }));
        ChatBody {
            model: &self.model,
            messages,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CompletionError::Failed("API key not configured".to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| CompletionError::Failed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Failed(format!(
                "API error {}: {}",
                status, body
            )));
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Failed(format!("invalid response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }
}
