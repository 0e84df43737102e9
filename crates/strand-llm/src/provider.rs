use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::debug;

use strand_types::models::{ChatMessage, Role};

use crate::sse::{EventStream, decode_sse};

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// OpenAI-compatible API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: String,
    pub default_model: String,
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("STRAND_LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            api_key: std::env::var("STRAND_LLM_API_KEY").unwrap_or_default(),
            default_model: std::env::var("STRAND_LLM_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".into()),
        }
    }
}

/// Outgoing chat-completions request. Per-message model tags are local
/// bookkeeping and never sent upstream.
#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

pub struct LlmClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl LlmClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    /// Open a streaming completion. The returned stream ends with
    /// [`crate::StreamEvent::Done`]; dropping it closes the provider
    /// connection, which is how caller-initiated cancellation works.
    pub async fn stream_chat(&self, model: &str, messages: &[ChatMessage]) -> Result<EventStream> {
        let body = CompletionRequest {
            model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: role_name(m.role),
                    content: &m.content,
                })
                .collect(),
            stream: true,
        };

        debug!("Opening completion stream: model={}", model);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("provider request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("provider returned {}: {}", status, detail));
        }

        Ok(decode_sse(response.bytes_stream()))
    }
}
