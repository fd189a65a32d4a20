//! Chat model backends for the binary.
//!
//! [`HttpChatModel`] talks to any OpenAI-compatible `/chat/completions`
//! endpoint. [`EchoModel`] answers locally so the loop can be exercised
//! without a network or an API key.

use std::time::Duration;

use async_trait::async_trait;
use parley_agent::reflection::REFLECTION_INSTRUCTION;
use parley_agent::{ChatModel, ProviderError};
use parley_core::messages::ChatMessage;
use parley_settings::LlmSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable holding the bearer token.
pub const API_KEY_ENV: &str = "HF_TOKEN";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client.
pub struct HttpChatModel {
    client: reqwest::Client,
    model: String,
    url: String,
    api_key: String,
}

impl HttpChatModel {
    /// Client for `llm.model` at `llm.base_url`.
    pub fn new(llm: &LlmSettings, api_key: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .user_agent("parley/0.1")
                .build()
                .unwrap_or_default(),
            model: llm.model.clone(),
            url: completions_url(&llm.base_url),
            api_key,
        }
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn first_reply(body: &str) -> Result<String, ProviderError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Request(format!("malformed response: {e}")))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(ProviderError::EmptyResponse)
}

#[async_trait]
impl ChatModel for HttpChatModel {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        debug!(model = %self.model, message_count = messages.len(), "sending chat completion");
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages,
            })
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(format!("reading response: {e}")))?;
        if !status.is_success() {
            return Err(ProviderError::Request(format!("HTTP {}: {body}", status.as_u16())));
        }
        first_reply(&body)
    }
}

/// Offline model: repeats the user and counts lines for summaries.
#[derive(Debug, Default)]
pub struct EchoModel;

#[async_trait]
impl ChatModel for EchoModel {
    fn model(&self) -> &str {
        "offline-echo"
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let last = messages
            .iter()
            .rev()
            .find(|m| m.is_user())
            .ok_or(ProviderError::EmptyResponse)?;

        if let Some(transcript) = last.content.strip_prefix(REFLECTION_INSTRUCTION) {
            let lines = transcript.lines().filter(|l| !l.trim().is_empty()).count();
            return Ok(format!("(offline) {lines} messages exchanged so far."));
        }
        Ok(format!("(offline) You said: {}", last.content))
    }
}
