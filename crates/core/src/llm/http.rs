//! HTTP model transport.
//!
//! Talks to the Anthropic Messages API or an OpenAI-compatible chat
//! completions endpoint, selected by the request's provider. Calls carry a
//! bounded timeout and are retried with exponential backoff on transient
//! failures (timeouts, connect errors, 429/5xx); non-transient errors
//! surface immediately for the fallback layer to handle.

use super::{CompletionRequest, LlmClient};
use crate::models::LlmProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1/messages";
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const BACKOFF_BASE_MS: u64 = 500;

// -- Anthropic request/response types --

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

// -- OpenAI-compatible request/response types --

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

/// Network transport with bounded retry
pub struct HttpClient {
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpClient {
    pub fn new(timeout_secs: u64, max_retries: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            max_retries,
        }
    }

    fn api_key(provider: &LlmProvider) -> anyhow::Result<String> {
        let var = match provider {
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
        };
        std::env::var(var).map_err(|_| anyhow::anyhow!("{} is not set", var))
    }

    async fn call_once(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        let key = Self::api_key(&request.model.provider)?;
        match request.model.provider {
            LlmProvider::Anthropic => {
                let body = AnthropicRequest {
                    model: &request.model.model,
                    max_tokens: DEFAULT_MAX_TOKENS,
                    system: &request.system,
                    messages: vec![Message {
                        role: "user",
                        content: &request.user,
                    }],
                };
                let response = self
                    .client
                    .post(ANTHROPIC_API_BASE)
                    .header("x-api-key", key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&body)
                    .send()
                    .await?;
                let response = check_status(response).await?;
                let parsed: AnthropicResponse = response.json().await?;
                parsed
                    .content
                    .iter()
                    .find(|b| b.block_type == "text")
                    .and_then(|b| b.text.clone())
                    .ok_or_else(|| anyhow::anyhow!("response contained no text block"))
            }
            LlmProvider::OpenAI | LlmProvider::OpenRouter => {
                let base = request.model.base_url.as_deref().unwrap_or(
                    if request.model.provider == LlmProvider::OpenAI {
                        OPENAI_API_BASE
                    } else {
                        OPENROUTER_API_BASE
                    },
                );
                let body = OpenAiRequest {
                    model: &request.model.model,
                    messages: vec![
                        Message {
                            role: "system",
                            content: &request.system,
                        },
                        Message {
                            role: "user",
                            content: &request.user,
                        },
                    ],
                };
                let response = self
                    .client
                    .post(format!("{}/chat/completions", base.trim_end_matches('/')))
                    .bearer_auth(key)
                    .json(&body)
                    .send()
                    .await?;
                let response = check_status(response).await?;
                let parsed: OpenAiResponse = response.json().await?;
                parsed
                    .choices
                    .first()
                    .and_then(|c| c.message.content.clone())
                    .ok_or_else(|| anyhow::anyhow!("response contained no choices"))
            }
        }
    }
}

/// Map non-2xx statuses to errors, marking which are worth retrying
async fn check_status(response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let retryable = status.as_u16() == 429 || status.is_server_error();
    Err(TransportError {
        message: format!("provider returned {}: {}", status, truncate(&body, 300)),
        retryable,
    }
    .into())
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
struct TransportError {
    message: String,
    retryable: bool,
}

fn is_retryable(err: &anyhow::Error) -> bool {
    if let Some(transport) = err.downcast_ref::<TransportError>() {
        return transport.retryable;
    }
    if let Some(req) = err.downcast_ref::<reqwest::Error>() {
        return req.is_timeout() || req.is_connect();
    }
    false
}

#[async_trait]
impl LlmClient for HttpClient {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        let mut attempt = 0;
        loop {
            match self.call_once(request).await {
                Ok(text) => {
                    debug!(agent = %request.agent_id, model = %request.model.model, "model call ok");
                    return Ok(text);
                }
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    let delay = Duration::from_millis(BACKOFF_BASE_MS << attempt);
                    warn!(
                        agent = %request.agent_id,
                        attempt,
                        "model call failed ({}), retrying in {:?}",
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_retryability() {
        let retryable: anyhow::Error = TransportError {
            message: "provider returned 503".into(),
            retryable: true,
        }
        .into();
        assert!(is_retryable(&retryable));

        let auth: anyhow::Error = TransportError {
            message: "provider returned 401".into(),
            retryable: false,
        }
        .into();
        assert!(!is_retryable(&auth));

        assert!(!is_retryable(&anyhow::anyhow!("ANTHROPIC_API_KEY is not set")));
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let delays: Vec<u64> = (0..3).map(|a| BACKOFF_BASE_MS << a).collect();
        assert_eq!(delays, vec![500, 1000, 2000]);
    }
}
