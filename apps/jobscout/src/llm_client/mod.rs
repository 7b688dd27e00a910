/// LLM Client — the single point of entry for all chat-completion calls in jobscout.
///
/// ARCHITECTURAL RULE: No other module may talk to the model backend directly.
/// Scoring and generation receive an `Arc<dyn ChatBackend>` at construction time;
/// `LlmClient` is the production implementation against an Azure OpenAI resource.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmConfig;

#[cfg(test)]
pub mod fake;
pub mod prompts;

/// Substrings the backend uses when a key is wrong or belongs to another platform.
const AUTH_MARKERS: &[&str] = &[
    "Incorrect API key",
    "invalid_api_key",
    "platform.openai.com",
    "Access denied due to invalid subscription key",
];

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("{}", auth_message(.status, .details))]
    Auth { status: Option<u16>, details: String },

    #[error("LLM returned no choices")]
    NoChoices,
}

fn auth_message(status: &Option<u16>, details: &str) -> String {
    let status = status
        .map(|s| format!(" (status {s})"))
        .unwrap_or_default();
    let hint = if details.contains("platform.openai.com") || details.contains("Incorrect API key") {
        "The key looks like an OpenAI platform key. Azure OpenAI deployments need the \
         resource key from the Azure portal in AZURE_OPENAI_API_KEY."
    } else {
        "Check that AZURE_OPENAI_API_KEY and AZURE_OPENAI_ENDPOINT belong to the same \
         Azure OpenAI resource."
    };
    format!("Authentication to the model backend failed{status}. {hint} Details: {details}")
}

/// Returns true when a failed response means "wrong or missing credentials"
/// rather than a transient or request-shaped failure.
pub fn is_auth_failure(status: u16, message: &str) -> bool {
    status == 401 || status == 403 || AUTH_MARKERS.iter().any(|m| message.contains(m))
}

/// A single chat-completion request: one system message, one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub deployment: String,
    pub system: String,
    pub user: String,
    pub max_completion_tokens: u32,
}

/// The first choice of a chat completion, reduced to what callers need.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCompletion {
    /// `None` when the backend returned `"content": null`.
    pub content: Option<String>,
    pub finish_reason: Option<String>,
}

impl ChatCompletion {
    #[cfg(test)]
    pub fn text(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            finish_reason: Some("stop".to_string()),
        }
    }

    /// True when generation stopped because it hit the output-token budget.
    pub fn was_truncated(&self) -> bool {
        self.finish_reason.as_deref() == Some("length")
    }
}

/// The seam between the pipeline and the model backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionsBody<'a> {
    messages: [ChatMessage<'a>; 2],
    max_completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Azure OpenAI chat-completions client with retry on rate limits and 5xx.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    max_retries: u32,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            max_retries: config.max_retries,
        })
    }

    /// The first try plus `max_retries` retries.
    fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    fn url_for(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, deployment, self.api_version
        )
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    /// Makes a chat-completion call and returns the first choice.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, LlmError> {
        let body = ChatCompletionsBody {
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_completion_tokens: request.max_completion_tokens,
        };
        let url = self.url_for(&request.deployment);

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..self.attempts() {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, ...
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1).min(5)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .header("api-key", &self.api_key)
                .json(&body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                if is_auth_failure(status.as_u16(), &message) {
                    return Err(LlmError::Auth {
                        status: Some(status.as_u16()),
                        details: message,
                    });
                }
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: ChatCompletionsResponse = response.json().await?;

            if let Some(usage) = &parsed.usage {
                debug!(
                    "LLM call succeeded: deployment={}, prompt_tokens={}, completion_tokens={}",
                    request.deployment, usage.prompt_tokens, usage.completion_tokens
                );
            }

            let choice = parsed.choices.into_iter().next().ok_or(LlmError::NoChoices)?;
            return Ok(ChatCompletion {
                content: choice.message.content,
                finish_reason: choice.finish_reason,
            });
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: self.max_retries,
        }))
    }
}
