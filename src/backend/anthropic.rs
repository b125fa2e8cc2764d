//! Anthropic Messages API backend
//!
//! Implements ReplyBackend by making HTTP calls to the Anthropic Messages
//! endpoint. Transient failures (HTTP 429, server errors, connection and
//! timeout errors) are retried with capped exponential backoff; everything
//! else fails immediately.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::{ReplyBackend, ReplyRequest};

/// API version header value required by the Messages endpoint
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for the Anthropic backend
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API base URL
    pub base_url: String,

    /// API key (externally supplied credential)
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries on transient errors
    pub max_retries: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// API types (request/response)
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u64,
    output_tokens: u64,
}

// ─────────────────────────────────────────────────────────────────
// Anthropic Backend
// ─────────────────────────────────────────────────────────────────

/// Anthropic Messages API backend for live persona replies
pub struct AnthropicBackend {
    config: AnthropicConfig,
    client: Client,
    total_requests: RwLock<u64>,
    total_tokens: RwLock<u64>,
}

impl AnthropicBackend {
    /// Create a new Anthropic backend with the given configuration.
    ///
    /// Fails with a backend-unavailable error if the HTTP client itself
    /// cannot be constructed (the capability is unreachable before any call
    /// is made).
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::backend_unavailable("anthropic", e.to_string()))?;

        info!(
            base_url = %config.base_url,
            timeout_secs = config.timeout_secs,
            "Anthropic backend created"
        );

        Ok(Self {
            config,
            client,
            total_requests: RwLock::new(0),
            total_tokens: RwLock::new(0),
        })
    }

    /// Total completed requests in this session
    pub fn total_requests(&self) -> u64 {
        *self.total_requests.read()
    }

    /// Total tokens (input + output) consumed in this session
    pub fn total_tokens(&self) -> u64 {
        *self.total_tokens.read()
    }

    /// Extract the reply text from a parsed response
    fn reply_text(parsed: &MessagesResponse) -> Result<String> {
        parsed
            .content
            .iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text.clone())
            .ok_or_else(|| Error::BackendResponseMalformed {
                message: "No text content block in reply".to_string(),
            })
    }
}

#[async_trait]
impl ReplyBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn is_live(&self) -> bool {
        true
    }

    async fn generate(&self, request: &ReplyRequest) -> Result<String> {
        let body = MessagesRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            system: request.system_prompt.clone(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: request.scenario.clone(),
            }],
        };

        let url = format!("{}/v1/messages", self.config.base_url);
        let mut last_error: Option<Error> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(500 * 2u64.pow(attempt - 1));
                debug!(attempt, ?backoff, persona = %request.persona_name, "Retrying after error");
                tokio::time::sleep(backoff).await;
            }

            let req = self
                .client
                .post(&url)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body);

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: MessagesResponse =
                            response.json().await.map_err(|e| Error::BackendResponseMalformed {
                                message: format!("Failed to parse API response: {}", e),
                            })?;

                        *self.total_requests.write() += 1;
                        if let Some(usage) = parsed.usage.as_ref() {
                            *self.total_tokens.write() += usage.input_tokens + usage.output_tokens;
                        }

                        return Self::reply_text(&parsed);
                    } else if status.as_u16() == 429 || status.is_server_error() {
                        // Retryable error
                        let body_text = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, "Retryable API error: {}", body_text);
                        last_error = Some(Error::backend_call_failed(
                            &request.persona_name,
                            format!("API error {}: {}", status, body_text),
                        ));
                    } else {
                        // Non-retryable error
                        let body_text = response.text().await.unwrap_or_default();
                        return Err(Error::backend_call_failed(
                            &request.persona_name,
                            format!("API error {}: {}", status, body_text),
                        ));
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        warn!(attempt, persona = %request.persona_name, "Request timed out");
                        last_error = Some(Error::BackendTimeout {
                            persona: request.persona_name.clone(),
                            timeout_secs: self.config.timeout_secs,
                        });
                    } else if e.is_connect() {
                        warn!(attempt, error = %e, "Retryable connection error");
                        last_error = Some(Error::backend_call_failed(
                            &request.persona_name,
                            format!("Connection error: {}", e),
                        ));
                    } else {
                        return Err(Error::backend_call_failed(
                            &request.persona_name,
                            format!("Request error: {}", e),
                        ));
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::backend_call_failed(&request.persona_name, "All retry attempts exhausted")
        }))
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
