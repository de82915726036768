//! Description generation service
//!
//! [`TextGenerator`] is the port the dataset stages call; [`ChatClient`]
//! implements it against an OpenAI-compatible `/chat/completions` endpoint
//! with bounded exponential backoff.

use crate::config::LlmConfig;
use crate::error::GenerateError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always made
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after the zero-based `attempt` failed: `base * 2^attempt`
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(6, Duration::from_secs(1))
    }
}

/// Text-generation service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// One completion for a system and user message
    async fn generate(&self, system: &str, user: &str) -> Result<String, GenerateError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat API
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    retry: RetryPolicy,
}

impl ChatClient {
    #[must_use]
    pub fn new(base_url: &str, model: &str, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Build from settings, reading the key from the configured variable.
    ///
    /// # Errors
    /// Returns [`GenerateError::MissingApiKey`] if the variable is unset.
    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerateError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| GenerateError::MissingApiKey(config.api_key_env.clone()))?;
        Ok(Self::new(&config.base_url, &config.model, api_key).with_retry(config.retry_policy()))
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn complete_once(&self, system: &str, user: &str) -> Result<String, GenerateError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(GenerateError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(GenerateError::EmptyResponse)
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    async fn generate(&self, system: &str, user: &str) -> Result<String, GenerateError> {
        with_retry(self.retry, || self.complete_once(system, user)).await
    }
}

/// Run `call` until it succeeds or the policy is exhausted
///
/// # Errors
/// Returns [`GenerateError::Exhausted`] wrapping the last failure.
pub async fn with_retry<F, Fut>(policy: RetryPolicy, mut call: F) -> Result<String, GenerateError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<String, GenerateError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(text) => return Ok(text),
            Err(err) if attempt + 1 >= policy.max_attempts() => {
                return Err(GenerateError::Exhausted {
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }
            Err(err) => {
                let wait = policy.delay(attempt);
                tracing::warn!(attempt = attempt + 1, ?wait, error = %err, "generation failed, retrying");
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}
