//! Model interaction: a small chat seam plus its edgequake-llm implementation.
//!
//! The orchestrator only needs "send these turns, get text back", so it talks
//! to [`SummaryModel`]. [`ProviderModel`] adapts any
//! [`edgequake_llm::LLMProvider`] to it and owns retries and timeouts; tests
//! swap in a scripted fake.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) with a 500 ms base and 3 retries waits
//! 500 ms → 1 s → 2 s before giving up.

use crate::config::DigestConfig;
use crate::error::ModelError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Who said a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// A non-blank model answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Anything that can answer a chat conversation.
///
/// Implementations must return [`ModelError::EmptyResponse`] instead of a
/// blank reply.
#[async_trait]
pub trait SummaryModel: Send + Sync {
    async fn complete(&self, turns: &[Turn]) -> Result<ModelReply, ModelError>;

    /// Label used in logs.
    fn name(&self) -> &str {
        "model"
    }
}

/// [`SummaryModel`] over an edgequake-llm provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &DigestConfig) -> Self {
        let label = config
            .model
            .clone()
            .or_else(|| config.provider_name.clone())
            .unwrap_or_else(|| "llm".to_string());
        Self {
            provider,
            label,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    async fn attempt(&self, messages: &[ChatMessage]) -> Result<ModelReply, String> {
        let call = self.provider.chat(messages, Some(&self.options));
        match timeout(Duration::from_secs(self.api_timeout_secs), call).await {
            Ok(Ok(response)) => Ok(ModelReply {
                text: response.content,
                input_tokens: response.prompt_tokens,
                output_tokens: response.completion_tokens,
            }),
            Ok(Err(e)) => Err(format!("{}", e)),
            Err(_) => Err(format!("timed out after {}s", self.api_timeout_secs)),
        }
    }
}

#[async_trait]
impl SummaryModel for ProviderModel {
    async fn complete(&self, turns: &[Turn]) -> Result<ModelReply, ModelError> {
        let start = Instant::now();
        let messages = to_messages(turns);
        let mut last_err: Option<String> = None;
        let mut timed_out = false;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    self.label,
                    attempt,
                    self.max_retries,
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.attempt(&messages).await {
                Ok(reply) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        self.label,
                        reply.input_tokens,
                        reply.output_tokens,
                        start.elapsed()
                    );
                    if reply.text.trim().is_empty() {
                        return Err(ModelError::EmptyResponse);
                    }
                    return Ok(reply);
                }
                Err(err_msg) => {
                    warn!(
                        "{}: attempt {} failed: {}",
                        self.label,
                        attempt + 1,
                        err_msg
                    );
                    timed_out = err_msg.starts_with("timed out");
                    last_err = Some(err_msg);
                }
            }
        }

        if timed_out {
            return Err(ModelError::Timeout {
                secs: self.api_timeout_secs,
            });
        }
        Err(ModelError::Api {
            retries: self.max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, saturating.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

fn to_messages(turns: &[Turn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .map(|t| match t.role {
            Role::System => ChatMessage::system(t.text.as_str()),
            Role::User => ChatMessage::user(t.text.as_str()),
            Role::Assistant => ChatMessage::assistant(t.text.as_str()),
        })
        .collect()
}

/// Build `CompletionOptions` from the digest config.
fn build_options(config: &DigestConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
