//! Streamed assistant turns
//!
//! A turn appends an empty assistant placeholder, folds every streamed chunk
//! into it in arrival order, then records the token estimate and the turn's
//! usage. Any failure leaves the partial text in place and appends a system
//! notice; nothing is retried.

use crate::agent::conversation::{estimate_tokens, Conversation, Message, MessageId};
use crate::agent::usage::{record_turn_error, UsageStat, UsageTracker};
use crate::error::{AcervoError, Result};
use crate::providers::{Content, Provider};
use futures::StreamExt;
use std::time::{Duration, Instant};

/// Result of one streamed turn
#[derive(Debug)]
pub struct TurnOutcome {
    /// The assistant message that received the chunks
    pub message_id: MessageId,
    /// Final (or partial, on failure) response text
    pub text: String,
    /// Token estimate of the final text; 0 on failure
    pub tokens: usize,
    /// Failure that ended the turn early
    pub error: Option<anyhow::Error>,
}

impl TurnOutcome {
    /// Whether the stream ran to completion
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Drives one streamed turn against a provider
pub struct StreamingTurn<'a> {
    provider: &'a dyn Provider,
    model: &'a str,
    request_timeout: Option<Duration>,
}

impl<'a> StreamingTurn<'a> {
    /// Create a turn for `model`
    pub fn new(provider: &'a dyn Provider, model: &'a str) -> Self {
        Self {
            provider,
            model,
            request_timeout: None,
        }
    }

    /// Bound the whole turn (open plus every chunk) by `timeout`
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Run the turn
    ///
    /// `observer` sees every chunk right after it is merged. Failures are
    /// recorded in the conversation and reported in the outcome.
    pub async fn run(
        &self,
        history: Vec<Content>,
        turn: Content,
        conversation: &mut Conversation,
        usage: &mut UsageTracker,
        observer: &mut (dyn FnMut(&str) + Send),
    ) -> TurnOutcome {
        let started = Instant::now();
        let message_id = conversation.append(Message::model("").with_model(self.model));
        let mut text = String::new();

        let consumed = {
            let consume = self.consume(history, turn, conversation, message_id, &mut text, observer);
            match self.request_timeout {
                Some(limit) => match tokio::time::timeout(limit, consume).await {
                    Ok(result) => result,
                    Err(_) => Err(AcervoError::Timeout(limit.as_secs()).into()),
                },
                None => consume.await,
            }
        };

        match consumed {
            Ok(()) => {
                let tokens = estimate_tokens(&text);
                let latency = started.elapsed();
                conversation.set_token_count(message_id, tokens);
                usage.record(UsageStat::now(tokens, latency).with_model(self.model));
                tracing::info!(
                    model = self.model,
                    tokens,
                    latency_ms = latency.as_millis() as u64,
                    "Turn complete"
                );
                TurnOutcome {
                    message_id,
                    text,
                    tokens,
                    error: None,
                }
            }
            Err(error) => {
                tracing::error!(model = self.model, partial_chars = text.len(), "Turn failed: {:#}", error);
                record_turn_error(error_kind(&error));
                conversation.append_system_notice(format!("Processing error: {}", error));
                TurnOutcome {
                    message_id,
                    text,
                    tokens: 0,
                    error: Some(error),
                }
            }
        }
    }

    async fn consume(
        &self,
        history: Vec<Content>,
        turn: Content,
        conversation: &mut Conversation,
        message_id: MessageId,
        text: &mut String,
        observer: &mut (dyn FnMut(&str) + Send),
    ) -> Result<()> {
        let mut chunks = self.provider.stream_chat(self.model, &history, turn).await?;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            text.push_str(&chunk);
            conversation.append_text(message_id, &chunk);
            observer(&chunk);
        }

        Ok(())
    }
}

/// Metric label for a failed turn
fn error_kind(error: &anyhow::Error) -> &'static str {
    match error.downcast_ref::<AcervoError>() {
        Some(AcervoError::Timeout(_)) => "timeout",
        Some(AcervoError::Authentication(_)) | Some(AcervoError::MissingCredentials(_)) => {
            "authentication"
        }
        Some(AcervoError::Transport(_)) | Some(AcervoError::Http(_)) => "transport",
        Some(AcervoError::Provider(_)) => "provider",
        _ => "other",
    }
}
