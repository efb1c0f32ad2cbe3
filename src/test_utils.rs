//! Test utilities for Acervo
//!
//! This module provides temporary directory management, test file creation,
//! assertion helpers, and a scripted provider for exercising sessions
//! without network access.

use crate::config::Config;
use crate::error::{AcervoError, Result};
use crate::providers::{ChunkStream, Content, ModelInfo, Provider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

/// Create a temporary directory for testing
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a test file with the given content
///
/// # Panics
///
/// Panics if file creation or writing fails
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Assert that an error's message contains `expected`
pub fn assert_error_contains(error: &anyhow::Error, expected: &str) {
    let error_msg = error.to_string();
    assert!(
        error_msg.contains(expected),
        "Error message '{}' does not contain '{}'",
        error_msg,
        expected
    );
}

/// Configuration for tests: defaults without the welcome messages
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.session.greeting = false;
    config
}

/// One scripted streamed turn
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// The stream fails to open
    OpenError(String),
    /// The stream yields `chunks`, then fails with `error` if set
    Chunks {
        /// Chunks delivered in order
        chunks: Vec<String>,
        /// Failure delivered after the chunks
        error: Option<String>,
    },
    /// The stream yields `chunks`, then never ends
    Hang(Vec<String>),
}

impl ScriptedTurn {
    /// A turn that completes with `chunks`
    pub fn chunks(chunks: &[&str]) -> Self {
        Self::Chunks {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            error: None,
        }
    }

    /// A turn that fails with `error` after `chunks`
    pub fn failing_after(chunks: &[&str], error: &str) -> Self {
        Self::Chunks {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            error: Some(error.to_string()),
        }
    }

    /// A turn that stalls after `chunks`
    pub fn hang_after(chunks: &[&str]) -> Self {
        Self::Hang(chunks.iter().map(|c| c.to_string()).collect())
    }
}

enum ScriptedStructured {
    Reply(std::result::Result<String, String>),
    Hang,
}

/// A chat request seen by [`FakeProvider`]
#[derive(Debug, Clone)]
pub struct RecordedChat {
    /// Model requested
    pub model: String,
    /// History sent with the turn
    pub history: Vec<Content>,
    /// The new turn
    pub turn: Content,
}

/// Provider double replaying scripted responses
///
/// Turns and structured replies are consumed in order; running out of
/// script is a provider error.
#[derive(Default)]
pub struct FakeProvider {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    structured: Mutex<VecDeque<ScriptedStructured>>,
    chats: Mutex<Vec<RecordedChat>>,
    prompts: Mutex<Vec<String>>,
    models: Option<Vec<ModelInfo>>,
}

impl FakeProvider {
    /// An empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue streamed turns
    pub fn with_turns(self, turns: Vec<ScriptedTurn>) -> Self {
        self.turns.lock().unwrap().extend(turns);
        self
    }

    /// Queue structured replies (`Err` becomes a provider error)
    pub fn with_structured(self, replies: Vec<std::result::Result<String, String>>) -> Self {
        self.structured
            .lock()
            .unwrap()
            .extend(replies.into_iter().map(ScriptedStructured::Reply));
        self
    }

    /// Queue a structured call that never answers
    pub fn with_structured_hang(self) -> Self {
        self.structured.lock().unwrap().push_back(ScriptedStructured::Hang);
        self
    }

    /// Serve `models` from `list_models`
    pub fn with_models(mut self, models: Vec<ModelInfo>) -> Self {
        self.models = Some(models);
        self
    }

    /// Chat requests received so far
    pub fn chats(&self) -> Vec<RecordedChat> {
        self.chats.lock().unwrap().clone()
    }

    /// Structured prompts received so far
    pub fn structured_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for FakeProvider {
    async fn stream_chat(&self, model: &str, history: &[Content], turn: Content) -> Result<ChunkStream> {
        self.chats.lock().unwrap().push(RecordedChat {
            model: model.to_string(),
            history: history.to_vec(),
            turn,
        });

        let scripted = self.turns.lock().unwrap().pop_front();
        match scripted {
            None => Err(AcervoError::Provider("no scripted turn left".to_string()).into()),
            Some(ScriptedTurn::OpenError(message)) => Err(AcervoError::Provider(message).into()),
            Some(ScriptedTurn::Chunks { chunks, error }) => {
                let mut items: Vec<Result<String>> = chunks.into_iter().map(Ok).collect();
                if let Some(message) = error {
                    items.push(Err(AcervoError::Transport(message).into()));
                }
                let stream: ChunkStream = Box::pin(futures::stream::iter(items));
                Ok(stream)
            }
            Some(ScriptedTurn::Hang(chunks)) => {
                let items: Vec<Result<String>> = chunks.into_iter().map(Ok).collect();
                let stream: ChunkStream = Box::pin(futures::StreamExt::chain(
                    futures::stream::iter(items),
                    futures::stream::pending::<Result<String>>(),
                ));
                Ok(stream)
            }
        }
    }

    async fn generate_structured(
        &self,
        _model: &str,
        prompt: &str,
        _schema: &serde_json::Value,
    ) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let scripted = self.structured.lock().unwrap().pop_front();
        match scripted {
            None => Err(AcervoError::Provider("no scripted reply left".to_string()).into()),
            Some(ScriptedStructured::Reply(Ok(raw))) => Ok(raw),
            Some(ScriptedStructured::Reply(Err(message))) => Err(AcervoError::Provider(message).into()),
            Some(ScriptedStructured::Hang) => Ok(futures::future::pending::<String>().await),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        match &self.models {
            Some(models) => Ok(models.clone()),
            None => Err(AcervoError::Provider("Model listing is not supported by this provider".to_string()).into()),
        }
    }
}
