//! Base provider trait and common wire types for Acervo
//!
//! This module defines the Provider trait implemented by the generative
//! language backend, the request content types shared by the conversation
//! store and the provider, and metadata types for model discovery.

use crate::error::Result;
use async_trait::async_trait;
use base64::Engine as _;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Stream of partial text chunks produced by a streamed turn
///
/// Chunks arrive in order; an `Err` item terminates the turn.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Role of a content block sent to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Content authored by the user
    User,
    /// Content authored by the model
    Model,
}

/// Binary payload sent inline with a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// Media type of the payload (e.g. `image/png`)
    pub mime_type: String,
    /// Base64-encoded payload
    pub data: String,
}

/// One part of a content block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    /// Plain text
    Text(String),
    /// Inline binary data
    InlineData(InlineData),
}

impl Part {
    /// Creates a text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Creates an inline data part, base64-encoding `bytes`
    ///
    /// # Examples
    ///
    /// ```
    /// use acervo::providers::Part;
    ///
    /// let part = Part::inline_data("image/png", b"abc");
    /// let json = serde_json::to_value(&part).unwrap();
    /// assert_eq!(json["inlineData"]["mimeType"], "image/png");
    /// assert_eq!(json["inlineData"]["data"], "YWJj");
    /// ```
    pub fn inline_data(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::InlineData(InlineData {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }
}

/// A content block: one role and its ordered parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Author of the block
    pub role: Role,
    /// Ordered parts (text first, then inline data)
    pub parts: Vec<Part>,
}

impl Content {
    /// Creates a user content block with a single text part
    ///
    /// # Examples
    ///
    /// ```
    /// use acervo::providers::{Content, Role};
    ///
    /// let content = Content::user("Hello");
    /// assert_eq!(content.role, Role::User);
    /// assert_eq!(content.text(), "Hello");
    /// ```
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    /// Creates a model content block with a single text part
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }

    /// Adds a part to the block
    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Concatenated text of every text part
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::InlineData(_) => None,
            })
            .collect()
    }
}

/// Model capability feature flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelCapability {
    /// Model supports single-shot generation
    Generate,
    /// Model supports streaming responses
    Streaming,
    /// Model supports context caching
    Caching,
    /// Model supports JSON schema constrained output
    JsonMode,
}

impl std::fmt::Display for ModelCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generate => write!(f, "Generate"),
            Self::Streaming => write!(f, "Streaming"),
            Self::Caching => write!(f, "Caching"),
            Self::JsonMode => write!(f, "JsonMode"),
        }
    }
}

/// Model information and metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Unique identifier for the model (e.g., "gemini-2.5-flash-lite")
    pub name: String,
    /// Display name for user-friendly presentation
    pub display_name: String,
    /// Short description
    pub description: String,
    /// Supported capabilities
    pub capabilities: Vec<ModelCapability>,
}

impl ModelInfo {
    /// Create a new ModelInfo instance
    ///
    /// # Examples
    ///
    /// ```
    /// use acervo::providers::ModelInfo;
    ///
    /// let model = ModelInfo::new("gemini-3-pro-preview", "Gemini 3 Pro Preview");
    /// assert_eq!(model.name, "gemini-3-pro-preview");
    /// assert!(model.capabilities.is_empty());
    /// ```
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            description: String::new(),
            capabilities: Vec::new(),
        }
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a capability to this model (duplicates are ignored)
    pub fn add_capability(&mut self, capability: ModelCapability) {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
    }

    /// Check if this model supports a capability
    pub fn supports_capability(&self, capability: ModelCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Builder-style capability list
    pub fn with_capabilities(mut self, capabilities: Vec<ModelCapability>) -> Self {
        for capability in capabilities {
            self.add_capability(capability);
        }
        self
    }
}

/// Generative language provider
///
/// # Examples
///
/// ```no_run
/// use acervo::providers::{ChunkStream, Content, Provider};
/// use acervo::error::Result;
/// use async_trait::async_trait;
///
/// struct EchoProvider;
///
/// #[async_trait]
/// impl Provider for EchoProvider {
///     async fn stream_chat(
///         &self,
///         _model: &str,
///         _history: &[Content],
///         turn: Content,
///     ) -> Result<ChunkStream> {
///         let text = turn.text();
///         Ok(Box::pin(futures::stream::iter(vec![Ok(text)])))
///     }
///
///     async fn generate_structured(
///         &self,
///         _model: &str,
///         _prompt: &str,
///         _schema: &serde_json::Value,
///     ) -> Result<String> {
///         Ok("{}".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Opens a streamed turn
    ///
    /// # Arguments
    ///
    /// * `model` - Model identifier
    /// * `history` - Prior conversation, oldest first
    /// * `turn` - The new user content
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be opened. Errors after the
    /// stream is open are delivered as `Err` items.
    async fn stream_chat(&self, model: &str, history: &[Content], turn: Content)
        -> Result<ChunkStream>;

    /// Runs a single-shot completion constrained to a JSON schema
    ///
    /// Returns the raw response text; validation is the caller's job.
    async fn generate_structured(
        &self,
        model: &str,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<String>;

    /// List available models for this provider
    ///
    /// # Default Implementation
    ///
    /// Returns an error indicating that model listing is not supported.
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Err(crate::error::AcervoError::Provider(
            "Model listing is not supported by this provider".to_string(),
        )
        .into())
    }
}
