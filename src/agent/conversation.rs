//! Conversation store for the library assistant
//!
//! Holds the ordered message history of a session. Messages are
//! append-only; the only in-place mutation is the text of the assistant
//! message currently being streamed or built by a catalog run, plus the
//! set-once token count and analysis results.

use crate::agent::analysis::AnalysisResult;
use crate::attachments::{build_content, Attachment, InlineContext};
use crate::providers::{Content, Role};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Unique message identifier
pub type MessageId = Uuid;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageRole {
    /// Typed by the user
    User,
    /// Produced by the model (or by a catalog run on its behalf)
    Model,
    /// Local notice, never sent to the provider
    System,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Model => write!(f, "model"),
            Self::System => write!(f, "system"),
        }
    }
}

/// A single conversation entry
#[derive(Debug, Clone)]
pub struct Message {
    /// Unique identifier
    pub id: MessageId,
    /// Author, fixed at creation
    pub role: MessageRole,
    /// Current text
    pub text: String,
    /// Attachments sent with the message
    pub attachments: Vec<Attachment>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Estimated tokens of the final text (set once a stream completes)
    pub token_count: Option<usize>,
    /// Model that produced the message
    pub model: Option<String>,
    /// Catalog records produced by a batch run (set once on completion)
    pub analysis_results: Option<Vec<AnalysisResult>>,
}

impl Message {
    fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            attachments: Vec::new(),
            timestamp: Utc::now(),
            token_count: None,
            model: None,
            analysis_results: None,
        }
    }

    /// Creates a user message
    ///
    /// # Examples
    ///
    /// ```
    /// use acervo::agent::conversation::{Message, MessageRole};
    ///
    /// let msg = Message::user("Which documents arrived today?");
    /// assert_eq!(msg.role, MessageRole::User);
    /// assert!(msg.token_count.is_none());
    /// ```
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    /// Creates a model message
    pub fn model(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Model, text)
    }

    /// Creates a system notice
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, text)
    }

    /// Attaches files to the message
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Records the originating model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Ordered message history
///
/// Single writer: every mutation takes `&mut self`. Updates addressed to
/// an unknown id are ignored.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Creates an empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message and returns its id
    pub fn append(&mut self, message: Message) -> MessageId {
        let id = message.id;
        tracing::trace!(%id, role = %message.role, "Appending message");
        self.messages.push(message);
        id
    }

    /// Appends a system notice
    pub fn append_system_notice(&mut self, text: impl Into<String>) -> MessageId {
        self.append(Message::system(text))
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        // the message being updated is almost always the last one
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }

    /// Replaces the text of a message
    pub fn update_text(&mut self, id: MessageId, new_text: impl Into<String>) {
        if let Some(message) = self.get_mut(id) {
            message.text = new_text.into();
        }
    }

    /// Appends to the text of a message
    pub fn append_text(&mut self, id: MessageId, suffix: &str) {
        if let Some(message) = self.get_mut(id) {
            message.text.push_str(suffix);
        }
    }

    /// Sets the token count once; later calls are ignored
    pub fn set_token_count(&mut self, id: MessageId, tokens: usize) {
        if let Some(message) = self.get_mut(id) {
            if message.token_count.is_none() {
                message.token_count = Some(tokens);
            }
        }
    }

    /// Attaches catalog records once; later calls are ignored
    pub fn set_analysis_results(&mut self, id: MessageId, results: Vec<AnalysisResult>) {
        if let Some(message) = self.get_mut(id) {
            if message.analysis_results.is_none() {
                message.analysis_results = Some(results);
            }
        }
    }

    /// Removes every message
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Looks up a message
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// All messages, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Most recent message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// History in request form
    ///
    /// System notices are local and never sent. Model messages with no text
    /// (an abandoned placeholder) are skipped as well, since the API rejects
    /// empty turns.
    pub fn history_for_request(&self) -> Vec<Content> {
        self.messages
            .iter()
            .filter_map(|m| {
                let role = match m.role {
                    MessageRole::User => Role::User,
                    MessageRole::Model if m.text.is_empty() => return None,
                    MessageRole::Model => Role::Model,
                    MessageRole::System => return None,
                };
                Some(build_content(
                    role,
                    &m.text,
                    &m.attachments,
                    InlineContext::History,
                ))
            })
            .collect()
    }

    /// Every catalog record in the conversation, in message order
    pub fn analysis_results(&self) -> Vec<AnalysisResult> {
        self.messages
            .iter()
            .filter_map(|m| m.analysis_results.as_ref())
            .flatten()
            .cloned()
            .collect()
    }
}

/// Estimate the token count of a text (`ceil(len / 4)`)
///
/// `len` counts UTF-16 code units, so characters outside the basic
/// multilingual plane count twice.
///
/// # Examples
///
/// ```
/// use acervo::agent::conversation::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 0);
/// assert_eq!(estimate_tokens("abcde"), 2);
/// ```
pub fn estimate_tokens(text: &str) -> usize {
    (text.encode_utf16().count() + 3) / 4
}
