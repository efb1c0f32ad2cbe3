//! Session core for the library assistant
//!
//! A [`Session`] owns everything a user interacts with: the conversation,
//! the usage window, the pending attachments, the selected model, the
//! active view and the generation state machine. It runs streamed chat
//! turns and catalog runs, one at a time.

use crate::agent::analysis::{AnalysisResult, BatchAnalyzer, BatchOutcome};
use crate::agent::conversation::{Conversation, Message};
use crate::agent::state::{BatchProgress, GenerationPhase, GenerationState};
use crate::agent::streaming::{StreamingTurn, TurnOutcome};
use crate::agent::usage::UsageTracker;
use crate::attachments::{build_content, default_documents, find_document, Attachment, InlineContext, MockDocument};
use crate::config::{Config, SessionConfig};
use crate::error::{AcervoError, Result};
use crate::providers::{Provider, Role};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Screen the user is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    /// The conversation
    #[default]
    Chat,
    /// The catalog report
    Catalog,
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Catalog => write!(f, "catalog"),
        }
    }
}

/// An interactive assistant session
///
/// # Examples
///
/// ```no_run
/// use acervo::agent::Session;
/// use acervo::config::Config;
/// use acervo::providers::GeminiProvider;
///
/// # async fn example() -> acervo::error::Result<()> {
/// let config = Config::default();
/// let provider = GeminiProvider::new(config.provider.gemini.clone())?;
/// let mut session = Session::new(provider, &config).with_greeting();
///
/// let outcome = session
///     .send_message("Which documents were downloaded?", &mut |chunk| print!("{}", chunk))
///     .await?;
/// println!("\n({} tokens)", outcome.tokens);
/// # Ok(())
/// # }
/// ```
pub struct Session {
    provider: Arc<dyn Provider>,
    config: SessionConfig,
    model: String,
    conversation: Conversation,
    usage: UsageTracker,
    state: GenerationState,
    pending: Vec<Attachment>,
    documents: Vec<MockDocument>,
    view: View,
}

impl Session {
    /// Creates a session over `provider`
    pub fn new(provider: impl Provider + 'static, config: &Config) -> Self {
        Self::new_shared(Arc::new(provider), config)
    }

    /// Creates a session over a boxed provider
    ///
    /// Useful when the provider type is chosen at runtime.
    pub fn new_boxed(provider: Box<dyn Provider>, config: &Config) -> Self {
        Self::new_shared(Arc::from(provider), config)
    }

    /// Creates a session over a shared provider
    pub fn new_shared(provider: Arc<dyn Provider>, config: &Config) -> Self {
        Self {
            provider,
            config: config.session.clone(),
            model: config.provider.gemini.model.clone(),
            conversation: Conversation::new(),
            usage: UsageTracker::new(config.session.usage_window),
            state: GenerationState::new(),
            pending: Vec::new(),
            documents: default_documents(),
            view: View::Chat,
        }
    }

    /// Replaces the downloaded documents
    pub fn with_documents(mut self, documents: Vec<MockDocument>) -> Self {
        self.documents = documents;
        self
    }

    /// Seeds the welcome notices and greeting, when enabled in config
    pub fn with_greeting(mut self) -> Self {
        if !self.config.greeting {
            return self;
        }

        self.conversation.append_system_notice(format!(
            "Library cataloguing system started. Model: {}",
            self.model
        ));
        self.conversation.append_system_notice(format!(
            "Folder {} synced. {} new PDFs detected.",
            self.config.downloads_folder,
            self.documents.len()
        ));
        self.conversation.append(
            Message::model(
                "Hello! I am the library assistant. I can catalog the downloaded \
                 documents or answer questions about the collection. Use /catalog \
                 to process every document, or attach a file to ask about it.",
            )
            .with_model(self.model.clone()),
        );
        self
    }

    /// Queues an attachment for the next message
    pub fn attach(&mut self, attachment: Attachment) {
        debug!(attachment = %attachment.describe(), "Attachment queued");
        self.pending.push(attachment);
    }

    /// Reads a file and queues it for the next message
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn attach_file(&mut self, path: impl AsRef<Path>) -> Result<&Attachment> {
        let attachment = Attachment::from_path(path).await?;
        self.attach(attachment);
        self.last_pending()
    }

    /// Queues one of the downloaded documents by name
    ///
    /// # Errors
    ///
    /// Returns `UnknownDocument` if no document has that name
    pub fn attach_mock(&mut self, name: &str) -> Result<&Attachment> {
        let attachment = Attachment::mock(find_document(&self.documents, name)?);
        self.attach(attachment);
        self.last_pending()
    }

    fn last_pending(&self) -> Result<&Attachment> {
        self.pending
            .last()
            .ok_or_else(|| AcervoError::Attachment("no pending attachment".to_string()).into())
    }

    /// Attachments waiting for the next message
    pub fn pending_attachments(&self) -> &[Attachment] {
        &self.pending
    }

    /// Drops every pending attachment
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.config.request_timeout_seconds.map(Duration::from_secs)
    }

    /// Sends a user message and streams the answer
    ///
    /// The pending attachments travel with the message. `observer` sees
    /// every chunk as it is merged. A failed stream is not an `Err`: it is
    /// recorded as a system notice and reported in the outcome.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPrompt` when there is neither text nor an attachment,
    /// and `Busy` while another turn or catalog run is active.
    pub async fn send_message(
        &mut self,
        text: &str,
        observer: &mut (dyn FnMut(&str) + Send),
    ) -> Result<TurnOutcome> {
        if text.trim().is_empty() && self.pending.is_empty() {
            return Err(AcervoError::EmptyPrompt.into());
        }
        let _guard = self.state.begin(GenerationPhase::Streaming)?;
        self.view = View::Chat;

        let history = self.conversation.history_for_request();
        let attachments = std::mem::take(&mut self.pending);
        let turn = build_content(Role::User, text, &attachments, InlineContext::Turn);
        self.conversation
            .append(Message::user(text).with_attachments(attachments));

        info!(
            model = %self.model,
            history = history.len(),
            "Sending message"
        );

        let outcome = StreamingTurn::new(self.provider.as_ref(), &self.model)
            .with_request_timeout(self.request_timeout())
            .run(
                history,
                turn,
                &mut self.conversation,
                &mut self.usage,
                observer,
            )
            .await;

        Ok(outcome)
    }

    /// Catalogs every downloaded document
    ///
    /// `progress` is called before each document; the same progress is
    /// visible through [`Session::progress`] and [`Session::state_handle`]
    /// while the run is active.
    ///
    /// # Errors
    ///
    /// Returns `Busy` while another turn or catalog run is active. A failed
    /// run is reported as [`BatchOutcome::Aborted`].
    pub async fn analyze_all(
        &mut self,
        progress: &mut (dyn FnMut(BatchProgress) + Send),
    ) -> Result<BatchOutcome> {
        let guard = self.state.begin(GenerationPhase::BatchRunning)?;
        self.view = View::Chat;

        let mut report = |p: BatchProgress| {
            guard.report(p);
            progress(p);
        };

        let outcome = BatchAnalyzer::new(self.provider.as_ref(), &self.model)
            .with_request_timeout(self.request_timeout())
            .run(&self.documents, &mut self.conversation, &mut report)
            .await;

        Ok(outcome)
    }

    /// Empties the conversation and returns to the chat view
    pub fn clear_history(&mut self) {
        self.conversation.clear();
        self.view = View::Chat;
        info!("Conversation cleared");
    }

    /// Selects the model for later turns
    ///
    /// # Errors
    ///
    /// Returns `Config` error for an empty model id
    pub fn set_model(&mut self, model: &str) -> Result<()> {
        let model = model.trim();
        if model.is_empty() {
            return Err(AcervoError::Config("Model id cannot be empty".to_string()).into());
        }
        info!(from = %self.model, to = %model, "Model changed");
        self.model = model.to_string();
        Ok(())
    }

    /// Selected model
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The provider serving this session
    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    /// Active view
    pub fn view(&self) -> View {
        self.view
    }

    /// Switches view
    pub fn set_view(&mut self, view: View) {
        self.view = view;
    }

    /// The conversation
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// The usage window
    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Every catalog record in the conversation
    pub fn catalog_report(&self) -> Vec<AnalysisResult> {
        self.conversation.analysis_results()
    }

    /// Downloaded documents available for cataloguing
    pub fn documents(&self) -> &[MockDocument] {
        &self.documents
    }

    /// Whether a turn or catalog run is active
    pub fn is_generating(&self) -> bool {
        self.state.is_generating()
    }

    /// Current generation phase
    pub fn state(&self) -> GenerationPhase {
        self.state.current()
    }

    /// Shared handle to the generation state, for observers
    pub fn state_handle(&self) -> GenerationState {
        self.state.clone()
    }

    /// Progress of the running catalog run, if any
    pub fn progress(&self) -> Option<BatchProgress> {
        self.state.progress()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::conversation::MessageRole;
    use crate::providers::Part;
    use crate::test_utils::{assert_error_contains, test_config, FakeProvider, ScriptedTurn};
    use serde_json::json;

    fn record(tipo: &str) -> std::result::Result<String, String> {
        Ok(json!({"tipo": tipo, "resumo": "s", "data": "01/01/2024", "referencia": "r"}).to_string())
    }

    fn session_with(provider: &Arc<FakeProvider>) -> Session {
        Session::new_shared(provider.clone(), &test_config())
    }

    #[test]
    fn test_greeting_seeds_three_messages() {
        let mut config = test_config();
        config.session.greeting = true;
        let session = Session::new(FakeProvider::new(), &config).with_greeting();

        let roles: Vec<MessageRole> = session.conversation().messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![MessageRole::System, MessageRole::System, MessageRole::Model]);
        assert!(session.conversation().messages()[1].text.contains("3 new PDFs"));
    }

    #[test]
    fn test_greeting_disabled() {
        let session = Session::new(FakeProvider::new(), &test_config()).with_greeting();
        assert!(session.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let mut session = Session::new(FakeProvider::new(), &test_config());
        let err = session.send_message("   ", &mut |_| {}).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<AcervoError>(), Some(AcervoError::EmptyPrompt)));
        assert!(session.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_streams_reply_and_records_usage() {
        let provider = Arc::new(FakeProvider::new().with_turns(vec![ScriptedTurn::chunks(&["Three ", "PDFs."])]));
        let mut session = session_with(&provider);
        session.set_view(View::Catalog);

        let outcome = session.send_message("How many files?", &mut |_| {}).await.unwrap();

        assert_eq!(outcome.text, "Three PDFs.");
        assert_eq!(session.view(), View::Chat);
        assert_eq!(session.state(), GenerationPhase::Idle);
        assert_eq!(session.usage().len(), 1);

        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].text, "Three PDFs.");
    }

    #[tokio::test]
    async fn test_history_excludes_current_message_and_system_notices() {
        let provider = Arc::new(FakeProvider::new().with_turns(vec![
            ScriptedTurn::chunks(&["first answer"]),
            ScriptedTurn::chunks(&["second answer"]),
        ]));
        let mut config = test_config();
        config.session.greeting = true;
        let mut session = Session::new_shared(provider.clone(), &config).with_greeting();

        session.send_message("one", &mut |_| {}).await.unwrap();
        session.send_message("two", &mut |_| {}).await.unwrap();

        let chats = provider.chats();
        assert_eq!(chats.len(), 2);
        // greeting only
        assert_eq!(chats[0].history.len(), 1);
        assert_eq!(chats[0].history[0].role, Role::Model);
        // greeting, "one", "first answer"
        assert_eq!(chats[1].history.len(), 3);
        assert_eq!(chats[1].history[1].text(), "one");
        assert_eq!(chats[1].history[2].text(), "first answer");
        assert_eq!(chats[1].turn.text(), "two");
    }

    #[tokio::test]
    async fn test_attachments_travel_with_next_message_only() {
        let provider = Arc::new(FakeProvider::new().with_turns(vec![
            ScriptedTurn::chunks(&["ok"]),
            ScriptedTurn::chunks(&["ok again"]),
        ]));
        let mut session = session_with(&provider);
        session.attach_mock("starwars.pdf").unwrap();
        session.attach(Attachment::Real {
            mime_type: "image/png".into(),
            data: b"png".to_vec(),
            name: Some("cover.png".into()),
        });
        assert_eq!(session.pending_attachments().len(), 2);

        session.send_message("What is this?", &mut |_| {}).await.unwrap();
        assert!(session.pending_attachments().is_empty());
        session.send_message("And now?", &mut |_| {}).await.unwrap();

        let chats = provider.chats();
        let turn = &chats[0].turn;
        assert!(turn.text().starts_with("What is this?\n\n[Attached file: starwars.pdf]:\n"));
        assert_eq!(turn.parts[1], Part::inline_data("image/png", b"png"));

        let prior = &chats[1].history[0];
        assert!(prior.text().contains("[Contents of file starwars.pdf]"));
        assert_eq!(chats[1].turn.parts.len(), 1);
    }

    #[tokio::test]
    async fn test_attachment_only_message_is_accepted() {
        let provider = Arc::new(FakeProvider::new().with_turns(vec![ScriptedTurn::chunks(&["seen"])]));
        let mut session = session_with(&provider);
        session.attach_mock("artigo.pdf").unwrap();
        assert!(session.send_message("", &mut |_| {}).await.is_ok());
    }

    #[test]
    fn test_attach_unknown_mock() {
        let mut session = Session::new(FakeProvider::new(), &test_config());
        let err = session.attach_mock("missing.pdf").unwrap_err();
        assert_error_contains(&err, "Unknown document");
        assert!(session.pending_attachments().is_empty());
    }

    #[tokio::test]
    async fn test_attach_file_reads_from_disk() {
        let dir = crate::test_utils::temp_dir();
        let path = crate::test_utils::create_test_file(&dir, "notes.txt", "shelf 4");
        let mut session = Session::new(FakeProvider::new(), &test_config());

        let attachment = session.attach_file(&path).await.unwrap();
        assert_eq!(attachment.name(), Some("notes.txt"));
        session.clear_pending();
        assert!(session.pending_attachments().is_empty());
    }

    #[tokio::test]
    async fn test_failed_turn_returns_to_idle_with_notice() {
        let provider = Arc::new(FakeProvider::new().with_turns(vec![ScriptedTurn::failing_after(
            &["Hel", "lo"],
            "socket closed",
        )]));
        let mut session = session_with(&provider);

        let outcome = session.send_message("hi", &mut |_| {}).await.unwrap();

        assert!(!outcome.is_ok());
        assert!(!session.is_generating());
        let last = session.conversation().last().unwrap();
        assert_eq!(last.role, MessageRole::System);
        assert!(last.text.contains("socket closed"));
        assert_eq!(session.conversation().messages()[1].text, "Hello");
    }

    #[tokio::test]
    async fn test_busy_session_rejects_new_work() {
        let mut session = Session::new(FakeProvider::new(), &test_config());
        let handle = session.state_handle();
        let _guard = handle.begin(GenerationPhase::Streaming).unwrap();

        let err = session.send_message("hi", &mut |_| {}).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<AcervoError>(), Some(AcervoError::Busy(_))));
        let err = session.analyze_all(&mut |_| {}).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<AcervoError>(), Some(AcervoError::Busy(_))));
        assert!(session.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_all_builds_catalog_report() {
        let provider = Arc::new(FakeProvider::new().with_structured(vec![
            record("Sinopse"),
            record("Receita"),
            record("Artigo"),
        ]));
        let mut session = session_with(&provider);
        let observer = session.state_handle();
        let mut observed = Vec::new();

        let outcome = session
            .analyze_all(&mut |p| observed.push((p, observer.progress(), observer.current())))
            .await
            .unwrap();

        assert!(outcome.is_completed());
        assert_eq!(observed.len(), 3);
        for (p, seen, phase) in &observed {
            assert_eq!(Some(*p), *seen);
            assert_eq!(*phase, GenerationPhase::BatchRunning);
        }
        assert!(session.progress().is_none());
        assert_eq!(session.state(), GenerationPhase::Idle);

        let report = session.catalog_report();
        assert_eq!(report.len(), 3);
        assert_eq!(report[1].source_name, "doc_final.pdf");
        assert_eq!(report[1].doc_type, "Receita");
    }

    #[tokio::test]
    async fn test_catalog_report_accumulates_across_runs() {
        let provider = Arc::new(FakeProvider::new().with_structured(vec![record("A"), record("B")]));
        let mut session = session_with(&provider).with_documents(vec![MockDocument::new("only.pdf", "x")]);

        session.analyze_all(&mut |_| {}).await.unwrap();
        session.analyze_all(&mut |_| {}).await.unwrap();

        let types: Vec<String> = session.catalog_report().into_iter().map(|r| r.doc_type).collect();
        assert_eq!(types, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_clear_history_resets_view() {
        let provider = Arc::new(FakeProvider::new().with_structured(vec![record("A")]));
        let mut session = session_with(&provider).with_documents(vec![MockDocument::new("only.pdf", "x")]);
        session.analyze_all(&mut |_| {}).await.unwrap();
        session.set_view(View::Catalog);

        session.clear_history();

        assert!(session.conversation().is_empty());
        assert!(session.catalog_report().is_empty());
        assert_eq!(session.view(), View::Chat);
    }

    #[test]
    fn test_set_model() {
        let mut session = Session::new(FakeProvider::new(), &test_config());
        assert_eq!(session.model(), "gemini-2.5-flash-lite");
        session.set_model(" gemini-3-pro-preview ").unwrap();
        assert_eq!(session.model(), "gemini-3-pro-preview");
        assert!(session.set_model("").is_err());
    }

    #[tokio::test]
    async fn test_selected_model_is_sent() {
        let provider = Arc::new(FakeProvider::new().with_turns(vec![ScriptedTurn::chunks(&["ok"])]));
        let mut session = session_with(&provider);
        session.set_model("gemma-3-27b-it").unwrap();
        session.send_message("hi", &mut |_| {}).await.unwrap();
        assert_eq!(provider.chats()[0].model, "gemma-3-27b-it");
        assert_eq!(
            session.conversation().last().unwrap().model.as_deref(),
            Some("gemma-3-27b-it")
        );
    }
}
