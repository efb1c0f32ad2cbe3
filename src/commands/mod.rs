/*!
Command handlers for the CLI

This module provides the command handlers invoked by the CLI entrypoint.

It exposes these top-level command modules:

- `chat`     : Interactive chat with the library assistant
- `ask`      : A single streamed prompt
- `catalog`  : Catalog run and report rendering
- `models`   : Model listing
- `auth`     : Store the provider API key

The handlers stay small and delegate to the `Session` in the agent module.
*/

use crate::agent::{Message, MessageRole, Session};
use crate::config::Config;
use crate::error::{AcervoError, Result};
use crate::providers::create_provider;
use colored::Colorize;
use std::io::Write;

// Special commands parser for interactive chat
pub mod special_commands;

// Catalog command and report tables
pub mod catalog;

// Model listing command
pub mod models;

/// Render a conversation message for the terminal
fn format_message(message: &Message) -> String {
    match message.role {
        MessageRole::System => format!("[system] {}", message.text).yellow().to_string(),
        MessageRole::Model => format!("{} {}", "assistant>".green().bold(), message.text),
        MessageRole::User => {
            let mut line = format!("{} {}", "you>".cyan().bold(), message.text);
            for attachment in &message.attachments {
                line.push_str(&format!("\n  + {}", attachment.describe()).dimmed().to_string());
            }
            line
        }
    }
}

/// Send `text` with the pending attachments and stream the answer to stdout
///
/// Returns `Ok(false)` when the turn failed after being started; the
/// failure has already been printed.
async fn stream_to_stdout(session: &mut Session, text: &str) -> Result<bool> {
    let outcome = session
        .send_message(text, &mut |chunk: &str| {
            print!("{}", chunk);
            let _ = std::io::stdout().flush();
        })
        .await?;
    println!();

    match &outcome.error {
        None => {
            tracing::debug!(tokens = outcome.tokens, "Turn rendered");
            Ok(true)
        }
        Some(error) => {
            eprintln!("{}", format!("Processing error: {}", error).red());
            Ok(false)
        }
    }
}

// Chat command handler
pub mod chat {
    //! Interactive chat mode handler.
    //!
    //! Creates the provider and a greeted `Session`, then runs a
    //! readline-based loop that streams each answer as it arrives and
    //! dispatches special commands.

    use super::catalog::{print_documents, print_session_report, print_usage};
    use super::models::{fetch_or_builtin, output_models_table};
    use super::special_commands::{parse_special_command, print_help, SpecialCommand};
    use super::*;
    use crate::agent::{BatchOutcome, BatchProgress, View};
    use crate::attachments::suggest;
    use crate::providers::gemini::known_models;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    ///
    /// # Examples
    ///
    /// ```
    /// use acervo::commands::chat;
    /// use acervo::config::Config;
    ///
    /// // In application code:
    /// // chat::run_chat(Config::default()).await?;
    /// ```
    pub async fn run_chat(config: Config) -> Result<()> {
        tracing::info!("Starting interactive chat mode");

        let provider = create_provider(&config.provider.provider_type, &config.provider)?;
        let mut session = Session::new_boxed(provider, &config).with_greeting();

        let mut rl = DefaultEditor::new()?;

        print_welcome_banner(&session);

        loop {
            let prompt = format_prompt(&session);
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(trimmed)?;

                    match parse_special_command(trimmed) {
                        Ok(SpecialCommand::None) => {
                            if let Err(e) = stream_to_stdout(&mut session, trimmed).await {
                                eprintln!("{}", e.to_string().red());
                            }
                        }
                        Ok(SpecialCommand::Exit) => break,
                        Ok(command) => {
                            if let Err(e) = handle_special_command(&mut session, command).await {
                                eprintln!("{}", e.to_string().red());
                            }
                        }
                        Err(e) => eprintln!("{}", e.to_string().red()),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("Interrupted. Type 'exit' to quit.");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Execute a special command against the session
    pub(crate) async fn handle_special_command(
        session: &mut Session,
        command: SpecialCommand,
    ) -> Result<()> {
        match command {
            SpecialCommand::Attach(path) => {
                let attachment = session.attach_file(&path).await?;
                println!("{}", format!("Attached {}", attachment.describe()).green());
            }
            SpecialCommand::Mock(name) => {
                let attachment = session.attach_mock(&name)?;
                println!("{}", format!("Attached {}", attachment.describe()).green());
            }
            SpecialCommand::Docs => print_documents(session.documents()),
            SpecialCommand::Catalog => run_session_catalog(session).await?,
            SpecialCommand::Report => {
                session.set_view(View::Catalog);
                print_session_report(session, false)?;
            }
            SpecialCommand::Usage => print_usage(session.usage()),
            SpecialCommand::Model(None) => println!("Active model: {}", session.model().cyan()),
            SpecialCommand::Model(Some(model)) => switch_model(session, &model)?,
            SpecialCommand::ListModels => {
                let models = fetch_or_builtin(session.provider()).await;
                output_models_table(&models, "gemini", Some(session.model()));
            }
            SpecialCommand::Clear => {
                session.clear_history();
                println!("{}", "Conversation cleared".green());
            }
            SpecialCommand::ShowStatus => print_status_display(session),
            SpecialCommand::Help => print_help(),
            SpecialCommand::Exit | SpecialCommand::None => {}
        }
        Ok(())
    }

    async fn run_session_catalog(session: &mut Session) -> Result<()> {
        let names: Vec<String> = session.documents().iter().map(|d| d.name.clone()).collect();
        let outcome = session
            .analyze_all(&mut |p: BatchProgress| {
                let name = names.get(p.current - 1).map(String::as_str).unwrap_or("?");
                println!("{}", format!("[{}] Processing {}...", p, name).cyan());
            })
            .await?;

        match outcome {
            BatchOutcome::Completed(records) => {
                println!(
                    "{}",
                    format!("Cataloguing finished: {} records. Type /report to view them.", records.len())
                        .green()
                );
            }
            BatchOutcome::Aborted { processed, error } => {
                eprintln!(
                    "{}",
                    format!("Cataloguing failed after {} documents: {}", processed, error).red()
                );
            }
        }
        Ok(())
    }

    fn switch_model(session: &mut Session, model: &str) -> Result<()> {
        session.set_model(model)?;
        println!("Switched to model {}", session.model().cyan());

        let known = known_models();
        if !known.iter().any(|m| m.name == session.model()) {
            let names: Vec<&str> = known.iter().map(|m| m.name.as_str()).collect();
            let hint = match suggest(session.model(), &names) {
                Some(best) => format!("'{}' is not a built-in model (did you mean '{}'?)", session.model(), best),
                None => format!("'{}' is not a built-in model", session.model()),
            };
            println!("{}", hint.yellow());
        }
        Ok(())
    }

    fn format_prompt(session: &Session) -> String {
        let pending = session.pending_attachments().len();
        if pending == 0 {
            format!("[{}] >>> ", session.model())
        } else {
            format!("[{} +{}] >>> ", session.model(), pending)
        }
    }

    fn print_welcome_banner(session: &Session) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║             Acervo Library Assistant - Welcome!              ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        for message in session.conversation().messages() {
            println!("{}", format_message(message));
        }
        println!("\nType '/help' for available commands, 'exit' to quit\n");
    }

    fn print_status_display(session: &Session) {
        println!("\nSession Status\n");
        println!("Model:               {}", session.model().cyan());
        println!("View:                {}", session.view());
        println!("State:               {}", session.state());
        println!("Conversation Size:   {} messages", session.conversation().len());
        println!("Catalog Records:     {}", session.catalog_report().len());
        println!("Usage Window:        {}/{}", session.usage().len(), session.usage().capacity());
        let pending = session.pending_attachments();
        if pending.is_empty() {
            println!("Pending Attachments: none");
        } else {
            println!("Pending Attachments:");
            for attachment in pending {
                println!("  {}", attachment.describe());
            }
        }
        println!();
    }

}

// Single prompt command handler
pub mod ask {
    //! One streamed turn, printed to stdout as it arrives.

    use super::*;
    use std::path::PathBuf;

    /// Send `prompt` with the given attachments and stream the answer
    ///
    /// # Errors
    ///
    /// Returns error if an attachment cannot be loaded, the prompt is empty,
    /// or the turn fails.
    pub async fn run_ask(
        config: Config,
        prompt: String,
        attach: Vec<PathBuf>,
        mock: Vec<String>,
    ) -> Result<()> {
        let provider = create_provider(&config.provider.provider_type, &config.provider)?;
        let mut session = Session::new_boxed(provider, &config);

        for path in &attach {
            let attachment = session.attach_file(path).await?;
            tracing::info!("Attached {}", attachment.describe());
        }
        for name in &mock {
            let attachment = session.attach_mock(name)?;
            tracing::info!("Attached {}", attachment.describe());
        }

        let outcome = session
            .send_message(&prompt, &mut |chunk: &str| {
                print!("{}", chunk);
                let _ = std::io::stdout().flush();
            })
            .await?;
        println!();

        match outcome.error {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }

}

/// Auth command
///
/// Stores the provider API key in the system keyring.
pub mod auth {
    use super::*;
    use crate::providers::gemini::store_api_key;
    use rustyline::DefaultEditor;

    /// Prompt for the API key and store it
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    pub async fn authenticate(config: Config) -> Result<()> {
        let provider = config.provider.provider_type.as_str();
        tracing::info!("Starting authentication for provider: {}", provider);

        match provider {
            "gemini" => {
                println!("Gemini: create a key at https://aistudio.google.com/apikey");
                let mut rl = DefaultEditor::new()?;
                let key = rl.readline("API key: ")?;
                match store_api_key(&key) {
                    Ok(()) => {
                        println!("Gemini: API key stored in the system keyring.");
                        Ok(())
                    }
                    Err(e) => {
                        eprintln!("Gemini: could not store the API key: {}", e);
                        Err(e)
                    }
                }
            }
            other => Err(AcervoError::Provider(format!("Unsupported provider: {}", other)).into()),
        }
    }

}
