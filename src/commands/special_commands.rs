//! Special commands parser for interactive chat mode
//!
//! This module parses the special commands that can be entered during an
//! interactive chat session. Special commands allow users to:
//! - Attach files from disk or built-in mock documents to the next prompt
//! - Run the catalog over the downloaded documents and view the report
//! - Inspect usage statistics and switch models
//! - Clear the conversation, display help, and exit the session
//!
//! Commands are prefixed with `/` and are case-insensitive. Arguments keep
//! their original case so file paths survive intact.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an argument it does not accept
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
///
/// These commands act on the session instead of being sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Attach a file from disk to the next prompt
    Attach(String),

    /// Attach a built-in mock document to the next prompt
    Mock(String),

    /// List the documents available for cataloguing
    Docs,

    /// Catalog every downloaded document
    Catalog,

    /// Show the catalog report
    Report,

    /// Show the rolling usage statistics
    Usage,

    /// Show the active model, or switch to another one
    Model(Option<String>),

    /// List available models
    ListModels,

    /// Clear the conversation history
    Clear,

    /// Show session status
    ShowStatus,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command
    ///
    /// The input should be sent to the model as a regular prompt.
    None,
}

/// Splits `/command rest` into the lowercased command and the untouched rest
fn split_command(input: &str) -> (String, &str) {
    match input.find(char::is_whitespace) {
        Some(index) => (input[..index].to_lowercase(), input[index..].trim()),
        None => (input.to_lowercase(), ""),
    }
}

fn no_argument(command: &str, rest: &str, parsed: SpecialCommand) -> Result<SpecialCommand, CommandError> {
    if rest.is_empty() {
        Ok(parsed)
    } else {
        Err(CommandError::UnsupportedArgument {
            command: command.to_string(),
            arg: rest.to_string(),
        })
    }
}

fn required_argument(
    command: &str,
    usage: &str,
    rest: &str,
    build: fn(String) -> SpecialCommand,
) -> Result<SpecialCommand, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument {
            command: command.to_string(),
            usage: usage.to_string(),
        })
    } else {
        Ok(build(rest.to_string()))
    }
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` if the input starts with `/` but is
/// not a known command, `MissingArgument` when a required argument is absent,
/// and `UnsupportedArgument` when a command that takes none is given one.
///
/// # Examples
///
/// ```
/// use acervo::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// let cmd = parse_special_command("/attach ./Notes.pdf").unwrap();
/// assert_eq!(cmd, SpecialCommand::Attach("./Notes.pdf".to_string()));
///
/// let cmd = parse_special_command("/CATALOG").unwrap();
/// assert_eq!(cmd, SpecialCommand::Catalog);
///
/// let cmd = parse_special_command("what is in the collection?").unwrap();
/// assert_eq!(cmd, SpecialCommand::None);
///
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if lower == "exit" || lower == "quit" {
        return Ok(SpecialCommand::Exit);
    }
    if !trimmed.starts_with('/') {
        return Ok(SpecialCommand::None);
    }

    let (command, rest) = split_command(trimmed);
    match command.as_str() {
        "/attach" => required_argument("/attach", "/attach <path>", rest, SpecialCommand::Attach),
        "/mock" => required_argument("/mock", "/mock <document_name>", rest, SpecialCommand::Mock),
        "/docs" => no_argument("/docs", rest, SpecialCommand::Docs),
        "/catalog" => no_argument("/catalog", rest, SpecialCommand::Catalog),
        "/report" => no_argument("/report", rest, SpecialCommand::Report),
        "/usage" => no_argument("/usage", rest, SpecialCommand::Usage),
        "/model" if rest.is_empty() => Ok(SpecialCommand::Model(None)),
        "/model" => Ok(SpecialCommand::Model(Some(rest.to_string()))),
        "/models" => no_argument("/models", rest, SpecialCommand::ListModels),
        "/clear" => no_argument("/clear", rest, SpecialCommand::Clear),
        "/status" => no_argument("/status", rest, SpecialCommand::ShowStatus),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Print help for the special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat Mode
==========================================

ATTACHMENTS (sent with your next prompt):
  /attach <path>  - Attach a file from disk (PDF, image, text)
  /mock <name>    - Attach a downloaded document by name
  /docs           - List the downloaded documents

CATALOG:
  /catalog        - Catalog every downloaded document
  /report         - Show the catalog report

MODELS AND USAGE:
  /model          - Show the active model
  /model <name>   - Switch to a different model
  /models         - List available models
  /usage          - Show tokens and latency of recent turns

SESSION:
  /status         - Show model, state and pending attachments
  /clear          - Clear the conversation history
  /help           - Show this help message
  /?              - Same as /help
  exit            - Exit interactive mode
  quit            - Same as exit

NOTES:
  - Commands are case-insensitive; arguments keep their case
  - Regular text (not starting with /) is sent to the model
"#
    );
}
