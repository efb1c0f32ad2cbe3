//! Acervo - Library cataloguing assistant
//!
//! This library provides the core functionality behind the `acervo` CLI: a
//! streamed chat with a Gemini model about a university library collection,
//! and batch cataloguing of downloaded documents into structured records.
//!
//! # Architecture
//!
//! - `agent`: Session, conversation store, streamed turns, usage window and
//!   the catalog orchestrator
//! - `attachments`: Attachment encoding and the downloaded documents
//! - `providers`: Provider abstraction and the Gemini implementation
//! - `commands`: Terminal rendering and command handlers
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use acervo::{Config, Session};
//! use acervo::providers::GeminiProvider;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let provider = GeminiProvider::new(config.provider.gemini.clone())?;
//!     let mut session = Session::new(provider, &config);
//!     let outcome = session.analyze_all(&mut |p| eprintln!("{}", p)).await?;
//!     println!("completed: {}", outcome.is_completed());
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod attachments;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod providers;

// Re-export commonly used types
pub use agent::Session;
pub use attachments::{Attachment, MockDocument};
pub use config::Config;
pub use error::{AcervoError, Result};

#[cfg(test)]
pub mod test_utils;
