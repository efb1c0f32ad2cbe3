//! Command-line interface definition for Acervo
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chat, single prompts, cataloguing, model
//! listing and authentication.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Acervo - University library cataloguing assistant
///
/// Chat with a Gemini model about the library collection and catalog the
/// downloaded documents into structured records.
#[derive(Parser, Debug, Clone)]
#[command(name = "acervo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Acervo
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start interactive chat mode with the library assistant
    Chat {
        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Send a single prompt and stream the answer to stdout
    Ask {
        /// Prompt text
        #[arg(short, long)]
        prompt: String,

        /// Attach a file from disk (repeatable)
        #[arg(short, long)]
        attach: Vec<PathBuf>,

        /// Attach one of the built-in mock documents by name (repeatable)
        #[arg(long)]
        mock: Vec<String>,

        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Catalog every downloaded document and print the catalog report
    Catalog {
        /// Override the model from config
        #[arg(short, long)]
        model: Option<String>,

        /// Print the report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List available models
    Models {
        /// Print the models as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Use the built-in catalog without contacting the API
        #[arg(long)]
        offline: bool,
    },

    /// Store the Gemini API key in the system keyring
    Auth,
}

impl Commands {
    /// Model override carried by the subcommand, if any
    pub fn model_override(&self) -> Option<&str> {
        match self {
            Commands::Chat { model } | Commands::Ask { model, .. } | Commands::Catalog { model, .. } => {
                model.as_deref()
            }
            Commands::Models { .. } | Commands::Auth => None,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            command: Commands::Auth,
        }
    }
}
