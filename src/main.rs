//! Acervo - Library cataloguing assistant
//!
#![doc = "Main entry point for the Acervo command-line client."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use acervo::agent::usage::init_metrics_exporter;
use acervo::cli::{Cli, Commands};
use acervo::commands;
use acervo::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse first so --verbose can raise the log level
    let cli = Cli::parse_args();

    init_tracing(cli.verbose);
    init_metrics_exporter();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Chat { .. } => {
            tracing::info!("Starting interactive chat mode");
            commands::chat::run_chat(config).await?;
            Ok(())
        }
        Commands::Ask {
            prompt,
            attach,
            mock,
            ..
        } => {
            tracing::info!("Sending single prompt");
            tracing::debug!(attachments = attach.len(), mocks = mock.len(), "Ask options");
            commands::ask::run_ask(config, prompt, attach, mock).await?;
            Ok(())
        }
        Commands::Catalog { json, .. } => {
            tracing::info!("Starting catalog run");
            commands::catalog::run_catalog(&config, json).await?;
            Ok(())
        }
        Commands::Models { json, offline } => {
            tracing::info!("Starting model listing");
            commands::models::list_models(&config, json, offline).await?;
            Ok(())
        }
        Commands::Auth => {
            commands::auth::authenticate(config).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so streamed answers and JSON reports on stdout stay clean.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "acervo=debug" } else { "acervo=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
