//! Configuration management for Acervo
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{AcervoError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Acervo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider configuration
    pub provider: ProviderConfig,
    /// Session behavior configuration
    #[serde(default)]
    pub session: SessionConfig,
}

/// Provider configuration
///
/// Specifies which AI provider to use and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Gemini configuration
    #[serde(default)]
    pub gemini: GeminiConfig,
}

/// Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Model used when the session does not select another one
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Optional API base URL (useful for tests and local mocks)
    ///
    /// When unset, `https://generativelanguage.googleapis.com` is used.
    #[serde(default)]
    pub api_base: Option<String>,

    /// HTTP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_gemini_model(),
            api_base: None,
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

/// Session behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Number of usage statistics retained by the rolling window
    #[serde(default = "default_usage_window")]
    pub usage_window: usize,

    /// Bounded wait for a single streamed turn or structured call (seconds)
    ///
    /// `None` keeps the unbounded behavior: a hung producer hangs the turn.
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,

    /// Seed the conversation with the welcome notices and greeting
    #[serde(default = "default_greeting")]
    pub greeting: bool,

    /// Name of the synced downloads folder shown in the welcome notice
    #[serde(default = "default_downloads_folder")]
    pub downloads_folder: String,
}

fn default_usage_window() -> usize {
    crate::agent::usage::DEFAULT_USAGE_WINDOW
}

fn default_greeting() -> bool {
    true
}

fn default_downloads_folder() -> String {
    "my_downloads".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            usage_window: default_usage_window(),
            request_timeout_seconds: None,
            greeting: default_greeting(),
            downloads_folder: default_downloads_folder(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default_config()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn default_config() -> Self {
        Self {
            provider: ProviderConfig {
                provider_type: "gemini".to_string(),
                gemini: GeminiConfig::default(),
            },
            session: SessionConfig::default(),
        }
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AcervoError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| AcervoError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(model) = std::env::var("ACERVO_MODEL") {
            tracing::debug!(model = %model, "Env override: ACERVO_MODEL");
            self.provider.gemini.model = model;
        }

        if let Ok(api_base) = std::env::var("ACERVO_API_BASE") {
            tracing::debug!(api_base = %api_base, "Env override: ACERVO_API_BASE");
            self.provider.gemini.api_base = Some(api_base);
        }

        if let Ok(timeout) = std::env::var("ACERVO_REQUEST_TIMEOUT_SECONDS") {
            match timeout.parse::<u64>() {
                Ok(0) => self.session.request_timeout_seconds = None,
                Ok(v) => {
                    self.session.request_timeout_seconds = Some(v);
                    tracing::debug!(
                        request_timeout_seconds = v,
                        "Env override: ACERVO_REQUEST_TIMEOUT_SECONDS"
                    );
                }
                Err(_) => {
                    tracing::warn!("Invalid ACERVO_REQUEST_TIMEOUT_SECONDS: {}", timeout);
                }
            }
        }

        if let Ok(window) = std::env::var("ACERVO_USAGE_WINDOW") {
            if let Ok(value) = window.parse() {
                self.session.usage_window = value;
            } else {
                tracing::warn!("Invalid ACERVO_USAGE_WINDOW: {}", window);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
        if let Some(model) = cli.command.model_override() {
            self.provider.gemini.model = model.to_string();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type.is_empty() {
            return Err(AcervoError::Config("Provider type cannot be empty".to_string()).into());
        }

        let valid_providers = ["gemini"];
        if !valid_providers.contains(&self.provider.provider_type.as_str()) {
            return Err(AcervoError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        if self.provider.gemini.model.trim().is_empty() {
            return Err(AcervoError::Config("gemini.model cannot be empty".to_string()).into());
        }

        if let Some(base) = &self.provider.gemini.api_base {
            url::Url::parse(base).map_err(|e| {
                AcervoError::Config(format!("gemini.api_base is not a valid URL: {}", e))
            })?;
        }

        if self.session.usage_window == 0 {
            return Err(AcervoError::Config(
                "session.usage_window must be greater than 0".to_string(),
            )
            .into());
        }

        if self.session.request_timeout_seconds == Some(0) {
            return Err(AcervoError::Config(
                "session.request_timeout_seconds must be greater than 0 when set".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
