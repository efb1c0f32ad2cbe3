//! Error types for Acervo
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Acervo operations
///
/// Covers configuration loading, provider interactions, structured result
/// validation, session state transitions and attachment encoding.
#[derive(Error, Debug)]
pub enum AcervoError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (API rejected the call, unexpected payloads, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Network or stream failure while talking to the provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// Authentication errors (e.g., 401 Unauthorized, 403 Forbidden)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Missing credentials for provider
    #[error("Missing credentials for provider: {0}")]
    MissingCredentials(String),

    /// Structured completion did not satisfy the expected schema
    #[error("Malformed result for {source_name}: {message}")]
    MalformedResult {
        /// Name of the document the result was requested for
        source_name: String,
        /// What was wrong with the payload
        message: String,
    },

    /// A request exceeded the configured bounded wait
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// A turn or batch run was requested while another one is active
    #[error("A generation is already in progress ({0})")]
    Busy(String),

    /// Prompt text was empty and no attachment was pending
    #[error("Nothing to send: the prompt is empty and no attachment is pending")]
    EmptyPrompt,

    /// Attachment encoding errors (unreadable file, invalid payload encoding)
    #[error("Attachment error: {0}")]
    Attachment(String),

    /// Referenced mock document does not exist
    #[error("Unknown document: {0}")]
    UnknownDocument(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type alias for Acervo operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
