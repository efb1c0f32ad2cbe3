//! Provider module for Acervo
//!
//! This module contains the generative language provider abstraction, the
//! Gemini implementation and the server-sent events parser it streams with.

pub mod base;
pub mod gemini;
pub mod sse;

pub use base::{
    ChunkStream, Content, InlineData, ModelCapability, ModelInfo, Part, Provider, Role,
};
pub use gemini::GeminiProvider;

use crate::error::{AcervoError, Result};

/// Create a provider instance based on configuration
///
/// # Arguments
///
/// * `provider_type` - Type of provider (only "gemini" is available)
/// * `config` - Provider configuration
///
/// # Errors
///
/// Returns error if provider type is invalid or initialization fails
pub fn create_provider(
    provider_type: &str,
    config: &crate::config::ProviderConfig,
) -> Result<Box<dyn Provider>> {
    match provider_type {
        "gemini" => Ok(Box::new(GeminiProvider::new(config.gemini.clone())?)),
        _ => Err(AcervoError::Provider(format!("Unknown provider type: {}", provider_type)).into()),
    }
}
