//! Model listing command for Acervo
//!
//! Lists the models the configured provider can generate with, either from
//! the live API or from the built-in catalog when offline.

use crate::config::Config;
use crate::error::{AcervoError, Result};
use crate::providers;
use crate::providers::gemini::known_models;
use crate::providers::{ModelInfo, Provider};
use prettytable::{cell, row, Table};

/// List available models
///
/// With `offline` set the built-in catalog is printed without contacting the
/// API. Otherwise the provider is asked and the built-in catalog is used as a
/// fallback when the request fails.
///
/// # Examples
///
/// ```no_run
/// use acervo::config::Config;
/// use acervo::commands::models::list_models;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::default();
/// list_models(&config, false, true).await?;
/// # Ok(())
/// # }
/// ```
pub async fn list_models(config: &Config, json: bool, offline: bool) -> Result<()> {
    let provider_type = &config.provider.provider_type;
    tracing::debug!("models::list_models flags - json: {}, offline: {}", json, offline);

    let models = if offline {
        known_models()
    } else {
        tracing::info!("Listing models from provider: {}", provider_type);
        let provider = providers::create_provider(provider_type, &config.provider)?;
        fetch_or_builtin(provider.as_ref()).await
    };

    if json {
        output_models_json(&models)?;
    } else if models.is_empty() {
        println!("No models available from provider: {}", provider_type);
    } else {
        output_models_table(&models, provider_type, Some(config.provider.gemini.model.as_str()));
    }

    Ok(())
}

/// Models from the provider, or the built-in catalog if listing fails
pub async fn fetch_or_builtin(provider: &dyn Provider) -> Vec<ModelInfo> {
    match provider.list_models().await {
        Ok(models) => models,
        Err(e) => {
            tracing::warn!("Model listing failed, using built-in catalog: {:#}", e);
            known_models()
        }
    }
}

fn serialize_pretty<T: serde::Serialize + ?Sized>(
    value: &T,
) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

fn output_models_json(models: &[ModelInfo]) -> Result<()> {
    let json = serialize_pretty(models).map_err(AcervoError::Serialization)?;
    println!("{}", json);
    Ok(())
}

fn format_capabilities(model: &ModelInfo) -> String {
    if model.capabilities.is_empty() {
        "None".to_string()
    } else {
        model
            .capabilities
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn models_table(models: &[ModelInfo], active: Option<&str>) -> Table {
    let mut table = Table::new();
    table.add_row(row!["", "Model Name", "Display Name", "Description", "Capabilities"]);

    for model in models {
        let marker = if active == Some(model.name.as_str()) { "*" } else { "" };
        table.add_row(row![
            marker,
            model.name,
            model.display_name,
            model.description,
            format_capabilities(model)
        ]);
    }

    table
}

/// Print `models` as a table, marking `active` with `*`
pub fn output_models_table(models: &[ModelInfo], provider_type: &str, active: Option<&str>) {
    println!("\nAvailable models from {}:\n", provider_type);
    models_table(models, active).printstd();
    println!();
}
