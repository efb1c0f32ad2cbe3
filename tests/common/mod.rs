use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use acervo::config::{Config, GeminiConfig};
use acervo::providers::GeminiProvider;

pub const TEST_KEY: &str = "test-key";

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Config pointing the Gemini provider at `api_base`, without greeting
#[allow(dead_code)]
pub fn config_for(api_base: &str) -> Config {
    let mut config = Config::default();
    config.provider.gemini.api_base = Some(api_base.to_string());
    config.session.greeting = false;
    config
}

#[allow(dead_code)]
pub fn provider_for(api_base: &str) -> GeminiProvider {
    let cfg = GeminiConfig {
        api_base: Some(api_base.to_string()),
        ..Default::default()
    };
    GeminiProvider::with_api_key(cfg, Some(TEST_KEY.to_string())).expect("provider")
}

/// SSE body carrying one `data:` event per text chunk
#[allow(dead_code)]
pub fn sse_body(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        let event = serde_json::json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": chunk }] } }]
        });
        body.push_str(&format!("data: {}\r\n\r\n", event));
    }
    body
}

/// `generateContent` response whose text is `text`
#[allow(dead_code)]
pub fn generate_response(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}
