//! Gemini provider implementation for Acervo
//!
//! This module implements the Provider trait against the Gemini REST API:
//! streamed chat over server-sent events, schema-constrained single-shot
//! generation, and model listing. The API key is resolved once at
//! construction from the environment or the system keyring.

use crate::config::GeminiConfig;
use crate::error::{AcervoError, Result};
use crate::providers::{sse, ChunkStream, Content, ModelCapability, ModelInfo, Provider};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Public Gemini API base URL
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Model used when nothing else is configured
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

/// Keyring service name for the stored API key
pub const KEYRING_SERVICE: &str = "acervo";

/// Keyring user name for the stored API key
pub const KEYRING_USER: &str = "gemini_api_key";

/// Environment variables consulted for the API key, in order
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

const MODEL_CACHE_TTL: Duration = Duration::from_secs(300);

/// Gemini API provider
///
/// # Examples
///
/// ```no_run
/// use acervo::config::GeminiConfig;
/// use acervo::providers::{Content, GeminiProvider, Provider};
/// use futures::StreamExt;
///
/// # async fn example() -> acervo::error::Result<()> {
/// let provider = GeminiProvider::new(GeminiConfig::default())?;
/// let mut chunks = provider
///     .stream_chat("gemini-2.5-flash-lite", &[], Content::user("Hello!"))
///     .await?;
/// while let Some(chunk) = chunks.next().await {
///     print!("{}", chunk?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
    api_key: Option<String>,
    #[allow(clippy::type_complexity)]
    model_cache: Arc<RwLock<Option<(Vec<ModelInfo>, Instant)>>>,
}

/// Request body for `generateContent` and `streamGenerateContent`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a serde_json::Value,
}

/// Response body (also the payload of each SSE event)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

/// Response from `GET /v1beta/models`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ApiModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiModel {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    /// Error carried inside an otherwise successful body
    fn embedded_error(&self) -> Option<AcervoError> {
        if let Some(err) = &self.error {
            return Some(AcervoError::Provider(format!(
                "Gemini stream error {}{}: {}",
                err.code.map(|c| c.to_string()).unwrap_or_default(),
                err.status
                    .as_deref()
                    .map(|s| format!(" ({})", s))
                    .unwrap_or_default(),
                err.message
            )));
        }
        if self.candidates.is_empty() {
            if let Some(reason) = self
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.as_deref())
            {
                return Some(AcervoError::Provider(format!(
                    "Gemini blocked the prompt: {}",
                    reason
                )));
            }
        }
        None
    }
}

impl From<ApiModel> for ModelInfo {
    fn from(model: ApiModel) -> Self {
        let name = model
            .name
            .strip_prefix("models/")
            .unwrap_or(&model.name)
            .to_string();
        let display_name = model.display_name.unwrap_or_else(|| name.clone());
        let mut info =
            ModelInfo::new(name, display_name).with_description(model.description.unwrap_or_default());
        for method in &model.supported_generation_methods {
            match method.as_str() {
                "generateContent" => info.add_capability(ModelCapability::Generate),
                "streamGenerateContent" => info.add_capability(ModelCapability::Streaming),
                "createCachedContent" => info.add_capability(ModelCapability::Caching),
                _ => {}
            }
        }
        info
    }
}

/// Decode one SSE `data:` payload into a text chunk
///
/// Returns `Ok(None)` for events that carry no text (e.g. the final
/// finish-reason event).
fn decode_stream_event(data: &str) -> Result<Option<String>> {
    let event: GenerateContentResponse = serde_json::from_str(data).map_err(|e| {
        AcervoError::Provider(format!("Failed to decode Gemini stream event: {}", e))
    })?;

    if let Some(err) = event.embedded_error() {
        return Err(err.into());
    }

    if let Some(reason) = event.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
        tracing::debug!(finish_reason = reason, "Gemini stream candidate finished");
    }

    let text = event.text();
    Ok(if text.is_empty() { None } else { Some(text) })
}

fn format_gemini_api_error(status: reqwest::StatusCode, body: &str) -> AcervoError {
    let detail = serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| body.to_string());

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        AcervoError::Authentication(format!(
            "Gemini returned error {}: {}. Check GEMINI_API_KEY or run `acervo auth`",
            status, detail
        ))
    } else {
        AcervoError::Provider(format!("Gemini returned error {}: {}", status, detail))
    }
}

/// Built-in model catalog, used offline and as a fallback
///
/// # Examples
///
/// ```
/// use acervo::providers::gemini::{known_models, DEFAULT_MODEL};
///
/// let models = known_models();
/// assert_eq!(models[0].name, DEFAULT_MODEL);
/// ```
pub fn known_models() -> Vec<ModelInfo> {
    use ModelCapability::*;

    vec![
        ModelInfo::new(DEFAULT_MODEL, "Gemini 2.5 Flash Lite")
            .with_description("Lightweight, stable and optimized for fast automation.")
            .with_capabilities(vec![Generate, Streaming, JsonMode]),
        ModelInfo::new("gemini-3-flash-preview", "Gemini 3 Flash Preview")
            .with_description("Optimized for speed and efficiency.")
            .with_capabilities(vec![Generate, Streaming, JsonMode]),
        ModelInfo::new("gemini-3-pro-preview", "Gemini 3 Pro Preview")
            .with_description("Maximum intelligence for complex tasks.")
            .with_capabilities(vec![Generate, Streaming, Caching, JsonMode]),
        ModelInfo::new("gemma-3-27b-it", "Gemma 3 27B IT")
            .with_description("High-performance open model.")
            .with_capabilities(vec![Generate]),
    ]
}

/// Resolve the API key from the environment, then the system keyring
///
/// Keyring failures (no secret service, no entry) count as "absent".
pub fn resolve_api_key() -> Option<String> {
    for var in API_KEY_ENV_VARS {
        if let Ok(value) = std::env::var(var) {
            if !value.trim().is_empty() {
                tracing::debug!("Using Gemini API key from {}", var);
                return Some(value.trim().to_string());
            }
        }
    }

    match keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER).and_then(|e| e.get_password()) {
        Ok(key) if !key.trim().is_empty() => {
            tracing::debug!("Using Gemini API key from system keyring");
            Some(key)
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("No Gemini API key in keyring: {}", e);
            None
        }
    }
}

/// Store the API key in the system keyring
///
/// # Errors
///
/// Returns error if the key is empty or the keyring is unavailable
pub fn store_api_key(key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        return Err(AcervoError::Config("API key cannot be empty".to_string()).into());
    }
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
    entry.set_password(key)?;
    tracing::info!("Stored Gemini API key in system keyring");
    Ok(())
}

impl GeminiProvider {
    /// Create a new Gemini provider, resolving the API key
    ///
    /// A missing key is not an error here; every call fails with
    /// `MissingCredentials` instead.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let api_key = resolve_api_key();
        Self::with_api_key(config, api_key)
    }

    /// Create a provider with an explicit API key
    ///
    /// # Examples
    ///
    /// ```
    /// use acervo::config::GeminiConfig;
    /// use acervo::providers::GeminiProvider;
    ///
    /// let provider = GeminiProvider::with_api_key(GeminiConfig::default(), None).unwrap();
    /// assert!(!provider.has_credentials());
    /// ```
    pub fn with_api_key(config: GeminiConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .user_agent(concat!("acervo/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AcervoError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        if api_key.is_none() {
            tracing::warn!("No Gemini API key found; requests will fail until one is configured");
        }

        tracing::info!(
            "Initialized Gemini provider: api_base={}, model={}",
            config.api_base.as_deref().unwrap_or(GEMINI_API_BASE),
            config.model
        );

        Ok(Self {
            client,
            config,
            api_key,
            model_cache: Arc::new(RwLock::new(None)),
        })
    }

    /// Whether an API key was resolved
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    /// Configured default model
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Build a `v1beta` endpoint URL using the optional `api_base` override
    fn api_endpoint(&self, path: &str) -> String {
        let base = self.config.api_base.as_deref().unwrap_or(GEMINI_API_BASE);
        format!(
            "{}/v1beta/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            AcervoError::MissingCredentials(
                "gemini (set GEMINI_API_KEY or run `acervo auth`)".to_string(),
            )
            .into()
        })
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<reqwest::Response> {
        let key = self.api_key()?;
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", key)
            .json(body)
            .send()
            .await
            .map_err(|e| AcervoError::Transport(format!("Failed to reach Gemini: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Gemini returned error {}: {}", status, body);
            return Err(format_gemini_api_error(status, &body).into());
        }

        Ok(response)
    }

    fn is_cache_valid(cached_at: Instant) -> bool {
        cached_at.elapsed() < MODEL_CACHE_TTL
    }

    async fn fetch_models_from_api(&self) -> Result<Vec<ModelInfo>> {
        let key = self.api_key()?;
        let url = self.api_endpoint("models?pageSize=1000");
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", key)
            .send()
            .await
            .map_err(|e| AcervoError::Transport(format!("Failed to reach Gemini: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Gemini returned error {}: {}", status, body);
            return Err(format_gemini_api_error(status, &body).into());
        }

        let listing: ListModelsResponse = response
            .json()
            .await
            .map_err(|e| AcervoError::Provider(format!("Failed to parse model list: {}", e)))?;

        let models: Vec<ModelInfo> = listing
            .models
            .into_iter()
            .map(ModelInfo::from)
            .filter(|m| m.supports_capability(ModelCapability::Generate))
            .collect();

        tracing::debug!("Gemini reported {} generative models", models.len());
        Ok(models)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn stream_chat(
        &self,
        model: &str,
        history: &[Content],
        turn: Content,
    ) -> Result<ChunkStream> {
        let mut contents = history.to_vec();
        contents.push(turn);

        let url = self.api_endpoint(&format!("models/{}:streamGenerateContent?alt=sse", model));
        let body = GenerateContentRequest {
            contents: &contents,
            generation_config: None,
        };

        tracing::debug!(model, history = history.len(), "Opening Gemini stream");
        let response = self.post_json(&url, &body).await?;

        let chunks = sse::data_stream(response.bytes_stream()).filter_map(|event| async move {
            match event {
                Ok(data) => decode_stream_event(&data).transpose(),
                Err(e) => Some(Err(e)),
            }
        });

        Ok(Box::pin(chunks))
    }

    async fn generate_structured(
        &self,
        model: &str,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<String> {
        let contents = [Content::user(prompt)];
        let url = self.api_endpoint(&format!("models/{}:generateContent", model));
        let body = GenerateContentRequest {
            contents: &contents,
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            }),
        };

        let response = self.post_json(&url, &body).await?;
        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AcervoError::Provider(format!("Failed to parse Gemini response: {}", e)))?;

        if let Some(err) = parsed.embedded_error() {
            return Err(err.into());
        }

        Ok(parsed.text())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        if let Ok(cache) = self.model_cache.read() {
            if let Some((models, cached_at)) = cache.as_ref() {
                if Self::is_cache_valid(*cached_at) {
                    tracing::debug!("Using cached model list");
                    return Ok(models.clone());
                }
            }
        }

        let models = self.fetch_models_from_api().await?;

        if let Ok(mut cache) = self.model_cache.write() {
            *cache = Some((models.clone(), Instant::now()));
        }

        Ok(models)
    }
}
