//! Configuration types for markdown-to-slides splitting.
//!
//! All pipeline behaviour is controlled through [`SplitConfig`], built via
//! its [`SplitConfigBuilder`]. The model table lives here too: every model
//! the pipeline can call is an explicit [`ModelEntry`] in a
//! [`ModelRegistry`] carried by the config, so nothing reads a hidden
//! process-wide endpoint or key table.

use crate::error::SlidesError;
use crate::pipeline::adapter::ModelAdapter;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Model used when a request does not name one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const OPENAI_CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const GEMINI_ENDPOINT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const OLLAMA_GENERATE_ENDPOINT: &str = "http://localhost:11434/api/generate";

/// Configuration for a split run.
///
/// Built via [`SplitConfig::builder()`] or using [`SplitConfig::default()`].
///
/// # Example
/// ```rust
/// use md2slides::SplitConfig;
///
/// let config = SplitConfig::builder()
///     .max_chunk_chars(2000)
///     .overlap_chars(400)
///     .default_model("gpt-4o")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SplitConfig {
    /// Upper bound on a chunk's length in characters. Default: 3000.
    ///
    /// Keeps each prompt well inside the model's context window. A single
    /// structural unit longer than this is still sent whole.
    pub max_chunk_chars: usize,

    /// Characters of trailing context carried into the next chunk. Default: 700.
    pub overlap_chars: usize,

    /// Maximum tokens the model may generate per chunk. Default: 3000.
    pub max_tokens: usize,

    /// Sampling temperature. Default: None (provider default).
    pub temperature: Option<f32>,

    /// Per-call HTTP timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Retries per chunk on transient provider failures. Default: 0.
    ///
    /// Providers bill per call, so nothing is retried unless asked for.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Model used when the request omits one. Default: [`DEFAULT_MODEL`].
    pub default_model: String,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Every model the pipeline may call.
    pub models: ModelRegistry,

    /// Optional per-chunk progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 3000,
            overlap_chars: 700,
            max_tokens: 3000,
            temperature: None,
            api_timeout_secs: 60,
            max_retries: 0,
            retry_backoff_ms: 500,
            default_model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            models: ModelRegistry::with_defaults(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SplitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitConfig")
            .field("max_chunk_chars", &self.max_chunk_chars)
            .field("overlap_chars", &self.overlap_chars)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("default_model", &self.default_model)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("models", &self.models)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn SplitProgressCallback>"),
            )
            .finish()
    }
}

impl SplitConfig {
    /// Create a new builder for `SplitConfig`.
    pub fn builder() -> SplitConfigBuilder {
        SplitConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SplitConfig`].
#[derive(Debug)]
pub struct SplitConfigBuilder {
    config: SplitConfig,
}

impl SplitConfigBuilder {
    pub fn max_chunk_chars(mut self, n: usize) -> Self {
        self.config.max_chunk_chars = n;
        self
    }

    pub fn overlap_chars(mut self, n: usize) -> Self {
        self.config.overlap_chars = n;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.config.default_model = model.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn models(mut self, models: ModelRegistry) -> Self {
        self.config.models = models;
        self
    }

    /// Add or replace a single model entry.
    pub fn model(mut self, id: impl Into<String>, entry: ModelEntry) -> Self {
        self.config.models.register(id, entry);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SplitConfig, SlidesError> {
        let c = &self.config;
        if c.max_chunk_chars == 0 {
            return Err(SlidesError::InvalidConfig(
                "max_chunk_chars must be ≥ 1".into(),
            ));
        }
        if c.overlap_chars >= c.max_chunk_chars {
            return Err(SlidesError::InvalidConfig(format!(
                "overlap_chars ({}) must be smaller than max_chunk_chars ({})",
                c.overlap_chars, c.max_chunk_chars
            )));
        }
        if c.max_tokens == 0 {
            return Err(SlidesError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(SlidesError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.models.is_empty() {
            return Err(SlidesError::InvalidConfig(
                "model registry is empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Model registry ───────────────────────────────────────────────────────

/// Where a model's API key comes from.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialRef {
    /// The endpoint needs no credential (e.g. a local Ollama server).
    None,
    /// Read from the named environment variable when a request is validated.
    Env(String),
    /// A literal secret supplied by the caller.
    Value(String),
}

impl fmt::Debug for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialRef::None => f.write_str("None"),
            CredentialRef::Env(var) => f.debug_tuple("Env").field(var).finish(),
            CredentialRef::Value(_) => f.write_str("Value(<redacted>)"),
        }
    }
}

/// One row of the model table: endpoint, credential and payload shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Full URL the request is POSTed to.
    pub endpoint: String,
    /// Credential lookup for this endpoint.
    pub credential: CredentialRef,
    /// Request/response shape spoken by the endpoint.
    pub adapter: ModelAdapter,
    /// Model name sent upstream, when it differs from the registry id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_model: Option<String>,
}

impl ModelEntry {
    pub fn new(endpoint: impl Into<String>, credential: CredentialRef, adapter: ModelAdapter) -> Self {
        Self {
            endpoint: endpoint.into(),
            credential,
            adapter,
            provider_model: None,
        }
    }

    pub fn with_provider_model(mut self, model: impl Into<String>) -> Self {
        self.provider_model = Some(model.into());
        self
    }
}

/// The explicit `{model id → entry}` table consulted for every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelRegistry {
    entries: BTreeMap<String, ModelEntry>,
}

impl ModelRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in OpenAI, Gemini and Ollama models.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        for id in ["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini", "gpt-4.1-nano"] {
            registry.register(
                id,
                ModelEntry::new(
                    OPENAI_CHAT_ENDPOINT,
                    CredentialRef::Env("OPENAI_API_KEY".into()),
                    ModelAdapter::ChatMessages,
                ),
            );
        }

        for id in ["gemini-2.0-flash", "gemini-2.5-flash"] {
            registry.register(
                id,
                ModelEntry::new(
                    format!("{GEMINI_ENDPOINT_BASE}/{id}:generateContent"),
                    CredentialRef::Env("GEMINI_API_KEY".into()),
                    ModelAdapter::ContentParts,
                ),
            );
        }

        registry.register(
            "llama3.2",
            ModelEntry::new(
                OLLAMA_GENERATE_ENDPOINT,
                CredentialRef::None,
                ModelAdapter::Prompt,
            ),
        );

        registry
    }

    /// Load entries from a JSON file and merge them over the defaults.
    ///
    /// The file is an object keyed by model id:
    ///
    /// ```json
    /// {
    ///   "mistral-small": {
    ///     "endpoint": "https://api.mistral.ai/v1/chat/completions",
    ///     "credential": { "env": "MISTRAL_API_KEY" },
    ///     "adapter": "chat_messages",
    ///     "provider_model": "mistral-small-latest"
    ///   }
    /// }
    /// ```
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SlidesError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SlidesError::InvalidConfig(format!("cannot read model file {}: {e}", path.display()))
        })?;
        let overrides: ModelRegistry = serde_json::from_str(&text).map_err(|e| {
            SlidesError::InvalidConfig(format!("invalid model file {}: {e}", path.display()))
        })?;

        let mut registry = Self::with_defaults();
        registry.extend(overrides);
        Ok(registry)
    }

    /// Add or replace an entry.
    pub fn register(&mut self, id: impl Into<String>, entry: ModelEntry) {
        self.entries.insert(id.into(), entry);
    }

    /// Merge another registry in; its entries win.
    pub fn extend(&mut self, other: ModelRegistry) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, id: &str) -> Option<&ModelEntry> {
        self.entries.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look a model up and resolve its credential.
    ///
    /// Fails with a configuration error for unknown ids or a credential that
    /// is referenced but not set, before anything touches the network.
    pub fn resolve(&self, id: &str) -> Result<ResolvedModel, SlidesError> {
        let entry = self.get(id).ok_or_else(|| SlidesError::UnknownModel {
            model: id.to_string(),
            known: self.ids().collect::<Vec<_>>().join(", "),
        })?;

        let credential = match &entry.credential {
            CredentialRef::None => None,
            CredentialRef::Value(secret) => Some(secret.clone()),
            CredentialRef::Env(var) => match std::env::var(var) {
                Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
                _ => {
                    return Err(SlidesError::MissingCredential {
                        model: id.to_string(),
                        env_var: var.clone(),
                    })
                }
            },
        };

        Ok(ResolvedModel {
            id: id.to_string(),
            upstream_model: entry.provider_model.clone().unwrap_or_else(|| id.to_string()),
            endpoint: entry.endpoint.clone(),
            adapter: entry.adapter,
            credential,
        })
    }
}

/// A registry entry with its credential looked up, ready to call.
#[derive(Clone)]
pub struct ResolvedModel {
    /// Registry id the caller asked for.
    pub id: String,
    /// Name sent in the request body.
    pub upstream_model: String,
    pub endpoint: String,
    pub adapter: ModelAdapter,
    pub credential: Option<String>,
}

impl fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("id", &self.id)
            .field("upstream_model", &self.upstream_model)
            .field("endpoint", &self.endpoint)
            .field("adapter", &self.adapter)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
