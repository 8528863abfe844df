//! Layered configuration for the precedent retrieval stack.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys split on `__`), then extracts a typed
//! [`Settings`] that is validated eagerly.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    /// Wrap an already assembled figment (defaults are layered underneath).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::Configuration(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract and validate the typed settings. The Gemini key falls back to
    /// `GEMINI_API_KEY` when the config layers leave it unset, and
    /// `APP_USE_FAKE_EMBEDDINGS=1` selects the hash embedder.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::Configuration(format!("Failed to parse settings: {}", e)))?;
        if env::var("APP_USE_FAKE_EMBEDDINGS").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true")) {
            settings.embedding.use_fake = true;
        }
        if settings.embedding.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            settings.embedding.api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty());
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub model_id: String,
    pub api_key: Option<String>,
    pub base_url: String,
    /// Must equal the vector dimension the chunk index was built with.
    pub output_dimensionality: usize,
    /// What the model returns when no dimensionality is requested.
    pub native_dimensionality: usize,
    pub query_task_type: Option<String>,
    pub document_task_type: Option<String>,
    pub timeout_secs: u64,
    pub use_fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_id: "models/text-embedding-004".to_string(),
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            output_dimensionality: 768,
            native_dimensionality: 768,
            query_task_type: Some("RETRIEVAL_QUERY".to_string()),
            document_task_type: Some("RETRIEVAL_DOCUMENT".to_string()),
            timeout_secs: 30,
            use_fake: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    OpenSearch,
    Lance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    pub backend: IndexBackend,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub chunk_index_name: String,
    pub precedents_index_name: String,
    pub vector_field: String,
    pub lance_path: String,
    pub timeout_secs: u64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: IndexBackend::OpenSearch,
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            chunk_index_name: "precedents_chunked".to_string(),
            precedents_index_name: "precedents".to_string(),
            vector_field: "content_embedding".to_string(),
            lance_path: "~/.local/share/precedent/lancedb".to_string(),
            timeout_secs: 30,
        }
    }
}

impl IndexSettings {
    pub fn lance_dir(&self) -> PathBuf {
        expand_path(&self.lance_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Minimum distinct precedents when the caller gives no `k`.
    pub default_k: usize,
    pub initial_pool_size: usize,
    /// Chunks requested per wanted precedent on the first attempt.
    pub initial_pool_size_multiplier: usize,
    pub max_attempts: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { default_k: 4, initial_pool_size: 50, initial_pool_size_multiplier: 20, max_attempts: 3 }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let e = &self.embedding;
        if e.model_id.trim().is_empty() {
            return Err(Error::Configuration("embedding.model_id is empty".into()));
        }
        if !e.use_fake && e.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(Error::Configuration(
                "embedding.api_key is not set (config or GEMINI_API_KEY)".into(),
            ));
        }
        if e.output_dimensionality == 0 || e.native_dimensionality == 0 {
            return Err(Error::Configuration("embedding dimensionality must be non-zero".into()));
        }

        let i = &self.index;
        if i.chunk_index_name.trim().is_empty() || i.precedents_index_name.trim().is_empty() {
            return Err(Error::Configuration("index names must not be empty".into()));
        }
        match i.backend {
            IndexBackend::OpenSearch => {
                if !(i.url.starts_with("http://") || i.url.starts_with("https://")) {
                    return Err(Error::Configuration(format!("index.url must be an http(s) URL, got '{}'", i.url)));
                }
                if i.vector_field.trim().is_empty() {
                    return Err(Error::Configuration("index.vector_field is empty".into()));
                }
            }
            IndexBackend::Lance => {
                if i.lance_path.trim().is_empty() {
                    return Err(Error::Configuration("index.lance_path is empty".into()));
                }
            }
        }

        let r = &self.retrieval;
        if r.initial_pool_size_multiplier == 0 {
            return Err(Error::Configuration("retrieval.initial_pool_size_multiplier must be non-zero".into()));
        }
        if r.max_attempts == 0 {
            return Err(Error::Configuration("retrieval.max_attempts must be non-zero".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
