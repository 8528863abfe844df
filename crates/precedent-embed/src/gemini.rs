//! Gemini `embedContent` client.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use precedent_core::config::EmbeddingSettings;
use precedent_core::traits::Embedder;
use precedent_core::types::{EmbedMode, EmbeddingVector};
use precedent_core::{Error, Result};

use crate::shapes::extract_vector;

/// Async client for a remotely hosted Gemini embedding model.
///
/// Configuration is validated in [`GeminiEmbedder::new`]; the HTTP client is
/// built once and reused for every call.
pub struct GeminiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dim: usize,
    /// Sent as `outputDimensionality` when the model's default differs from `dim`.
    requested_dim: Option<usize>,
    query_task_type: Option<String>,
    document_task_type: Option<String>,
    id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl GeminiEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Configuration("missing Gemini API key".into()))?;
        let model_id = settings.model_id.trim();
        if model_id.is_empty() {
            return Err(Error::Configuration("missing embedding model id".into()));
        }
        if settings.output_dimensionality == 0 {
            return Err(Error::Configuration("output dimensionality must be non-zero".into()));
        }
        let model = if model_id.starts_with("models/") { model_id.to_string() } else { format!("models/{}", model_id) };

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| Error::Configuration(format!("invalid Gemini API key: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build embedding HTTP client: {}", e)))?;

        let dim = settings.output_dimensionality;
        let requested_dim = (settings.native_dimensionality != dim).then_some(dim);
        let endpoint = format!("{}/{}:embedContent", settings.base_url.trim_end_matches('/'), model);
        let id = format!("gemini:{}:d{}", model, dim);
        info!(model = %model, dim, ?requested_dim, "gemini embedder configured");
        Ok(Self {
            client,
            endpoint,
            model,
            dim,
            requested_dim,
            query_task_type: settings.query_task_type.clone(),
            document_task_type: settings.document_task_type.clone(),
            id,
        })
    }

    fn task_type(&self, mode: EmbedMode) -> Option<&str> {
        match mode {
            EmbedMode::Query => self.query_task_type.as_deref(),
            EmbedMode::Document => self.document_task_type.as_deref(),
        }
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str, mode: EmbedMode) -> Result<EmbeddingVector> {
        crate::ensure_text(text)?;
        let request = EmbedContentRequest {
            model: &self.model,
            content: Content { parts: [Part { text }] },
            task_type: self.task_type(mode),
            output_dimensionality: self.requested_dim,
        };
        let response = self.client.post(&self.endpoint).json(&request).send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                Error::Connection(format!("embedding backend unreachable: {}", e))
            } else {
                Error::Embedding(format!("embedding request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
            let body: String = body.chars().take(500).collect();
            return Err(Error::Embedding(format!("embedding request failed ({}): {}", status, body)));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("failed to parse embedding response: {}", e)))?;
        let values = fit_dimension(extract_vector(&body)?, self.dim)?;
        debug!(dim = values.len(), ?mode, "embedded text");
        Ok(EmbeddingVector::new(values))
    }
}

/// Enforce the index dimensionality. Longer vectors are truncated and
/// renormalised; shorter ones cannot be searched.
pub fn fit_dimension(mut values: Vec<f32>, dim: usize) -> Result<Vec<f32>> {
    if values.len() < dim {
        return Err(Error::Embedding(format!(
            "embedding has {} dimensions, index expects {}",
            values.len(),
            dim
        )));
    }
    if values.len() > dim {
        warn!(got = values.len(), expected = dim, "truncating embedding to index dimensionality");
        values.truncate(dim);
        crate::l2_normalize(&mut values);
    }
    Ok(values)
}
