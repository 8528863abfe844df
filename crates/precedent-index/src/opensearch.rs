//! OpenSearch k-NN backend over the REST API.
//!
//! Chunks live in an index whose `knn_vector` field (HNSW, L2) holds the
//! embedding; the vector field is excluded from returned `_source`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use precedent_core::config::IndexSettings;
use precedent_core::traits::VectorIndex;
use precedent_core::types::{ChunkHit, EmbeddingVector, PrecedentMetadata};
use precedent_core::{Error, Result};

// `_source` field names written by the indexing pipeline.
const DOCUMENT_ID: &str = "판례일련번호";
const CASE_NUMBER: &str = "caseNo";
const CASE_TITLE: &str = "caseTitle";
const LAW_CATEGORY: &str = "사건종류명";
const LAW_SUBCATEGORY: &str = "instance_name";
const COURT: &str = "courtNm";
const JUDGMENT_DATE: &str = "judmnAdjuDe";
const PREVIEW: &str = "summ_contxt";
const CHUNK_CONTENT: &str = "chunk_content";

pub struct OpenSearchIndex {
    client: Client,
    base_url: Url,
    vector_field: String,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_score")]
    score: Option<f32>,
    #[serde(rename = "_source", default)]
    source: Value,
}

impl OpenSearchIndex {
    pub fn new(settings: &IndexSettings) -> Result<Self> {
        let base_url = Url::parse(&settings.url)
            .map_err(|e| Error::Configuration(format!("invalid index url '{}': {}", settings.url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Configuration(format!("index url '{}' cannot be a base", settings.url)));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build index HTTP client: {}", e)))?;
        info!(url = %base_url, vector_field = %settings.vector_field, "opensearch backend configured");
        Ok(Self {
            client,
            base_url,
            vector_field: settings.vector_field.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Configuration(format!("index url '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }
}

fn transport_error(e: &reqwest::Error) -> Error {
    if e.is_connect() || e.is_timeout() {
        Error::Connection(format!("index backend unreachable: {}", e))
    } else {
        Error::Search(format!("index request failed: {}", e))
    }
}

fn is_index_not_found(body: &Value) -> bool {
    body.pointer("/error/type").and_then(Value::as_str) == Some("index_not_found_exception")
}

async fn failure(index: &str, response: reqwest::Response) -> Error {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
    if is_index_not_found(&body) {
        return Error::IndexNotFound(index.to_string());
    }
    let text: String = text.chars().take(500).collect();
    Error::Search(format!("{} on '{}': {}", status, index, text))
}

#[async_trait]
impl VectorIndex for OpenSearchIndex {
    async fn ping(&self) -> bool {
        let Ok(url) = self.url(&[]) else { return false };
        match self.authed(self.client.get(url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "opensearch ping failed");
                false
            }
        }
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let url = self.url(&[index])?;
        let resp = self.authed(self.client.head(url)).send().await.map_err(|e| transport_error(&e))?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(Error::Search(format!("{} checking index '{}'", s, index))),
        }
    }

    async fn knn_search(
        &self,
        index: &str,
        query: &EmbeddingVector,
        requested_count: usize,
    ) -> Result<Vec<ChunkHit>> {
        let mut knn = serde_json::Map::new();
        knn.insert(self.vector_field.clone(), json!({ "vector": query.as_slice(), "k": requested_count }));
        let body = json!({
            "size": requested_count,
            "_source": { "excludes": [&self.vector_field] },
            "query": { "knn": knn },
        });
        let url = self.url(&[index, "_search"])?;
        let resp = self
            .authed(self.client.post(url).json(&body))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        if !resp.status().is_success() {
            return Err(failure(index, resp).await);
        }
        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(format!("unreadable search response from '{}': {}", index, e)))?;
        Ok(parsed
            .hits
            .hits
            .into_iter()
            .map(|hit| chunk_hit_from_source(hit.score.unwrap_or(0.0), &hit.source))
            .collect())
    }

    async fn get_by_id(&self, index: &str, id: &str) -> Result<Option<Value>> {
        let url = self.url(&[index, "_doc", id])?;
        let resp = self.authed(self.client.get(url)).send().await.map_err(|e| transport_error(&e))?;
        if resp.status() == StatusCode::NOT_FOUND {
            let body: Value = resp.json().await.unwrap_or(Value::Null);
            if is_index_not_found(&body) {
                return Err(Error::IndexNotFound(index.to_string()));
            }
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(failure(index, resp).await);
        }
        let mut body: Value = resp
            .json()
            .await
            .map_err(|e| Error::Search(format!("unreadable document from '{}': {}", index, e)))?;
        if body.get("found").and_then(Value::as_bool) == Some(false) {
            return Ok(None);
        }
        Ok(body.get_mut("_source").map(Value::take))
    }
}

fn field_text(source: &Value, key: &str) -> String {
    match source.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

// The id was indexed as an integer; older documents carry it as a string.
fn document_id(source: &Value) -> Option<String> {
    let id = field_text(source, DOCUMENT_ID);
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

fn chunk_hit_from_source(score: f32, source: &Value) -> ChunkHit {
    ChunkHit {
        document_id: document_id(source),
        score,
        text: field_text(source, CHUNK_CONTENT),
        metadata: PrecedentMetadata {
            case_number: field_text(source, CASE_NUMBER),
            case_title: field_text(source, CASE_TITLE),
            law_category: field_text(source, LAW_CATEGORY),
            law_subcategory: field_text(source, LAW_SUBCATEGORY),
            court: field_text(source, COURT),
            judgment_date: field_text(source, JUDGMENT_DATE),
            preview: field_text(source, PREVIEW),
        },
    }
}
