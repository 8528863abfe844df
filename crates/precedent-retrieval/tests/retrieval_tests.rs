use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use precedent_core::config::{IndexSettings, RetrievalSettings};
use precedent_core::traits::{Embedder, VectorIndex};
use precedent_core::types::{ChunkHit, EmbedMode, EmbeddingVector, PrecedentMetadata};
use precedent_core::{Error, Result};
use precedent_embed::HashEmbedder;
use precedent_retrieval::{PrecedentRetriever, PrecedentSearch};

/// Index fake that replays one scripted response per knn call and records
/// the requested pool sizes.
#[derive(Default)]
struct ScriptedIndex {
    responses: Mutex<VecDeque<Vec<ChunkHit>>>,
    requests: Mutex<Vec<usize>>,
    query_dims: Mutex<Vec<usize>>,
    documents: HashMap<String, Value>,
    down: bool,
    missing: bool,
}

impl ScriptedIndex {
    fn with_responses(responses: Vec<Vec<ChunkHit>>) -> Arc<Self> {
        Arc::new(Self { responses: Mutex::new(responses.into()), ..Default::default() })
    }

    fn requests(&self) -> Vec<usize> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    async fn ping(&self) -> bool {
        !self.down
    }

    async fn index_exists(&self, _index: &str) -> Result<bool> {
        Ok(!self.missing)
    }

    async fn knn_search(&self, index: &str, query: &EmbeddingVector, requested_count: usize) -> Result<Vec<ChunkHit>> {
        self.requests.lock().unwrap().push(requested_count);
        self.query_dims.lock().unwrap().push(query.len());
        if self.missing {
            return Err(Error::IndexNotFound(index.to_string()));
        }
        Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn get_by_id(&self, _index: &str, id: &str) -> Result<Option<Value>> {
        Ok(self.documents.get(id).cloned())
    }
}

/// Embedder that always answers with a vector of the wrong length.
struct ShortEmbedder;

#[async_trait]
impl Embedder for ShortEmbedder {
    fn embedder_id(&self) -> &str {
        "short"
    }

    fn dim(&self) -> usize {
        8
    }

    async fn embed(&self, _text: &str, _mode: EmbedMode) -> Result<EmbeddingVector> {
        Ok(EmbeddingVector::new(vec![0.5; 4]))
    }
}

fn hit(doc: &str, score: f32) -> ChunkHit {
    ChunkHit {
        document_id: Some(doc.to_string()),
        score,
        text: format!("chunk of {doc}"),
        metadata: PrecedentMetadata {
            case_number: format!("2020다{doc}"),
            case_title: format!("사건 {doc}"),
            ..Default::default()
        },
    }
}

fn settings() -> RetrievalSettings {
    RetrievalSettings { default_k: 4, initial_pool_size: 50, initial_pool_size_multiplier: 20, max_attempts: 3 }
}

fn retriever(index: &Arc<ScriptedIndex>) -> PrecedentRetriever<Arc<ScriptedIndex>> {
    PrecedentRetriever::new(Arc::clone(index), "precedents_chunked", settings())
}

fn query() -> EmbeddingVector {
    EmbeddingVector::new(vec![0.1; 8])
}

fn ids(results: &[precedent_core::types::PrecedentSummary]) -> Vec<&str> {
    results.iter().map(|r| r.document_id.as_str()).collect()
}

#[tokio::test]
async fn widening_merges_best_score_across_attempts() {
    let index = ScriptedIndex::with_responses(vec![
        vec![hit("A", 0.9), hit("B", 0.5), hit("A", 0.95)],
        vec![hit("C", 0.7)],
    ]);
    let results = retriever(&index).search(&query(), 3, 50, 3).await.unwrap();

    assert_eq!(ids(&results), vec!["A", "C", "B"]);
    assert!((results[0].score - 0.95).abs() < f32::EPSILON);
    assert!((results[1].score - 0.7).abs() < f32::EPSILON);
    assert!((results[2].score - 0.5).abs() < f32::EPSILON);
    assert_eq!(results[0].metadata.case_number, "2020다A");
    // max(50, 3 * 20) then doubled once
    assert_eq!(index.requests(), vec![60, 120]);
}

#[tokio::test]
async fn stops_as_soon_as_quota_is_met() {
    let index = ScriptedIndex::with_responses(vec![
        vec![hit("A", 0.8), hit("B", 0.7), hit("A", 0.6), hit("C", 0.5)],
        vec![hit("D", 0.99)],
    ]);
    let results = retriever(&index).search(&query(), 2, 50, 3).await.unwrap();

    assert_eq!(ids(&results), vec!["A", "B"]);
    assert_eq!(index.requests(), vec![50]);
}

#[tokio::test]
async fn exhausts_attempts_and_returns_short_result() {
    let index = ScriptedIndex::with_responses(vec![
        vec![hit("A", 0.4), hit("A", 0.3)],
        vec![hit("A", 0.45)],
        vec![hit("B", 0.2), hit("A", 0.1)],
    ]);
    let results = retriever(&index).search(&query(), 3, 50, 3).await.unwrap();

    assert_eq!(ids(&results), vec!["A", "B"]);
    assert!((results[0].score - 0.45).abs() < f32::EPSILON);
    assert_eq!(index.requests(), vec![60, 120, 240]);
}

#[tokio::test]
async fn pool_starts_at_initial_size_when_larger() {
    let index = ScriptedIndex::with_responses(vec![]);
    let results = retriever(&index).search(&query(), 2, 50, 3).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(index.requests(), vec![50, 100, 200]);
}

#[tokio::test]
async fn results_are_distinct_and_sorted() {
    let index = ScriptedIndex::with_responses(vec![vec![
        hit("B", 0.3),
        hit("A", 0.6),
        hit("B", 0.8),
        hit("C", 0.6),
        hit("D", 0.1),
        hit("C", 0.2),
    ]]);
    let results = retriever(&index).search(&query(), 10, 50, 1).await.unwrap();

    assert_eq!(ids(&results), vec!["B", "A", "C", "D"]);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn zero_attempts_still_queries_once() {
    let index = ScriptedIndex::with_responses(vec![vec![hit("A", 0.5)]]);
    let results = retriever(&index).search(&query(), 2, 10, 0).await.unwrap();

    assert_eq!(ids(&results), vec!["A"]);
    assert_eq!(index.requests(), vec![40]);
}

#[tokio::test]
async fn zero_k_returns_empty_without_querying() {
    let index = ScriptedIndex::with_responses(vec![vec![hit("A", 0.5)]]);
    let results = retriever(&index).search(&query(), 0, 50, 3).await.unwrap();

    assert!(results.is_empty());
    assert!(index.requests().is_empty());
}

#[tokio::test]
async fn unreachable_index_is_connection_error() {
    let index = Arc::new(ScriptedIndex { down: true, ..Default::default() });
    let err = retriever(&index).search(&query(), 3, 50, 3).await.unwrap_err();

    assert!(matches!(err, Error::Connection(_)));
    assert!(index.requests().is_empty());
}

#[tokio::test]
async fn missing_index_is_reported() {
    let index = Arc::new(ScriptedIndex { missing: true, ..Default::default() });
    let err = retriever(&index).search(&query(), 3, 50, 3).await.unwrap_err();

    assert!(matches!(err, Error::IndexNotFound(name) if name == "precedents_chunked"));
    assert_eq!(index.requests().len(), 1);
}

#[tokio::test]
async fn search_default_uses_configured_pool() {
    let index = ScriptedIndex::with_responses(vec![vec![hit("A", 0.5), hit("B", 0.4)]]);
    let results = retriever(&index).search_default(&query(), 1).await.unwrap();

    assert_eq!(ids(&results), vec!["A"]);
    assert_eq!(index.requests(), vec![50]);
}

fn service<E: Embedder>(embedder: E, index: &Arc<ScriptedIndex>) -> PrecedentSearch<E, Arc<ScriptedIndex>> {
    PrecedentSearch::new(embedder, Arc::clone(index), &IndexSettings::default(), settings())
}

#[tokio::test]
async fn search_text_embeds_and_retrieves() {
    let index = ScriptedIndex::with_responses(vec![vec![hit("A", 0.9), hit("B", 0.8), hit("C", 0.7), hit("D", 0.6)]]);
    let search = service(HashEmbedder::new(16), &index);

    let results = search.search_text("임대차 보증금 반환", None).await.unwrap();
    assert_eq!(ids(&results), vec!["A", "B", "C", "D"]);
    assert_eq!(*index.query_dims.lock().unwrap(), vec![16]);
    // default_k of 4 * 20
    assert_eq!(index.requests(), vec![80]);
}

#[tokio::test]
async fn search_text_rejects_wrong_dimension() {
    let index = ScriptedIndex::with_responses(vec![vec![hit("A", 0.9)]]);
    let err = service(ShortEmbedder, &index).search_text("question", Some(2)).await.unwrap_err();

    assert!(matches!(err, Error::Embedding(_)));
    assert!(index.requests().is_empty());
}

#[tokio::test]
async fn search_text_rejects_empty_input() {
    let index = ScriptedIndex::with_responses(vec![]);
    let err = service(HashEmbedder::new(16), &index).search_text("   ", None).await.unwrap_err();

    assert!(matches!(err, Error::Embedding(_)));
}

#[tokio::test]
async fn get_precedent_by_case_number() {
    let mut documents = HashMap::new();
    documents.insert("2019다12345".to_string(), json!({"caseNo": "2019다12345", "caseTitle": "손해배상"}));
    let index = Arc::new(ScriptedIndex { documents, ..Default::default() });
    let search = service(HashEmbedder::new(16), &index);

    let found = search.get_precedent_by_case_number(" 2019다12345 ").await.unwrap();
    assert_eq!(found.unwrap()["caseTitle"], "손해배상");
    assert!(search.get_precedent_by_case_number("2000다1").await.unwrap().is_none());
    assert!(search.get_precedent_by_case_number("  ").await.unwrap().is_none());
    assert!(search.check_connection().await);
}

#[tokio::test]
async fn get_precedent_requires_live_index() {
    let index = Arc::new(ScriptedIndex { down: true, ..Default::default() });
    let search = service(HashEmbedder::new(16), &index);

    let err = search.get_precedent_by_case_number("2019다12345").await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
    assert!(!search.check_connection().await);
}
