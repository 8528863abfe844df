//! Domain types shared by the embedding client, the index backends and the
//! retriever.

use serde::{Deserialize, Serialize};

/// Identifier of a precedent (the parent document of many chunks).
pub type DocumentId = String;

/// Which side of the search a text is embedded for.
///
/// Some embedding backends compute different vectors for a search query and
/// for an indexed passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    Query,
    Document,
}

/// A fixed-length embedding produced for one input string.
///
/// Immutable once built; the length is the dimensionality of the chunk index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for EmbeddingVector {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Descriptive fields copied verbatim from the winning chunk of a precedent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrecedentMetadata {
    pub case_number: String,
    pub case_title: String,
    pub law_category: String,
    pub law_subcategory: String,
    pub court: String,
    pub judgment_date: String,
    pub preview: String,
}

/// One chunk returned by a nearest-neighbour search.
///
/// `score` only exists at query time and higher is always better.
/// `document_id` is `None` when the indexed chunk carries no usable id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkHit {
    pub document_id: Option<DocumentId>,
    pub score: f32,
    pub text: String,
    pub metadata: PrecedentMetadata,
}

/// A de-duplicated, document-level search result.
///
/// `score` is the best score seen for `document_id` during one retrieval call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecedentSummary {
    pub document_id: DocumentId,
    pub score: f32,
    #[serde(flatten)]
    pub metadata: PrecedentMetadata,
}

impl PrecedentSummary {
    /// Build a summary from a chunk, or `None` if the chunk has no usable id.
    pub fn from_hit(hit: &ChunkHit) -> Option<Self> {
        let document_id = hit.document_id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
        Some(Self {
            document_id: document_id.to_string(),
            score: hit.score,
            metadata: hit.metadata.clone(),
        })
    }
}
