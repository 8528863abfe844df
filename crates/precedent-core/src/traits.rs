use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{ChunkHit, EmbedMode, EmbeddingVector};

/// Turns text into an [`EmbeddingVector`] of a fixed dimensionality.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `gemini:models/text-embedding-004:d768`).
    fn embedder_id(&self) -> &str;
    /// Length of every vector this embedder returns.
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str, mode: EmbedMode) -> Result<EmbeddingVector>;
}

/// Read-only access to a chunk-granular vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Cheap liveness probe. Never errors; an unreachable backend is `false`.
    async fn ping(&self) -> bool;

    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Approximate nearest-neighbour search returning up to `requested_count`
    /// chunks ranked by similarity. Fails with `IndexNotFound` if `index` is missing.
    async fn knn_search(
        &self,
        index: &str,
        query: &EmbeddingVector,
        requested_count: usize,
    ) -> Result<Vec<ChunkHit>>;

    /// Fetch one stored document by id; `Ok(None)` when it does not exist.
    async fn get_by_id(&self, index: &str, id: &str) -> Result<Option<serde_json::Value>>;
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn embedder_id(&self) -> &str {
        (**self).embedder_id()
    }

    fn dim(&self) -> usize {
        (**self).dim()
    }

    async fn embed(&self, text: &str, mode: EmbedMode) -> Result<EmbeddingVector> {
        (**self).embed(text, mode).await
    }
}

macro_rules! forward_vector_index {
    ($ptr:ident) => {
        #[async_trait]
        impl<T: VectorIndex + ?Sized> VectorIndex for $ptr<T> {
            async fn ping(&self) -> bool {
                (**self).ping().await
            }

            async fn index_exists(&self, index: &str) -> Result<bool> {
                (**self).index_exists(index).await
            }

            async fn knn_search(
                &self,
                index: &str,
                query: &EmbeddingVector,
                requested_count: usize,
            ) -> Result<Vec<ChunkHit>> {
                (**self).knn_search(index, query, requested_count).await
            }

            async fn get_by_id(&self, index: &str, id: &str) -> Result<Option<serde_json::Value>> {
                (**self).get_by_id(index, id).await
            }
        }
    };
}

forward_vector_index!(Box);
forward_vector_index!(Arc);
