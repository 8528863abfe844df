use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, warn};

use precedent_core::config::RetrievalSettings;
use precedent_core::traits::VectorIndex;
use precedent_core::types::{ChunkHit, DocumentId, EmbeddingVector, PrecedentSummary};
use precedent_core::{Error, Result};

/// Deduplicating KNN retriever over a chunk-granular index.
///
/// The index stores many chunks per precedent and cannot be asked for "k
/// distinct documents", so each call over-fetches chunks, keeps the best
/// chunk per document, and doubles the candidate pool until `k` distinct
/// documents are seen or the attempt budget runs out. Holds no state between
/// calls.
pub struct PrecedentRetriever<I> {
    index: I,
    chunk_index: String,
    settings: RetrievalSettings,
}

impl<I: VectorIndex> PrecedentRetriever<I> {
    pub fn new(index: I, chunk_index: impl Into<String>, settings: RetrievalSettings) -> Self {
        Self { index, chunk_index: chunk_index.into(), settings }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Search with the configured pool size and attempt budget.
    pub async fn search_default(&self, query: &EmbeddingVector, k: usize) -> Result<Vec<PrecedentSummary>> {
        self.search(query, k, self.settings.initial_pool_size, self.settings.max_attempts).await
    }

    /// Return up to `k` distinct precedents ranked by descending score.
    ///
    /// Fewer than `k` results is not an error: the index may simply not hold
    /// enough distinct matches. Fails with `Connection` if the liveness probe
    /// fails and `IndexNotFound` if the chunk index is missing.
    pub async fn search(
        &self,
        query: &EmbeddingVector,
        k: usize,
        initial_pool_size: usize,
        max_attempts: usize,
    ) -> Result<Vec<PrecedentSummary>> {
        if !self.index.ping().await {
            return Err(Error::Connection("index backend did not answer the liveness probe".into()));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let max_attempts = max_attempts.max(1);
        let mut pool_size = initial_pool_size.max(k.saturating_mul(self.settings.initial_pool_size_multiplier));
        let mut best_by_document: HashMap<DocumentId, PrecedentSummary> = HashMap::new();

        for attempt in 1..=max_attempts {
            let hits = self.index.knn_search(&self.chunk_index, query, pool_size).await?;
            let skipped = merge_best(&mut best_by_document, &hits);
            debug!(
                attempt,
                pool_size,
                hits = hits.len(),
                skipped,
                distinct = best_by_document.len(),
                "knn attempt"
            );
            if best_by_document.len() >= k {
                break;
            }
            if attempt == max_attempts {
                warn!(
                    wanted = k,
                    found = best_by_document.len(),
                    attempts = max_attempts,
                    "returning fewer precedents than requested"
                );
                break;
            }
            pool_size = pool_size.saturating_mul(2);
        }

        Ok(rank(best_by_document, k))
    }
}

/// Fold chunk hits into the best hit per document; returns how many hits
/// were skipped for a missing document id or a non-finite score.
pub fn merge_best(best: &mut HashMap<DocumentId, PrecedentSummary>, hits: &[ChunkHit]) -> usize {
    let mut skipped = 0;
    for hit in hits {
        if !hit.score.is_finite() {
            skipped += 1;
            continue;
        }
        let Some(summary) = PrecedentSummary::from_hit(hit) else {
            skipped += 1;
            continue;
        };
        match best.entry(summary.document_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(summary);
            }
            Entry::Occupied(mut slot) => {
                if summary.score > slot.get().score {
                    slot.insert(summary);
                }
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, "skipped chunks without a usable document id or score");
    }
    skipped
}

/// Sort by score descending, ties by document id ascending, and keep `k`.
pub fn rank(best: HashMap<DocumentId, PrecedentSummary>, k: usize) -> Vec<PrecedentSummary> {
    let mut ranked: Vec<PrecedentSummary> = best.into_values().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.document_id.cmp(&b.document_id)));
    ranked.truncate(k);
    ranked
}
