use serde_json::Value;
use tracing::{debug, info};

use precedent_core::config::{IndexSettings, RetrievalSettings, Settings};
use precedent_core::traits::{Embedder, VectorIndex};
use precedent_core::types::{EmbedMode, PrecedentSummary};
use precedent_core::{Error, Result};

use crate::retriever::PrecedentRetriever;

/// Text in, ranked precedents out: embeds the situation as a query and runs
/// the deduplicating retriever. Also serves full precedents by case number.
///
/// All collaborators are built up front and injected; nothing is initialised
/// lazily on first use.
pub struct PrecedentSearch<E, I> {
    embedder: E,
    retriever: PrecedentRetriever<I>,
    precedents_index: String,
}

impl<E: Embedder, I: VectorIndex> PrecedentSearch<E, I> {
    pub fn new(embedder: E, index: I, index_settings: &IndexSettings, retrieval: RetrievalSettings) -> Self {
        Self {
            embedder,
            retriever: PrecedentRetriever::new(index, index_settings.chunk_index_name.clone(), retrieval),
            precedents_index: index_settings.precedents_index_name.clone(),
        }
    }

    pub fn retriever(&self) -> &PrecedentRetriever<I> {
        &self.retriever
    }

    pub async fn check_connection(&self) -> bool {
        self.retriever.index().ping().await
    }

    /// `k` falls back to `retrieval.default_k`.
    pub async fn search_text(&self, situation: &str, k: Option<usize>) -> Result<Vec<PrecedentSummary>> {
        let k = k.unwrap_or(self.retriever.settings().default_k);
        let query = self.embedder.embed(situation, EmbedMode::Query).await?;
        if query.len() != self.embedder.dim() {
            return Err(Error::Embedding(format!(
                "embedder returned {} dimensions, expected {}",
                query.len(),
                self.embedder.dim()
            )));
        }
        let results = self.retriever.search_default(&query, k).await?;
        debug!(k, returned = results.len(), "precedent search");
        Ok(results)
    }

    /// Full precedent document, or `None` if no precedent has this case number.
    pub async fn get_precedent_by_case_number(&self, case_no: &str) -> Result<Option<Value>> {
        let index = self.retriever.index();
        if !index.ping().await {
            return Err(Error::Connection("index backend did not answer the liveness probe".into()));
        }
        let case_no = case_no.trim();
        if case_no.is_empty() {
            return Ok(None);
        }
        index.get_by_id(&self.precedents_index, case_no).await
    }
}

/// Build the service from validated settings: Gemini (or hash) embedder and
/// the configured index backend.
pub async fn from_settings(
    settings: &Settings,
) -> Result<PrecedentSearch<Box<dyn Embedder>, Box<dyn VectorIndex>>> {
    settings.validate()?;
    let embedder = precedent_embed::get_default_embedder(&settings.embedding)?;
    let index = precedent_index::open_index(&settings.index).await?;
    info!(
        embedder = embedder.embedder_id(),
        chunk_index = %settings.index.chunk_index_name,
        "precedent search ready"
    );
    Ok(PrecedentSearch::new(embedder, index, &settings.index, settings.retrieval))
}
