//! Vector index backends for precedent chunks.
//!
//! Both implement [`precedent_core::traits::VectorIndex`]; scores are
//! normalised so that higher is always better.

pub mod lance;
pub mod opensearch;

pub use lance::LanceIndex;
pub use opensearch::OpenSearchIndex;

use precedent_core::config::{IndexBackend, IndexSettings};
use precedent_core::traits::VectorIndex;
use precedent_core::Result;

/// Build the backend selected by `index.backend`.
pub async fn open_index(settings: &IndexSettings) -> Result<Box<dyn VectorIndex>> {
    match settings.backend {
        IndexBackend::OpenSearch => Ok(Box::new(OpenSearchIndex::new(settings)?)),
        IndexBackend::Lance => Ok(Box::new(LanceIndex::open(&settings.lance_dir()).await?)),
    }
}
