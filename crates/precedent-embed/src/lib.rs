//! Embedding Client: turns query text into vectors for the chunk index.
//!
//! [`GeminiEmbedder`] talks to the remote model; [`HashEmbedder`] is a
//! deterministic stand-in selected with `embedding.use_fake` or
//! `APP_USE_FAKE_EMBEDDINGS=1` for tests and offline development.

pub mod gemini;
pub mod hash;
pub mod shapes;

pub use gemini::GeminiEmbedder;
pub use hash::HashEmbedder;

use precedent_core::config::EmbeddingSettings;
use precedent_core::traits::Embedder;
use precedent_core::{Error, Result};
use tracing::info;

pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if settings.output_dimensionality == 0 {
        return Err(Error::Configuration("output dimensionality must be non-zero".into()));
    }
    let env_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    if settings.use_fake || env_fake {
        info!(dim = settings.output_dimensionality, "using hash embedder");
        return Ok(Box::new(HashEmbedder::new(settings.output_dimensionality)));
    }
    Ok(Box::new(GeminiEmbedder::new(settings)?))
}

pub(crate) fn ensure_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::Embedding("input text is empty".into()));
    }
    Ok(())
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub(crate) fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-6 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
