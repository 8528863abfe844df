//! Precedent retrieval: chunk-level KNN search collapsed into distinct,
//! ranked precedents, plus the text-in/precedents-out service built on it.

pub mod retriever;
pub mod service;

pub use retriever::PrecedentRetriever;
pub use service::{from_settings, PrecedentSearch};
