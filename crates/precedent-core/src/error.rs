use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing credentials or model/index identifiers.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Index backend or embedding backend unreachable.
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// The embedding backend failed or answered without a usable vector.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// The index backend answered but rejected the request or sent an unreadable body.
    #[error("Search failed: {0}")]
    Search(String),
}

impl Error {
    /// `Connection` and `IndexNotFound` are service-unavailable class;
    /// everything else is an internal error.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::IndexNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
