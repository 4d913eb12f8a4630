use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocsError>;

#[derive(Error, Debug)]
pub enum DocsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration error: {0}")]
    SchemaMismatch(#[from] database::GeometryMismatch),

    #[error("Collection already exists: {0}")]
    CollectionAlreadyExists(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] embeddings::EmbeddingError),

    #[error(transparent)]
    Indexing(#[from] indexer::IndexingError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl DocsError {
    /// Whether this error reports a configuration problem, including a collection whose
    /// geometry does not match the active embedder.
    #[inline]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::SchemaMismatch(_))
    }
}

impl From<config::ConfigError> for DocsError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub mod answer;
pub mod collection;
pub mod commands;
pub mod config;
pub mod context;
pub mod conversation;
pub mod database;
pub mod documents;
pub mod embeddings;
pub mod indexer;
pub mod retriever;
