// Configuration management module
// TOML settings for the embedding backend, chunker, vector store and retrieval

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, DEFAULT_COLLECTION, EmbeddingBackend, EmbeddingConfig, OllamaConfig,
    RetrievalConfig, StoreBackend, StoreConfig,
};

