
use std::sync::Arc;
use tracing::debug;

use crate::Result;
use crate::answer::{Answerer, OllamaChat};
use crate::collection::CollectionManager;
use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::database::{VectorStore, open_store};
use crate::embeddings::{Embedder, build_embedder};
use crate::indexer::Indexer;
use crate::retriever::Retriever;

/// The embedder, store and conversation state for one process, built once from the
/// configuration and handed to every component that needs them
pub struct RagContext {
    config: Config,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    conversations: ConversationStore,
}

impl RagContext {
    #[inline]
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            config,
            embedder,
            store,
            conversations: ConversationStore::new(),
        }
    }

    /// Validate `config`, then build the embedder and open the store it selects
    #[inline]
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let embedder = build_embedder(&config)?;
        let store = open_store(&config).await?;
        debug!(
            "Context ready: {} on {} store",
            embedder.model_id(),
            store.backend()
        );

        Ok(Self::new(config, embedder, store))
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Collection named in the configuration
    #[inline]
    pub fn collection(&self) -> &str {
        &self.config.store.collection
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    #[inline]
    pub fn collections(&self) -> CollectionManager {
        CollectionManager::new(Arc::clone(&self.store))
    }

    #[inline]
    pub fn indexer(&self) -> Result<Indexer> {
        Indexer::from_config(
            &self.config,
            Arc::clone(&self.embedder),
            Arc::clone(&self.store),
        )
    }

    #[inline]
    pub fn retriever(&self) -> Retriever {
        Retriever::new(Arc::clone(&self.embedder), Arc::clone(&self.store))
    }

    #[inline]
    pub fn answerer(&self) -> Result<Answerer> {
        Ok(Answerer::new(Arc::new(OllamaChat::from_config(&self.config)?)))
    }

    #[inline]
    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }
}
