#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance
// Run with: cargo test --test integration_ollama -- --ignored

use docs_rag::answer::{Answerer, OllamaChat};
use docs_rag::config::{Config, EmbeddingBackend, OllamaConfig, StoreBackend};
use docs_rag::context::RagContext;
use docs_rag::documents::Document;
use docs_rag::embeddings::{Embedder, OllamaClient, OllamaEmbedder};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::info;

const TEST_EMBEDDING_MODEL: &str = "nomic-embed-text:latest";
const TEST_EMBEDDING_DIMENSION: u32 = 768;
const TEST_CHAT_MODEL: &str = "llama3.2:latest";
const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn create_integration_test_config(temp_dir: &TempDir) -> Config {
    let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    let port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);

    let mut config = Config {
        ollama: OllamaConfig {
            host,
            port,
            embedding_model: env::var("OLLAMA_EMBEDDING_MODEL")
                .unwrap_or_else(|_| TEST_EMBEDDING_MODEL.to_string()),
            chat_model: env::var("OLLAMA_CHAT_MODEL")
                .unwrap_or_else(|_| TEST_CHAT_MODEL.to_string()),
            ..OllamaConfig::default()
        },
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.embedding.backend = EmbeddingBackend::Ollama;
    config.embedding.dimension = TEST_EMBEDDING_DIMENSION;
    config.embedding.batch_size = 5;
    config.store.backend = StoreBackend::Memory;
    config
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok(); // Ignore error if already initialized
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = create_integration_test_config(&temp_dir);

    let client = OllamaClient::new(&config)
        .expect("should create client")
        .with_timeout(Duration::from_secs(60));

    info!("Testing health check against real Ollama instance");
    client
        .health_check(&config.ollama.embedding_model)
        .expect("embedding model should be available");
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Ollama instance"]
async fn real_ollama_embeddings_have_configured_dimension() {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = create_integration_test_config(&temp_dir);
    let embedder = OllamaEmbedder::from_config(&config).expect("should create embedder");

    let texts = vec![
        "Install the plugin from the add-in manager.".to_string(),
        "Licenses are activated with a serial number.".to_string(),
    ];
    let batch = embedder.embed_batch(&texts).await.expect("should embed batch");
    let single = embedder.embed(&texts[1]).await.expect("should embed");

    assert_eq!(batch.len(), 2);
    assert!(batch.iter().all(|v| v.dimension() == TEST_EMBEDDING_DIMENSION as usize));
    assert_eq!(single.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Ollama instance"]
async fn real_ollama_pipeline_answers_from_context() {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = create_integration_test_config(&temp_dir);
    let context = RagContext::from_config(config.clone())
        .await
        .expect("should build context");

    let documents = vec![
        Document::new("install.md", "The plugin is installed from the add-in manager."),
        Document::new("licensing.md", "Licenses are activated with a serial number."),
    ];
    context
        .indexer()
        .expect("should build indexer")
        .index(&documents, context.collection())
        .await
        .expect("should index");

    let chunks = context
        .retriever()
        .retrieve(context.collection(), "How do I activate a license?", 1)
        .await
        .expect("should retrieve");
    assert_eq!(chunks[0].source, "licensing.md");

    let answerer = Answerer::new(Arc::new(
        OllamaChat::from_config(&config).expect("should create chat model"),
    ));
    let answer = answerer
        .ask("What color is the sky on Mars?", &chunks)
        .await
        .expect("should answer");
    info!("Answer: {}", answer.text);
    assert!(!answer.text.is_empty());
}
