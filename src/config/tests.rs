use super::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");

        let mut original_config = Config {
            ollama: OllamaConfig {
                protocol: "https".to_string(),
                host: "test-host".to_string(),
                port: 8080,
                embedding_model: "test-model".to_string(),
                chat_model: "test-chat".to_string(),
                timeout_seconds: 30,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                collection: "manuals".to_string(),
                ..StoreConfig::default()
            },
            base_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        original_config.embedding.backend = EmbeddingBackend::Ollama;
        original_config.embedding.dimension = 768;
        original_config.retrieval.html_dir = PathBuf::from("site/pages");

        original_config.save().expect("config should save");
        let loaded_config = Config::load_from(temp_dir.path()).expect("config should load");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn sections_are_written_by_name() {
        let toml_content =
            toml::to_string_pretty(&Config::default()).expect("config should serialize");

        for section in ["[ollama]", "[embedding]", "[chunking]", "[store]", "[retrieval]"] {
            assert!(toml_content.contains(section), "missing {}", section);
        }
        assert!(toml_content.contains("collection = \"docs_markdown_chunks\""));
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [store
            backend = "lancedb"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let result: Result<Config, toml::de::Error> = toml::from_str(
            r#"
            [embedding]
            backend = "colbert"
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn partial_config_with_defaults() {
        let partial_toml = r#"
            [chunking]
            chunk_size = 500
            chunk_overlap = 50
        "#;

        let config: Config = toml::from_str(partial_toml).expect("partial config should parse");
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.chunking.separators.len(), 5);
        assert_eq!(config.embedding, EmbeddingConfig::default());
        assert_eq!(config.retrieval, RetrievalConfig::default());
        assert_eq!(config.store.collection, DEFAULT_COLLECTION);
    }

    #[test]
    fn invalid_chunking_in_file_fails_to_load() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        fs::write(
            temp_dir.path().join("config.toml"),
            "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
        )
        .expect("should write config");

        assert!(Config::load_from(temp_dir.path()).is_err());
    }

    #[test]
    fn store_validation() {
        let mut config = Config::default();
        config.store.collection = "bad name".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCollectionName(_))
        ));

        let mut config = Config::default();
        config.store.backend = StoreBackend::Qdrant;
        config.store.qdrant_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));

        let mut config = Config::default();
        config.store.upsert_retries = 11;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRetries(11))
        ));
    }

    #[test]
    fn ollama_url_generation_with_different_hosts() {
        let configs = vec![
            ("http", "localhost", 11434, "http://localhost:11434/"),
            ("http", "127.0.0.1", 8080, "http://127.0.0.1:8080/"),
            (
                "https",
                "secure.example.com",
                443,
                "https://secure.example.com/",
            ),
        ];

        for (protocol, host, port, expected_url) in configs {
            let config = Config {
                ollama: OllamaConfig {
                    protocol: protocol.to_string(),
                    host: host.to_string(),
                    port,
                    ..OllamaConfig::default()
                },
                ..Config::default()
            };

            let url = config.ollama_url().expect("ollama_url is ok");
            assert_eq!(url.as_str(), expected_url);
        }
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::InvalidProtocol("ftp".to_string()),
            ConfigError::InvalidEmbeddingDimension(4),
            ConfigError::InvalidChunkSize(0),
            ConfigError::OverlapTooLarge(100, 100),
            ConfigError::InvalidCollectionName("a b".to_string()),
            ConfigError::InvalidTopK(0),
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(message.len() > 10);
        }
    }
}
