
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ConfigError, EmbeddingBackend, OllamaConfig, StoreBackend};
use crate::embeddings::chunking::ChunkingConfig;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Docs RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure the Ollama instance used for answers and optional dense embeddings.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Retrieval Pipeline").bold().yellow());
    configure_pipeline(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama)? {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before asking questions.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.ollama.embedding_model).cyan()
    );
    eprintln!("  Chat Model: {}", style(&config.ollama.chat_model).cyan());
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Embedding:").bold().yellow());
    eprintln!("  Backend: {:?}", config.embedding.backend);
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!(
        "  Chunk Overlap: {}",
        style(config.chunking.chunk_overlap).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Vector Store:").bold().yellow());
    eprintln!("  Backend: {:?}", config.store.backend);
    eprintln!("  Collection: {}", style(&config.store.collection).cyan());
    eprintln!(
        "  Documents: {}",
        style(config.retrieval.documents_dir.display()).cyan()
    );
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config::default())
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model for answers")
        .default(ollama.chat_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model (ollama backend only)")
        .default(ollama.embedding_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_chat_model(chat_model)?;
    ollama.set_embedding_model(embedding_model)?;

    Ok(())
}

fn configure_pipeline(config: &mut Config) -> Result<()> {
    let backends = &["hashing (late interaction)", "ollama (dense)"];
    let default_backend = match config.embedding.backend {
        EmbeddingBackend::Hashing => 0,
        EmbeddingBackend::Ollama => 1,
    };
    config.embedding.backend = match Select::new()
        .with_prompt("Embedding backend")
        .default(default_backend)
        .items(backends)
        .interact()?
    {
        0 => EmbeddingBackend::Hashing,
        _ => EmbeddingBackend::Ollama,
    };

    let dimension: u32 = Input::new()
        .with_prompt("Vector dimension")
        .default(config.embedding.dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (8..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 8 and 4096")
            }
        })
        .interact_text()?;
    config.embedding.set_dimension(dimension)?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(config.embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    config.embedding.set_batch_size(batch_size)?;

    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(config.chunking.chunk_size)
        .interact_text()?;
    let chunk_overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(config.chunking.chunk_overlap)
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            ChunkingConfig {
                chunk_size,
                chunk_overlap: *input,
                ..ChunkingConfig::default()
            }
            .validate()
        })
        .interact_text()?;
    config.chunking.chunk_size = chunk_size;
    config.chunking.chunk_overlap = chunk_overlap;

    let stores = &["lancedb", "memory", "qdrant"];
    let default_store = match config.store.backend {
        StoreBackend::Lancedb => 0,
        StoreBackend::Memory => 1,
        StoreBackend::Qdrant => 2,
    };
    config.store.backend = match Select::new()
        .with_prompt("Vector store")
        .default(default_store)
        .items(stores)
        .interact()?
    {
        0 => StoreBackend::Lancedb,
        1 => StoreBackend::Memory,
        _ => StoreBackend::Qdrant,
    };

    config.store.collection = Input::new()
        .with_prompt("Collection name")
        .default(config.store.collection.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            if crate::database::is_valid_collection_name(input) {
                Ok(())
            } else {
                Err(ConfigError::InvalidCollectionName(input.clone()))
            }
        })
        .interact_text()?;

    Ok(())
}

fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Model name cannot be empty")
    } else {
        Ok(())
    }
}

fn test_ollama_connection(ollama: &OllamaConfig) -> Result<bool> {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => Ok(true),
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => Ok(true),
        Err(_) => Ok(false),
    }
}
