use clap::{Parser, Subcommand};
use docs_rag::Result;
use docs_rag::commands::{ask_question, chat_loop, index_documents, query_documents, show_status};
use docs_rag::config::{Config, run_interactive_config, show_config};
use docs_rag::context::RagContext;
use docs_rag::indexer::IndexOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docs-rag")]
#[command(about = "Question answering over converted documentation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and pipeline settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk, embed and store a folder of Markdown files
    Index {
        /// Folder to index instead of the configured documents directory
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Collection to write instead of the configured one
        #[arg(long)]
        collection: Option<String>,
        /// Drop the collection and all of its records first
        #[arg(long)]
        recreate: bool,
        /// Skip batches before this one, after a failed run
        #[arg(long, default_value_t = 0, conflicts_with = "recreate")]
        resume_from: usize,
    },
    /// Show the chunks that best match a query
    Query {
        text: String,
        /// Number of chunks to return
        #[arg(short)]
        k: Option<usize>,
    },
    /// Answer one question from the indexed documents
    Ask {
        question: String,
        /// Number of chunks to use as context
        #[arg(short)]
        k: Option<usize>,
    },
    /// Interactive multi-turn chat
    Chat {
        /// Conversation thread identifier
        #[arg(long, default_value = "default")]
        thread: String,
    },
    /// Show backend health and collection status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Index {
            dir,
            collection,
            recreate,
            resume_from,
        } => {
            let context = RagContext::from_config(Config::load()?).await?;
            let options = IndexOptions {
                recreate,
                resume_from,
            };
            index_documents(&context, dir, collection, &options).await?;
        }
        Commands::Query { text, k } => {
            let context = RagContext::from_config(Config::load()?).await?;
            query_documents(&context, &text, k).await?;
        }
        Commands::Ask { question, k } => {
            let context = RagContext::from_config(Config::load()?).await?;
            ask_question(&context, &question, k).await?;
        }
        Commands::Chat { thread } => {
            let context = RagContext::from_config(Config::load()?).await?;
            chat_loop(&context, &thread).await?;
        }
        Commands::Status => {
            show_status(&Config::load()?).await?;
        }
    }

    Ok(())
}
