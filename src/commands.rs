use anyhow::{Context, Result};
use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::answer::{Answer, render_context, source_link};
use crate::collection::CollectionManager;
use crate::config::Config;
use crate::context::RagContext;
use crate::conversation::Turn;
use crate::database::open_store;
use crate::documents::load_markdown_documents;
use crate::embeddings::{OllamaClient, build_embedder};
use crate::indexer::IndexOptions;
use crate::retriever::RetrievedChunk;

/// Index the Markdown files of `dir` (or the configured documents directory)
#[inline]
pub async fn index_documents(
    context: &RagContext,
    dir: Option<PathBuf>,
    collection: Option<String>,
    options: &IndexOptions,
) -> Result<()> {
    let dir = dir.unwrap_or_else(|| context.config().retrieval.documents_dir.clone());
    let collection = collection.unwrap_or_else(|| context.collection().to_string());

    let documents = load_markdown_documents(&dir)
        .with_context(|| format!("Failed to load documents from {}", dir.display()))?;
    if documents.is_empty() {
        println!("No Markdown files found in {}", dir.display());
        return Ok(());
    }

    println!(
        "📚 Indexing {} documents from {} into '{}'",
        documents.len(),
        dir.display(),
        collection
    );

    let report = context
        .indexer()?
        .with_progress(true)
        .index_with(&documents, &collection, options)
        .await
        .context("Indexing failed")?;

    if report.created_collection {
        println!("   🆕 Created collection '{}'", collection);
    }
    println!(
        "   ✅ Wrote {} of {} chunks in {} of {} batches",
        report.records_written,
        report.chunks_total,
        report.batches_written,
        report.batches_total.saturating_sub(options.resume_from)
    );

    for skipped in &report.skipped {
        println!(
            "   ⚠️  Skipped chunk {} of {}: {}",
            skipped.chunk, skipped.source, skipped.reason
        );
    }

    if let Some(first) = report.failed.first() {
        for failure in &report.failed {
            error!("{}", failure);
            println!("   ❌ {}", failure);
        }
        println!(
            "   💡 Retry with: docs-rag index --collection {} --resume-from {}",
            collection, first.batch
        );
    }

    report.ensure_complete()?;
    Ok(())
}

/// Print the best chunks for `text`
#[inline]
pub async fn query_documents(context: &RagContext, text: &str, k: Option<usize>) -> Result<()> {
    let k = k.unwrap_or(context.config().retrieval.top_k as usize);
    let results = context
        .retriever()
        .retrieve(context.collection(), text, k)
        .await?;

    if results.is_empty() {
        println!("No results: collection '{}' is empty.", context.collection());
        return Ok(());
    }

    let html_dir = &context.config().retrieval.html_dir;
    for (rank, chunk) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} (chunk {})",
            rank + 1,
            chunk.score,
            source_link(&chunk.source, html_dir),
            chunk.sequence_index
        );
        println!("   {}", preview(&chunk.text, 200));
        println!();
    }

    Ok(())
}

/// Answer a single question from the collection
#[inline]
pub async fn ask_question(context: &RagContext, question: &str, k: Option<usize>) -> Result<()> {
    let k = k.unwrap_or(context.config().retrieval.top_k as usize);
    let chunks = context
        .retriever()
        .retrieve(context.collection(), question, k)
        .await?;

    let answer = context.answerer()?.ask(question, &chunks).await?;
    print_answer(context, &answer, &chunks);
    Ok(())
}

/// Run one turn of `thread`: rewrite the question against the previous one, retrieve,
/// answer with the thread's history and record the turn
#[inline]
pub async fn chat_turn(
    context: &RagContext,
    thread: &str,
    question: &str,
    k: usize,
) -> Result<(Answer, Vec<RetrievedChunk>)> {
    let conversations = context.conversations();
    let query = conversations.effective_query(thread, question);
    info!("Effective query for thread '{}': {}", thread, query);

    let chunks = context
        .retriever()
        .retrieve(context.collection(), &query, k)
        .await?;

    let history = conversations.history(thread);
    let answer = context
        .answerer()?
        .chat(&history, question, &chunks)
        .await?;

    conversations.record(thread, Turn::new(question, answer.text.as_str()));
    Ok((answer, chunks))
}

/// Interactive chat on one thread until `exit`
#[inline]
pub async fn chat_loop(context: &RagContext, thread: &str) -> Result<()> {
    let k = context.config().retrieval.top_k as usize;
    let theme = ColorfulTheme::default();

    println!("💬 Chatting on thread '{}'. Type 'exit' to quit.", thread);
    println!();

    loop {
        let question: String = Input::with_theme(&theme)
            .with_prompt("You")
            .interact_text()
            .context("Failed to read question")?;
        let question = question.trim();

        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        match chat_turn(context, thread, question, k).await {
            Ok((answer, chunks)) => print_answer(context, &answer, &chunks),
            Err(e) => {
                warn!("Chat turn failed: {:#}", e);
                println!("Error: {:#}", e);
            }
        }
    }

    Ok(())
}

/// Report configuration, backend health and the configured collection
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 Docs-RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Embedding:");
    match build_embedder(config) {
        Ok(embedder) => {
            println!("   ✅ Model: {}", embedder.model_id());
            println!("   🔢 Dimension: {}", embedder.dimensionality());
            println!("   📦 Batch Size: {}", config.embedding.batch_size);
        }
        Err(e) => println!("   ❌ Failed to build embedder - {}", e),
    }

    println!("💬 Ollama:");
    match OllamaClient::new(config) {
        Ok(client) => match client.health_check(&config.ollama.chat_model) {
            Ok(()) => println!(
                "   ✅ Connected ({}:{}), chat model {}",
                config.ollama.host, config.ollama.port, config.ollama.chat_model
            ),
            Err(e) => println!("   ⚠️  Unavailable - {:#}", e),
        },
        Err(e) => println!("   ❌ Invalid settings - {}", e),
    }

    println!("🔍 Vector Store:");
    let store = match open_store(config).await {
        Ok(store) => {
            println!("   ✅ {}: Connected", store.backend());
            store
        }
        Err(e) => {
            println!("   ❌ Failed to open - {}", e);
            return Ok(());
        }
    };

    println!();
    println!("🗂️  Collection '{}':", config.store.collection);
    let status = CollectionManager::new(store)
        .status(&config.store.collection)
        .await?;
    match status.geometry {
        Some(geometry) => {
            println!("   ✅ Exists ({})", geometry);
            println!("   📊 Records: {}", status.records);
        }
        None => {
            println!("   💤 Not created yet");
            println!("   💡 Use 'docs-rag index' to build it.");
        }
    }

    Ok(())
}

fn print_answer(context: &RagContext, answer: &Answer, chunks: &[RetrievedChunk]) {
    println!();
    println!("{}", answer.text);
    println!();

    if !chunks.is_empty() {
        let html_dir = &context.config().retrieval.html_dir;
        println!("Sources:");
        for source in &answer.sources {
            println!("  - {}", source_link(source, html_dir));
        }
        println!();
    }

    info!("Context:\n{}", render_context(chunks, &context.config().retrieval.html_dir));
}

/// First `max_chars` characters of `text` on one line
fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }

    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("a\n\nb   c", 10), "a b c");
        assert_eq!(preview("abcdefghij", 4), "abcd…");
    }
}
