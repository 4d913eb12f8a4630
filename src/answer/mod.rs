// Answer generation over retrieved chunks


use async_trait::async_trait;
use itertools::Itertools;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::conversation::Turn;
use crate::embeddings::OllamaClient;
use crate::embeddings::ollama::ChatMessage;
use crate::retriever::RetrievedChunk;
use crate::{DocsError, Result};

/// The exact reply expected when the context does not contain the answer
pub const NO_ANSWER: &str = "The answer is not available in the provided context.";

/// System prompt for multi-turn chat
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.\n\
Use the conversation history to resolve references.\n\
Use any provided 'Context' message(s) for factual content.\n\
If the answer is not present in the context, reply exactly:\n\
\"The answer is not available in the provided context.\"";

const UNKNOWN_SOURCE: &str = "(unknown)";

/// Chunk texts joined into one context block
#[inline]
pub fn context_text(chunks: &[RetrievedChunk]) -> String {
    chunks.iter().map(|chunk| chunk.text.as_str()).join("\n\n")
}

/// Single-turn prompt that restricts the model to the retrieved context
#[inline]
pub fn build_qa_prompt(chunks: &[RetrievedChunk], question: &str) -> String {
    format!(
        "You are a question-answering assistant.\n\
         You are given the following context extracted from documents:\n\n\
         {}\n\n\
         Answer the question below *only* using the context.\n\
         If the answer is not present in the context, reply exactly:\n\
         \"{}\"\n\n\
         Question: {}",
        context_text(chunks),
        NO_ANSWER,
        question
    )
}

/// Chat messages for `question`: system prompt, prior turns, the context, then the question
#[inline]
pub fn build_chat_messages(
    history: &[Turn],
    chunks: &[RetrievedChunk],
    question: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 3);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));

    for turn in history {
        messages.push(ChatMessage::user(turn.question.as_str()));
        messages.push(ChatMessage::assistant(turn.answer.as_str()));
    }

    if !chunks.is_empty() {
        messages.push(ChatMessage::system(format!(
            "Context:\n{}",
            context_text(chunks)
        )));
    }
    messages.push(ChatMessage::user(question));
    messages
}

/// Link to the rendered page of a Markdown source: `<html_dir>/<stem>.html`
#[inline]
pub fn source_link(source: &str, html_dir: &Path) -> String {
    let file_name = source
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let stem = file_name
        .rsplit_once('.')
        .map_or(file_name, |(stem, _extension)| stem);

    if stem.is_empty() {
        return UNKNOWN_SOURCE.to_string();
    }

    html_dir
        .join(format!("{}.html", stem))
        .display()
        .to_string()
}

/// Each retrieved chunk under its source link, for display next to an answer
#[inline]
pub fn render_context(chunks: &[RetrievedChunk], html_dir: &Path) -> String {
    if chunks.is_empty() {
        return "(no context retrieved)".to_string();
    }

    chunks
        .iter()
        .map(|chunk| {
            format!(
                "**Source: {}**\n\n{}",
                source_link(&chunk.source, html_dir),
                chunk.text
            )
        })
        .join("\n\n---\n\n")
}

/// Sources of `chunks` in rank order, without repeats
#[inline]
pub fn unique_sources(chunks: &[RetrievedChunk]) -> Vec<String> {
    chunks
        .iter()
        .map(|chunk| chunk.source.clone())
        .unique()
        .collect()
}

/// A model that continues a conversation
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_id(&self) -> String;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Chat model served by Ollama
#[derive(Debug, Clone)]
pub struct OllamaChat {
    client: OllamaClient,
    model: String,
}

impl OllamaChat {
    #[inline]
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            OllamaClient::new(config)?,
            config.ollama.chat_model.clone(),
        ))
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    #[inline]
    fn model_id(&self) -> String {
        format!("ollama/{}", self.model)
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let client = self.client.clone();
        let model = self.model.clone();
        let messages = messages.to_vec();

        tokio::task::spawn_blocking(move || client.chat(&model, &messages))
            .await
            .map_err(|e| DocsError::Network(format!("Chat task failed: {}", e)))?
            .map_err(|e| DocsError::Network(format!("{:#}", e)))
    }
}

/// A generated answer and the sources it was grounded on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
}

/// Turns retrieved chunks into answers
#[derive(Clone)]
pub struct Answerer {
    model: Arc<dyn ChatModel>,
}

impl Answerer {
    #[inline]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Answer a standalone question from `chunks`
    #[inline]
    pub async fn ask(&self, question: &str, chunks: &[RetrievedChunk]) -> Result<Answer> {
        let prompt = build_qa_prompt(chunks, question);
        debug!("Asking {} with {} context chunks", self.model.model_id(), chunks.len());

        let text = self.model.complete(&[ChatMessage::user(prompt)]).await?;
        Ok(Answer {
            text: text.trim().to_string(),
            sources: unique_sources(chunks),
        })
    }

    /// Answer `question` as the next turn after `history`
    #[inline]
    pub async fn chat(
        &self,
        history: &[Turn],
        question: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<Answer> {
        let messages = build_chat_messages(history, chunks, question);
        info!(
            "Chat turn {} with {} context chunks",
            history.len() + 1,
            chunks.len()
        );

        let text = self.model.complete(&messages).await?;
        Ok(Answer {
            text: text.trim().to_string(),
            sources: unique_sources(chunks),
        })
    }
}
