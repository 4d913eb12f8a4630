#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::documents::Document;

/// A contiguous window of a document's text, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The window's content
    pub text: String,
    /// Identifier of the owning document
    pub source: String,
    /// First character of the window (inclusive)
    pub start_offset: usize,
    /// Last character of the window (exclusive)
    pub end_offset: usize,
    /// Position among the chunks emitted for the same document
    pub sequence_index: usize,
}

impl Chunk {
    #[inline]
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

/// Configuration for content chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters repeated at the start of the following chunk
    pub chunk_overlap: usize,
    /// Split points in priority order; an empty string means a hard cut
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            separators: default_separators(),
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ConfigError> {
        let config = Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 || self.chunk_size > 100_000 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }

        Ok(())
    }

    /// How far the window start moves when a chunk is cut at full length
    #[inline]
    pub fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// Heading breaks, then line breaks, then spaces, then a hard cut
#[inline]
pub fn default_separators() -> Vec<String> {
    ["\n## ", "\n### ", "\n", " ", ""]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Splits document text into overlapping windows using a validated configuration
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
    separators: Vec<Vec<char>>,
}

impl Chunker {
    #[inline]
    pub fn new(config: ChunkingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let separators = config
            .separators
            .iter()
            .map(|separator| separator.chars().collect())
            .collect();
        Ok(Self { config, separators })
    }

    #[inline]
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    #[inline]
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.chunk(&document.source, &document.text)
    }

    /// Chunk `text`, attributing every window to `source`.
    ///
    /// Consecutive windows share exactly `chunk_overlap` characters and the last window
    /// ends at the end of the text. Whitespace-only windows are dropped without
    /// consuming a sequence index.
    #[inline]
    pub fn chunk(&self, source: &str, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < len {
            let end = if len - start <= self.config.chunk_size {
                len
            } else {
                self.find_cut(&chars, start)
            };

            let window = &chars[start..end];
            if window.iter().any(|c| !c.is_whitespace()) {
                chunks.push(Chunk {
                    text: window.iter().collect(),
                    source: source.to_string(),
                    start_offset: start,
                    end_offset: end,
                    sequence_index: chunks.len(),
                });
            }

            if end == len {
                break;
            }
            start = end - self.config.chunk_overlap;
        }

        debug!(
            "Chunked '{}' ({} chars) into {} chunks",
            source,
            len,
            chunks.len()
        );

        chunks
    }

    /// Pick the end of the window starting at `start`.
    ///
    /// A cut lands where the highest-priority separator begins, so the separator opens
    /// the next window. Cuts must leave the window longer than the overlap, otherwise the
    /// next window would not advance.
    fn find_cut(&self, chars: &[char], start: usize) -> usize {
        let limit = start + self.config.chunk_size;
        let floor = start + self.config.chunk_overlap;

        for separator in &self.separators {
            if separator.is_empty() {
                break;
            }

            let found = (floor + 1..=limit)
                .rev()
                .find(|&position| chars[position..].starts_with(separator));
            if let Some(position) = found {
                return position;
            }
        }

        limit
    }
}

/// Chunk `text` with the default separators
#[inline]
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>, ConfigError> {
    let chunker = Chunker::new(ChunkingConfig::new(chunk_size, chunk_overlap)?)?;
    Ok(chunker.chunk("", text))
}
