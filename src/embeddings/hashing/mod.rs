
use async_trait::async_trait;

use super::{Embedder, EmbeddingError, MultiVector};

const MODEL_FAMILY: &str = "hashing-v1";
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Local late-interaction embedder.
///
/// Every token becomes one unit-length vector built by feature hashing the token and
/// its character trigrams with blake3. Tokens are case-folded, so `Install` and
/// `install` embed identically.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Per-token vectors for `text`, in token order
    #[inline]
    pub fn embed_sync(&self, text: &str) -> Result<MultiVector, EmbeddingError> {
        let rows: Vec<Vec<f32>> = tokenize(text)
            .iter()
            .map(|token| self.token_vector(token))
            .collect();

        MultiVector::new(rows, self.dimension)
    }

    fn token_vector(&self, token: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        self.add_feature(&mut vector, token.as_bytes(), 1.0);

        let marked: Vec<char> = std::iter::once('^')
            .chain(token.chars())
            .chain(std::iter::once('$'))
            .collect();
        if marked.len() > 3 {
            for trigram in marked.windows(3) {
                let feature: String = trigram.iter().collect();
                self.add_feature(&mut vector, feature.as_bytes(), TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = blake3::hash(feature);
        let bytes = hash.as_bytes();
        let mut head = [0_u8; 8];
        head.copy_from_slice(&bytes[..8]);

        let index = (u64::from_le_bytes(head) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    #[inline]
    fn model_id(&self) -> String {
        format!("{}/{}", MODEL_FAMILY, self.dimension)
    }

    #[inline]
    fn dimensionality(&self) -> usize {
        self.dimension
    }

    #[inline]
    async fn embed(&self, text: &str) -> Result<MultiVector, EmbeddingError> {
        self.embed_sync(text)
    }
}

/// Lowercased alphanumeric runs; every other visible character is a token of its own
#[inline]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
            continue;
        }

        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if !c.is_whitespace() {
            tokens.push(c.to_string());
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}
