
use std::cmp::Ordering;

use super::{Comparator, ScoredRecord};
use crate::embeddings::MultiVector;

/// Similarity of two equal-width vectors; larger is closer for every comparator
#[inline]
pub fn similarity(comparator: Comparator, a: &[f32], b: &[f32]) -> f32 {
    match comparator {
        Comparator::Dot => dot(a, b),
        Comparator::Cosine => {
            let norm_a = dot(a, a).sqrt();
            let norm_b = dot(b, b).sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                return 0.0;
            }
            dot(a, b) / (norm_a * norm_b)
        }
        Comparator::Euclidean => -a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
    }
}

/// Late-interaction score: for each query vector take its best match in `document`,
/// then sum those maxima
#[inline]
pub fn max_sim(comparator: Comparator, query: &MultiVector, document: &MultiVector) -> f32 {
    query
        .rows()
        .iter()
        .map(|q| {
            document
                .rows()
                .iter()
                .map(|d| similarity(comparator, q, d))
                .fold(f32::NEG_INFINITY, f32::max)
        })
        .filter(|best| best.is_finite())
        .sum()
}

/// Order hits best first and keep at most `limit`
#[inline]
pub fn rank(mut hits: Vec<ScoredRecord>, limit: usize) -> Vec<ScoredRecord> {
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hits.truncate(limit);
    hits
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
