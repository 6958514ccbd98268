//! In-memory cosine-similarity vector index.

use serde::{Deserialize, Serialize};

/// A stored chunk with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    text: String,
    embedding: Vec<f32>,
}

/// Flat vector index over text chunks.
///
/// Linear scan with cosine similarity. At the scale of one account's task
/// export (hundreds of chunks) this beats carrying an ANN dependency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorIndex {
    entries: Vec<Entry>,
}

impl VectorIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from parallel chunk/embedding slices.
    ///
    /// Pairs are zipped; if the lengths differ the excess is dropped, so
    /// callers should verify counts upstream.
    pub fn from_pairs(chunks: Vec<String>, embeddings: Vec<Vec<f32>>) -> Self {
        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| Entry { text, embedding })
            .collect();
        Self { entries }
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the `top_k` most similar chunks to `query`, best first.
    ///
    /// Zero-norm vectors score 0.0 and NaN scores sort last, so a degenerate
    /// embedding never outranks a real match.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<(String, f32)> {
        let mut scored: Vec<(String, f32)> = self
            .entries
            .iter()
            .map(|entry| (entry.text.clone(), cosine_similarity(query, &entry.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

/// Cosine similarity between two vectors, 0.0 when either norm is zero or
/// the lengths differ.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
