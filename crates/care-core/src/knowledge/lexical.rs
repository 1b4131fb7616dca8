use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use super::{IndexError, IndexFuture, SimilarityIndex};
use crate::models::IndexedPassage;

const MIN_TOKEN_CHARS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeChunk {
    #[serde(default)]
    pub chunk_id: Option<String>,
    #[serde(default, alias = "page")]
    pub page_number: Option<u32>,
    pub text: String,
}

impl KnowledgeChunk {
    fn locator(&self) -> String {
        match (self.page_number, self.chunk_id.as_deref()) {
            (Some(page), _) => format!("Page {page}"),
            (None, Some(chunk_id)) => chunk_id.to_string(),
            (None, None) => "Unknown".to_string(),
        }
    }
}

struct IndexedChunk {
    text: String,
    locator: String,
    term_counts: HashMap<String, f32>,
    norm: f32,
}

/// In-process index scoring chunks by term-frequency cosine similarity.
pub struct LexicalPassageIndex {
    chunks: Vec<IndexedChunk>,
}

impl LexicalPassageIndex {
    pub fn from_chunks(chunks: Vec<KnowledgeChunk>) -> Self {
        let chunks = chunks
            .into_iter()
            .filter(|chunk| !chunk.text.trim().is_empty())
            .map(|chunk| {
                let term_counts = term_counts(&chunk.text);
                let norm = vector_norm(&term_counts);
                IndexedChunk {
                    locator: chunk.locator(),
                    text: chunk.text,
                    term_counts,
                    norm,
                }
            })
            .collect();

        Self { chunks }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let chunks = serde_json::from_str::<Vec<KnowledgeChunk>>(&raw)
            .map_err(|err| IndexError::InvalidData(err.to_string()))?;
        let index = Self::from_chunks(chunks);
        info!(
            path = %path.display(),
            chunks = index.len(),
            "loaded knowledge chunks"
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn rank(&self, query: &str, k: usize) -> Vec<IndexedPassage> {
        let query_terms = term_counts(query);
        let query_norm = vector_norm(&query_terms);
        if query_norm == 0.0 || k == 0 {
            return Vec::new();
        }

        let mut scored = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                if chunk.norm == 0.0 {
                    return None;
                }
                let dot = query_terms
                    .iter()
                    .filter_map(|(term, weight)| {
                        chunk.term_counts.get(term).map(|count| weight * count)
                    })
                    .sum::<f32>();
                let score = dot / (query_norm * chunk.norm);
                (score > 0.0).then_some((chunk, score))
            })
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| right.1.total_cmp(&left.1));
        scored
            .into_iter()
            .take(k)
            .map(|(chunk, score)| IndexedPassage {
                text: chunk.text.clone(),
                locator: chunk.locator.clone(),
                score,
            })
            .collect()
    }
}

impl SimilarityIndex for LexicalPassageIndex {
    fn search<'a>(&'a self, query: &'a str, k: usize) -> IndexFuture<'a> {
        Box::pin(async move { Ok(self.rank(query, k)) })
    }
}

fn term_counts(text: &str) -> HashMap<String, f32> {
    let mut counts = HashMap::new();
    for token in text
        .to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
    {
        *counts.entry(token.to_string()).or_insert(0.0) += 1.0;
    }
    counts
}

fn vector_norm(counts: &HashMap<String, f32>) -> f32 {
    counts.values().map(|count| count * count).sum::<f32>().sqrt()
}
