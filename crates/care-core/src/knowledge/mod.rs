use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::models::IndexedPassage;

mod lexical;

pub use lexical::{KnowledgeChunk, LexicalPassageIndex};

pub type IndexFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<IndexedPassage>, IndexError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("similarity index unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read knowledge chunks: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid knowledge chunk data: {0}")]
    InvalidData(String),
}

/// Similarity search over the reference knowledge base. Results come back ordered
/// best-first and may be empty.
pub trait SimilarityIndex: Send + Sync {
    fn search<'a>(&'a self, query: &'a str, k: usize) -> IndexFuture<'a>;
}
