//! External vector index interface

use agrisage_core::Vector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("failed to open index: {0}")]
    Open(String),

    #[error("index storage error: {0}")]
    Storage(String),

    #[error("index encoding error: {0}")]
    Encoding(String),

    #[error("embedding dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<heed::Error> for IndexError {
    fn from(err: heed::Error) -> Self {
        IndexError::Storage(err.to_string())
    }
}

impl From<bincode::Error> for IndexError {
    fn from(err: bincode::Error) -> Self {
        IndexError::Encoding(err.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub scheme_id: String,
    pub title: String,
    pub source: String,
}

/// One document as mirrored into the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub embedding: Vector,
    pub document: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    pub document: String,
    pub metadata: DocumentMetadata,
    /// Cosine distance, `1 - cosine similarity`
    pub distance: f32,
}

/// A persistent nearest-neighbor index keyed by document id
pub trait VectorIndex: Send + Sync {
    /// Insert or replace records by id
    fn upsert(&self, records: &[IndexRecord]) -> Result<(), IndexError>;

    /// The `top_k` records closest to `embedding`, nearest first
    fn query(&self, embedding: &Vector, top_k: usize) -> Result<Vec<IndexMatch>, IndexError>;

    fn len(&self) -> Result<usize, IndexError>;

    fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len()? == 0)
    }
}

/// `1 - cosine similarity`; a zero vector is at distance 1 from everything
pub fn cosine_distance(a: &Vector, b: &Vector) -> f32 {
    1.0 - a.cosine_similarity(b)
}
