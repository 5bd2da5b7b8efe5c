//! # AgriSage Retrieval
//!
//! Policy document search over hashed bag-of-words embeddings.
//!
//! - [`HashingEmbedder`] - deterministic token-hashing embeddings
//! - [`LmdbVectorIndex`] - persistent index behind the [`VectorIndex`] trait
//! - [`PolicyRetrievalService`] - queries the index, or searches in memory when
//!   no index is usable

pub mod corpus;
pub mod embedder;
pub mod index;
pub mod lmdb_index;
pub mod service;

pub use corpus::{load_documents, PolicyDocument};
pub use embedder::{tokenize, HashingEmbedder, DEFAULT_EMBEDDING_DIM};
pub use index::{cosine_distance, DocumentMetadata, IndexError, IndexMatch, IndexRecord, VectorIndex};
pub use lmdb_index::{LmdbVectorIndex, DEFAULT_COLLECTION};
pub use service::{PolicyRetrievalService, RetrievalBackend, RetrievalConfig, RetrievalHit, DEFAULT_TOP_K, SNIPPET_CHARS};
