//! Policy retrieval service
//!
//! Embeds the corpus once at construction and mirrors it into the external
//! index when one is available. If the index fails to initialize or to answer a
//! query, the service switches to in-memory cosine search for the rest of the
//! process lifetime.

use crate::corpus::{load_documents, PolicyDocument};
use crate::embedder::{HashingEmbedder, DEFAULT_EMBEDDING_DIM};
use crate::index::{DocumentMetadata, IndexMatch, IndexRecord, VectorIndex};
use crate::lmdb_index::{LmdbVectorIndex, DEFAULT_COLLECTION};
use agrisage_core::{round_to, Outcome, Vector};
use ahash::AHashSet;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_TOP_K: usize = 4;
pub const SNIPPET_CHARS: usize = 240;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub embedding_dim: usize,
    pub default_top_k: usize,
    /// Collection name inside the external index
    pub collection: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            default_top_k: DEFAULT_TOP_K,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalBackend {
    ExternalIndex,
    InMemory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub scheme_id: String,
    pub title: String,
    pub source: String,
    pub snippet: String,
    pub score: f64,
}

fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_CHARS).collect()
}

fn score(similarity: f32) -> f64 {
    round_to(f64::from(similarity), 4)
}

pub struct PolicyRetrievalService {
    documents: Vec<PolicyDocument>,
    embeddings: Vec<Vector>,
    embedder: HashingEmbedder,
    config: RetrievalConfig,
    index: RwLock<Option<Arc<dyn VectorIndex>>>,
}

impl PolicyRetrievalService {
    /// Embed `documents` and mirror them into `index`.
    ///
    /// The first document with a given id wins; later duplicates are dropped.
    pub fn new(
        documents: Vec<PolicyDocument>,
        index: Option<Arc<dyn VectorIndex>>,
        config: RetrievalConfig,
    ) -> Self {
        let embedder = HashingEmbedder::new(config.embedding_dim);

        let mut seen = AHashSet::new();
        let documents: Vec<PolicyDocument> = documents
            .into_iter()
            .filter(|doc| {
                let first = seen.insert(doc.id.clone());
                if !first {
                    warn!(id = %doc.id, "Duplicate policy document id, keeping the first");
                }
                first
            })
            .collect();
        let embeddings: Vec<Vector> = documents.iter().map(|doc| embedder.embed(&doc.content)).collect();

        let index = index.and_then(|index| {
            let records: Vec<IndexRecord> = documents
                .iter()
                .zip(&embeddings)
                .map(|(doc, embedding)| IndexRecord {
                    id: doc.id.clone(),
                    embedding: embedding.clone(),
                    document: doc.content.clone(),
                    metadata: DocumentMetadata {
                        scheme_id: doc.scheme_id.clone(),
                        title: doc.title.clone(),
                        source: doc.source.clone(),
                    },
                })
                .collect();
            match index.upsert(&records) {
                Ok(()) => {
                    info!(documents = records.len(), "Retrieval backend: external index");
                    Some(index)
                }
                Err(e) => {
                    warn!(error = %e, "Vector index init failed, using in-memory retrieval");
                    None
                }
            }
        });
        if index.is_none() {
            info!(documents = documents.len(), "Retrieval backend: in-memory");
        }

        Self {
            documents,
            embeddings,
            embedder,
            config,
            index: RwLock::new(index),
        }
    }

    /// Load the corpus from `docs_path` and, when `store_dir` is given, open the LMDB index there
    pub fn open<P: AsRef<Path>>(docs_path: P, store_dir: Option<&Path>, config: RetrievalConfig) -> Self {
        let documents = load_documents(docs_path);
        let index: Option<Arc<dyn VectorIndex>> = store_dir.and_then(|dir| {
            match LmdbVectorIndex::open(dir, &config.collection, config.embedding_dim) {
                Ok(index) => Some(Arc::new(index) as Arc<dyn VectorIndex>),
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Vector index unavailable, using in-memory retrieval");
                    None
                }
            }
        });
        Self::new(documents, index, config)
    }

    pub fn backend(&self) -> RetrievalBackend {
        if self.index.read().is_some() {
            RetrievalBackend::ExternalIndex
        } else {
            RetrievalBackend::InMemory
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// The `top_k` most similar documents, best first. Never fails.
    pub fn query(&self, text: &str, top_k: usize) -> Vec<RetrievalHit> {
        self.query_outcome(text, top_k).into_value()
    }

    /// [`query`](Self::query) with the configured `default_top_k`
    pub fn query_default(&self, text: &str) -> Vec<RetrievalHit> {
        self.query(text, self.config.default_top_k)
    }

    /// Like [`query`](Self::query), but reports whether the in-memory path answered
    pub fn query_outcome(&self, text: &str, top_k: usize) -> Outcome<Vec<RetrievalHit>> {
        if self.documents.is_empty() {
            return Outcome::Ok(Vec::new());
        }
        let embedding = self.embedder.embed(text);

        let index = self.index.read().clone();
        let reason = match index {
            Some(index) => match index.query(&embedding, top_k) {
                Ok(matches) => return Outcome::Ok(matches.into_iter().map(index_hit).collect()),
                Err(e) => {
                    warn!(error = %e, "Vector index query failed, switching to in-memory retrieval");
                    *self.index.write() = None;
                    format!("vector index query failed: {}", e)
                }
            },
            None => "no external vector index".to_string(),
        };

        Outcome::degraded(self.in_memory_query(&embedding, top_k), reason)
    }

    fn in_memory_query(&self, embedding: &Vector, top_k: usize) -> Vec<RetrievalHit> {
        let mut scored: Vec<(f32, &PolicyDocument)> = self
            .embeddings
            .iter()
            .map(|doc_embedding| embedding.dot(doc_embedding))
            .zip(&self.documents)
            .collect();
        // stable: equal scores keep corpus order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        debug!(candidates = scored.len(), top_k, "In-memory retrieval");

        scored
            .into_iter()
            .take(top_k)
            .map(|(similarity, doc)| RetrievalHit {
                scheme_id: doc.scheme_id.clone(),
                title: doc.title.clone(),
                source: doc.source.clone(),
                snippet: snippet(&doc.content),
                score: score(similarity),
            })
            .collect()
    }
}

fn index_hit(m: IndexMatch) -> RetrievalHit {
    RetrievalHit {
        scheme_id: m.metadata.scheme_id,
        title: m.metadata.title,
        source: m.metadata.source,
        snippet: snippet(&m.document),
        score: score(1.0 - m.distance),
    }
}
