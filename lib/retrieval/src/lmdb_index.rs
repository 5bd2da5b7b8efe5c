// LMDB-backed vector index for the policy corpus
use agrisage_core::Vector;
use crate::index::{cosine_distance, DocumentMetadata, IndexError, IndexMatch, IndexRecord, VectorIndex};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_COLLECTION: &str = "policy_chunks";

const MAP_SIZE: usize = 1024 * 1024 * 1024; // 1GB
const MAX_DBS: u32 = 4;

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    embedding: Vector,
    document: String,
    metadata: DocumentMetadata,
}

pub struct LmdbVectorIndex {
    env: Arc<Env>,
    records_db: Database<Str, Bytes>,
    dim: usize,
}

impl LmdbVectorIndex {
    /// Open (or create) `collection` under `path`
    pub fn open<P: AsRef<Path>>(path: P, collection: &str, dim: usize) -> Result<Self, IndexError> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(|e| IndexError::Open(format!("{}: {}", path.display(), e)))?;

        let env = Arc::new(unsafe {
            EnvOpenOptions::new()
                .map_size(MAP_SIZE)
                .max_dbs(MAX_DBS)
                .open(path)
                .map_err(|e| IndexError::Open(format!("{}: {}", path.display(), e)))?
        });

        let mut wtxn = env.write_txn()?;
        let records_db = env.create_database(&mut wtxn, Some(collection))?;
        wtxn.commit()?;

        Ok(Self { env, records_db, dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn check_dim(&self, actual: usize) -> Result<(), IndexError> {
        if actual != self.dim {
            return Err(IndexError::DimensionMismatch { expected: self.dim, actual });
        }
        Ok(())
    }
}

impl VectorIndex for LmdbVectorIndex {
    fn upsert(&self, records: &[IndexRecord]) -> Result<(), IndexError> {
        let mut wtxn = self.env.write_txn()?;
        for record in records {
            self.check_dim(record.embedding.dim())?;
            let stored = StoredRecord {
                embedding: record.embedding.clone(),
                document: record.document.clone(),
                metadata: record.metadata.clone(),
            };
            let data = bincode::serialize(&stored)?;
            self.records_db.put(&mut wtxn, &record.id, &data)?;
        }
        wtxn.commit()?;
        Ok(())
    }

    fn query(&self, embedding: &Vector, top_k: usize) -> Result<Vec<IndexMatch>, IndexError> {
        self.check_dim(embedding.dim())?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let rtxn = self.env.read_txn()?;
        let mut matches = Vec::new();
        for result in self.records_db.iter(&rtxn)? {
            let (id, data) = result?;
            let stored: StoredRecord = bincode::deserialize(data)?;
            self.check_dim(stored.embedding.dim())?;
            matches.push(IndexMatch {
                id: id.to_string(),
                distance: cosine_distance(embedding, &stored.embedding),
                document: stored.document,
                metadata: stored.metadata,
            });
        }

        // keys iterate in id order, so equal distances stay ordered by id
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(top_k);
        Ok(matches)
    }

    fn len(&self) -> Result<usize, IndexError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.records_db.len(&rtxn)? as usize)
    }
}
