//! Process-level configuration
//!
//! Artifact locations and tuning knobs for the decision services. Every field
//! has a default, so a config file only needs to name what differs.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_EMBEDDING_DIM: usize = 192;
pub const DEFAULT_CLASSIFICATION_TOP_K: usize = 3;
pub const DEFAULT_RETRIEVAL_TOP_K: usize = 4;
pub const DEFAULT_SIMULATION_ITERATIONS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Trained crop classifier (JSON tree ensemble)
    pub model_path: PathBuf,
    /// Market bundle with the price forecaster and yield regressor
    pub brain_path: PathBuf,
    /// Reference dataset: the seven feature columns plus `label`
    pub dataset_path: PathBuf,
    /// JSON array of policy documents
    pub policy_docs_path: PathBuf,
    /// LMDB directory for the persistent policy index; `None` keeps retrieval in memory
    pub vector_store_dir: Option<PathBuf>,
    pub embedding_dim: usize,
    pub classification_top_k: usize,
    pub retrieval_top_k: usize,
    pub simulation_iterations: usize,
    /// Fixed seed for reproducible Monte-Carlo runs
    pub seed: Option<u64>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/crop_model.json"),
            brain_path: PathBuf::from("models/agrisage_brain.json"),
            dataset_path: PathBuf::from("models/Crop_recommendation.csv"),
            policy_docs_path: PathBuf::from("data/policy_docs.json"),
            vector_store_dir: Some(PathBuf::from("data/policy_index")),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            classification_top_k: DEFAULT_CLASSIFICATION_TOP_K,
            retrieval_top_k: DEFAULT_RETRIEVAL_TOP_K,
            simulation_iterations: DEFAULT_SIMULATION_ITERATIONS,
            seed: None,
        }
    }
}

impl CoreConfig {
    /// Read a JSON config file; missing keys take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: CoreConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Point the three model artifacts at `dir` using their conventional file names
    #[must_use]
    pub fn with_models_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        let dir = dir.as_ref();
        self.model_path = dir.join("crop_model.json");
        self.brain_path = dir.join("agrisage_brain.json");
        self.dataset_path = dir.join("Crop_recommendation.csv");
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            return Err(Error::InvalidConfig("embedding_dim must be positive".to_string()));
        }
        if self.classification_top_k == 0 || self.retrieval_top_k == 0 {
            return Err(Error::InvalidConfig("top_k values must be positive".to_string()));
        }
        if self.simulation_iterations == 0 {
            return Err(Error::InvalidConfig("simulation_iterations must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.embedding_dim, 192);
        assert_eq!(config.simulation_iterations, 10_000);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"embedding_dim": 64, "seed": 7, "vector_store_dir": null}}"#).unwrap();

        let config = CoreConfig::from_file(file.path()).unwrap();
        assert_eq!(config.embedding_dim, 64);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.vector_store_dir, None);
        assert_eq!(config.classification_top_k, DEFAULT_CLASSIFICATION_TOP_K);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"simulation_iterations": 0}}"#).unwrap();
        assert!(matches!(
            CoreConfig::from_file(file.path()),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_models_dir_rewrites_artifact_paths() {
        let config = CoreConfig::default().with_models_dir("/srv/models");
        assert_eq!(config.model_path, PathBuf::from("/srv/models/crop_model.json"));
        assert_eq!(config.dataset_path, PathBuf::from("/srv/models/Crop_recommendation.csv"));
    }
}
