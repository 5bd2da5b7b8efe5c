//! Crop classification service
//!
//! Ranked crop predictions from a trained probabilistic model, or from a
//! standardized nearest-neighbor vote over the reference dataset when no usable
//! model is available. The strategy is picked once in [`ClassificationService::new`].

use crate::dataset::ReferenceDataset;
use crate::ProbabilisticClassifier;
use agrisage_core::{round_to, Error, FeatureVector, Result, FEATURE_COUNT};
use ahash::AHashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Neighbors voting in the fallback path
pub const NEAREST_NEIGHBORS: usize = 75;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub crop: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierBackend {
    TrainedModel,
    NearestNeighbor,
    Unavailable,
}

enum Mode {
    Model(Arc<dyn ProbabilisticClassifier>),
    NearestNeighbor(Arc<ReferenceDataset>),
    Unavailable(String),
}

pub struct ClassificationService {
    mode: Mode,
}

impl ClassificationService {
    pub fn new(
        model: Option<Arc<dyn ProbabilisticClassifier>>,
        dataset: Option<Arc<ReferenceDataset>>,
    ) -> Self {
        let mode = match (model, dataset) {
            (Some(model), _) if !model.classes().is_empty() => {
                info!(classes = model.classes().len(), "Classification backend: trained model");
                Mode::Model(model)
            }
            (model, Some(dataset)) if !dataset.is_empty() => {
                if model.is_some() {
                    warn!("Classifier exposes no class labels, using nearest-neighbor fallback");
                }
                info!(rows = dataset.len(), "Classification backend: nearest-neighbor fallback");
                Mode::NearestNeighbor(dataset)
            }
            _ => {
                let reason = "no classifier model and no reference dataset are available".to_string();
                warn!(reason = %reason, "Classification unavailable");
                Mode::Unavailable(reason)
            }
        };
        Self { mode }
    }

    pub fn backend(&self) -> ClassifierBackend {
        match self.mode {
            Mode::Model(_) => ClassifierBackend::TrainedModel,
            Mode::NearestNeighbor(_) => ClassifierBackend::NearestNeighbor,
            Mode::Unavailable(_) => ClassifierBackend::Unavailable,
        }
    }

    pub fn using_fallback(&self) -> bool {
        !matches!(self.mode, Mode::Model(_))
    }

    /// The `k` most likely crops, most likely first
    pub fn predict_top_k(&self, features: &FeatureVector, k: usize) -> Result<Vec<PredictionResult>> {
        let mut ranked = self.distribution(features)?;
        ranked.truncate(k);
        Ok(ranked)
    }

    /// Every class with its confidence, most likely first.
    ///
    /// Model path: all classes, ties keep class order. Fallback path: only the
    /// labels present among the neighbors, ties ordered by label.
    pub fn distribution(&self, features: &FeatureVector) -> Result<Vec<PredictionResult>> {
        let x = features.to_array();
        match &self.mode {
            Mode::Model(model) => model_distribution(model.as_ref(), &x),
            Mode::NearestNeighbor(dataset) => Ok(neighbor_distribution(dataset, &x)),
            Mode::Unavailable(reason) => Err(Error::Configuration(reason.clone())),
        }
    }
}

fn model_distribution(
    model: &dyn ProbabilisticClassifier,
    x: &[f64; FEATURE_COUNT],
) -> Result<Vec<PredictionResult>> {
    let probs = model.predict_proba(x)?;
    let classes = model.classes();
    if probs.len() != classes.len() {
        return Err(Error::Prediction(format!(
            "model returned {} probabilities for {} classes",
            probs.len(),
            classes.len()
        )));
    }

    let mut order: Vec<usize> = (0..probs.len()).collect();
    // stable sort keeps class order on ties
    order.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));

    Ok(order
        .into_iter()
        .map(|i| PredictionResult {
            crop: classes[i].clone(),
            confidence: round_to(probs[i], 6),
        })
        .collect())
}

fn neighbor_distribution(dataset: &ReferenceDataset, x: &[f64; FEATURE_COUNT]) -> Vec<PredictionResult> {
    let stds = dataset.stats().stds;
    let scaled_query: Vec<f64> = x.iter().zip(&stds).map(|(v, s)| v / s).collect();

    let mut distances: Vec<(f64, usize)> = dataset
        .rows()
        .par_iter()
        .enumerate()
        .map(|(i, row)| {
            let d2: f64 = row
                .iter()
                .zip(&stds)
                .zip(&scaled_query)
                .map(|((v, s), q)| (v / s - q).powi(2))
                .sum();
            (d2.sqrt(), i)
        })
        .collect();

    let n = NEAREST_NEIGHBORS.min(distances.len());
    distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let labels = dataset.labels();
    let mut counts: AHashMap<&str, usize> = AHashMap::new();
    for &(_, i) in &distances[..n] {
        *counts.entry(labels[i].as_str()).or_insert(0) += 1;
    }

    let mut tally: Vec<(&str, usize)> = counts.into_iter().collect();
    tally.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    debug!(neighbors = n, labels = tally.len(), "Nearest-neighbor vote");

    tally
        .into_iter()
        .map(|(label, count)| PredictionResult {
            crop: label.to_string(),
            confidence: round_to(count as f64 / n as f64, 6),
        })
        .collect()
}
