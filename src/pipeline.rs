//! The end-to-end decision pipeline
//!
//! Normalize the features, rank crops, explain the top one and build the market
//! outlook for the ranked list. Artifacts are loaded once by [`DecisionCore::load`];
//! a missing or broken artifact only changes which backend a service runs on.

use agrisage_classify::{
    load_classifier, load_dataset, AttributionBackend, ClassificationService, ClassifierBackend, ExplainMethod,
    ExplainabilityEngine, ExplainabilityResult, PredictionResult, ProbabilisticClassifier,
};
use agrisage_core::{normalize_features, round_to, CoreConfig, Error, Feature, FeatureVector, Result};
use agrisage_market::{load_brain, CropCandidate, MarketConfig, MarketPrediction, MarketRiskEngine, MetricsSource};
use agrisage_retrieval::{PolicyRetrievalService, RetrievalBackend, RetrievalConfig, RetrievalHit};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Placeholder crop name when the classifier returns no candidates
pub const UNKNOWN_CROP: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub acres: f64,
    pub normalized_features: FeatureVector,
    /// Confidences rounded to 4 places
    pub top_crops: Vec<PredictionResult>,
    pub explainability: ExplainabilityResult,
    pub market_prediction: MarketPrediction,
}

/// Which backend each service is running on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoreStatus {
    pub classifier: ClassifierBackend,
    pub explainability: ExplainMethod,
    pub market_metrics: MetricsSource,
    pub retrieval: RetrievalBackend,
    pub policy_documents: usize,
    pub model_path: PathBuf,
    pub brain_path: PathBuf,
    pub feature_order: String,
}

pub struct DecisionCore {
    config: CoreConfig,
    classifier: ClassificationService,
    explainer: ExplainabilityEngine,
    market: MarketRiskEngine,
    retrieval: PolicyRetrievalService,
}

impl DecisionCore {
    /// Load every artifact named by `config`. Only an invalid config is an error.
    pub fn load(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let model = load_classifier(&config.model_path);
        let dataset = load_dataset(&config.dataset_path);

        let classifier = ClassificationService::new(
            model.clone().map(|m| m as Arc<dyn ProbabilisticClassifier>),
            dataset.clone(),
        );
        let explainer = ExplainabilityEngine::new(
            model.map(|m| m as Arc<dyn AttributionBackend>),
            dataset.as_deref(),
        );
        let market = MarketRiskEngine::new(
            load_brain(&config.brain_path),
            MarketConfig {
                iterations: config.simulation_iterations,
                ..MarketConfig::default()
            },
        );
        let retrieval = PolicyRetrievalService::open(
            &config.policy_docs_path,
            config.vector_store_dir.as_deref(),
            RetrievalConfig {
                embedding_dim: config.embedding_dim,
                default_top_k: config.retrieval_top_k,
                ..RetrievalConfig::default()
            },
        );

        let core = Self::from_parts(config, classifier, explainer, market, retrieval);
        info!(status = ?core.status(), "Decision core ready");
        Ok(core)
    }

    /// Assemble a core from already-constructed services
    pub fn from_parts(
        config: CoreConfig,
        classifier: ClassificationService,
        explainer: ExplainabilityEngine,
        market: MarketRiskEngine,
        retrieval: PolicyRetrievalService,
    ) -> Self {
        Self {
            config,
            classifier,
            explainer,
            market,
            retrieval,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn classifier(&self) -> &ClassificationService {
        &self.classifier
    }

    pub fn explainer(&self) -> &ExplainabilityEngine {
        &self.explainer
    }

    pub fn market(&self) -> &MarketRiskEngine {
        &self.market
    }

    pub fn retrieval(&self) -> &PolicyRetrievalService {
        &self.retrieval
    }

    /// Run the full pipeline for one farm
    pub fn recommend(&self, raw: &FeatureVector, acres: f64) -> Result<Recommendation> {
        if !acres.is_finite() || acres <= 0.0 {
            return Err(Error::InvalidInput(format!("acres must be a positive number, got {}", acres)));
        }
        let features = normalize_features(raw)?;

        let top_crops: Vec<PredictionResult> = self
            .classifier
            .predict_top_k(&features, self.config.classification_top_k)?
            .into_iter()
            .map(|p| PredictionResult {
                confidence: round_to(p.confidence, 4),
                crop: p.crop,
            })
            .collect();
        let top_crop = top_crops.first().map_or(UNKNOWN_CROP, |p| p.crop.as_str());
        debug!(top_crop, candidates = top_crops.len(), "Classified");

        let explainability = self.explainer.explain(&features, top_crop);

        let candidates: Vec<CropCandidate> = top_crops
            .iter()
            .map(|p| CropCandidate {
                crop: p.crop.clone(),
                confidence: p.confidence,
            })
            .collect();
        let market_prediction =
            self.market
                .build_market_predictions_seeded(&candidates, &features, acres, self.config.seed)?;

        Ok(Recommendation {
            acres,
            normalized_features: features,
            top_crops,
            explainability,
            market_prediction,
        })
    }

    /// Policy passages for free text; `None` uses the retrieval service's default `top_k`
    pub fn query_policies(&self, text: &str, top_k: Option<usize>) -> Vec<RetrievalHit> {
        match top_k {
            Some(top_k) => self.retrieval.query(text, top_k),
            None => self.retrieval.query_default(text),
        }
    }

    pub fn status(&self) -> CoreStatus {
        CoreStatus {
            classifier: self.classifier.backend(),
            explainability: self.explainer.method(),
            market_metrics: self.market.metrics_source(),
            retrieval: self.retrieval.backend(),
            policy_documents: self.retrieval.len(),
            model_path: self.config.model_path.clone(),
            brain_path: self.config.brain_path.clone(),
            feature_order: Feature::ALL.map(Feature::name).join(","),
        }
    }
}
