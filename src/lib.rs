//! # AgriSage
//!
//! The decision core of an agricultural advisory service. For one farm profile it
//! recommends crops, explains the top recommendation, simulates market risk for
//! each candidate, and answers free-text questions about government schemes.
//!
//! Every service degrades instead of failing: when a trained artifact is missing
//! or broken, a simpler path takes over and the result says which path ran.
//!
//! ## Quick Start
//!
//! ### From the command line
//!
//! ```bash
//! agrisage --models-dir ./models --acres 2.5 \
//!     --n 90 --p 42 --k 43 --temperature 21 --humidity 82 --rainfall 203 --ph 6.5
//! agrisage --query "crop insurance for flood damage"
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use agrisage::prelude::*;
//!
//! let core = DecisionCore::load(CoreConfig::default().with_models_dir("models"))?;
//!
//! let raw = FeatureVector::new(90.0, 42.0, 43.0, 21.0, 82.0, 203.0, 6.5);
//! let rec = core.recommend(&raw, 2.5)?;
//! println!("{} -> {:?}", rec.explainability.summary, rec.market_prediction.recommended_market_crop);
//!
//! for hit in core.query_policies("insurance for crop loss", None) {
//!     println!("{} ({:.3})", hit.title, hit.score);
//! }
//! # Ok::<(), agrisage::Error>(())
//! ```
//!
//! ## Crate Structure
//!
//! - `agrisage-core` - feature vectors, normalization, config, shared errors
//! - `agrisage-classify` - crop ranking and per-feature explanations
//! - `agrisage-market` - price/yield metrics and Monte-Carlo risk simulation
//! - `agrisage-retrieval` - policy document embedding and search

pub mod pipeline;

pub use pipeline::{CoreStatus, DecisionCore, Recommendation, UNKNOWN_CROP};

// Re-export core types
pub use agrisage_core::{
    normalize_features, CoreConfig, Error, Feature, FeatureVector, Outcome, Result,
};

// Re-export services
pub use agrisage_classify::{
    ClassificationService, ClassifierBackend, ExplainMethod, ExplainabilityEngine, ExplainabilityResult,
    PredictionResult,
};
pub use agrisage_market::{
    simulate_risk_seeded, MarketPrediction, MarketRiskEngine, MetricsSource, RiskLevel, RiskSimulationParams,
    RiskSimulationResult,
};
pub use agrisage_retrieval::{PolicyRetrievalService, RetrievalBackend, RetrievalHit};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ClassificationService, CoreConfig, CoreStatus, DecisionCore, Error, ExplainabilityEngine,
        FeatureVector, MarketRiskEngine, PolicyRetrievalService, Recommendation, Result, RiskLevel,
    };
}
