//! # AgriSage Classify
//!
//! Crop recommendation and its explanation.
//!
//! - [`ClassificationService`] ranks crops with a trained tree ensemble, or with a
//!   nearest-neighbor vote over the [`ReferenceDataset`] when no model is loaded
//! - [`ExplainabilityEngine`] attributes the top prediction to the seven input
//!   features, falling back to a z-score surrogate
//!
//! Both services pick their backend once at construction.

pub mod artifact;
pub mod classifier;
pub mod dataset;
pub mod explain;

pub use artifact::{
    load_classifier, AttributionArray, AttributionBackend, AttributionError, AttributionLayout, DecisionTree,
    ForestArtifact, ForestClassifier, ProbabilisticClassifier, Split, TreeNode,
};
pub use classifier::{ClassificationService, ClassifierBackend, PredictionResult, NEAREST_NEIGHBORS};
pub use dataset::{load_dataset, ColumnStats, ReferenceDataset};
pub use explain::{
    normalize_attributions, ExplainMethod, ExplainabilityEngine, ExplainabilityResult, FeatureContribution,
};

#[cfg(test)]
pub(crate) use artifact::fixtures;
