//! Trained classifier artifacts
//!
//! A crop classifier is a tree ensemble serialized as JSON. Every node records
//! the class distribution of the training rows that reached it, which gives us
//! both probability inference (mean of leaf distributions) and path-based
//! attributions (each split credits its feature with the change in class value
//! between parent and child) from the same structure.
//!
//! The services depend on the [`ProbabilisticClassifier`] and
//! [`AttributionBackend`] traits, not on [`ForestClassifier`] directly.

use agrisage_core::{Error, Feature, Result, FEATURE_COUNT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Class-probability inference over the seven features
pub trait ProbabilisticClassifier: Send + Sync {
    /// Class labels, index-aligned with `predict_proba` output
    fn classes(&self) -> &[String];

    /// Probability for every class; sums to 1
    fn predict_proba(&self, features: &[f64; FEATURE_COUNT]) -> Result<Vec<f64>>;
}

/// Axis layout of an attribution array.
///
/// Declared by the backend once, when the explainability engine probes it.
/// A leading sample axis of length 1 is tolerated in either layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionLayout {
    /// `[features]`, already specific to the requested class
    PerFeature,
    /// Two axes, one for features and one for classes; `class_axis` is 0 or 1
    PerFeaturePerClass { class_axis: usize },
}

/// Row-major attribution values with their shape
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionArray {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttributionError {
    #[error("attribution unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected attribution shape {shape:?} for layout {layout:?}")]
    Shape { shape: Vec<usize>, layout: AttributionLayout },

    #[error("attribution computation failed: {0}")]
    Compute(String),
}

/// Per-feature attribution for one prediction
pub trait AttributionBackend: Send + Sync {
    fn classes(&self) -> &[String];

    /// `None` when the backend cannot attribute at all
    fn attribution_layout(&self) -> Option<AttributionLayout>;

    /// Attributions for the given input. Backends with a per-class layout may
    /// ignore `class_index` and return every class.
    fn attributions(
        &self,
        features: &[f64; FEATURE_COUNT],
        class_index: usize,
    ) -> std::result::Result<AttributionArray, AttributionError>;
}

/// Serialized tree ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestArtifact {
    /// Class labels; an artifact without labels exposes no probabilities
    #[serde(default)]
    pub classes: Vec<String>,
    pub feature_names: Vec<String>,
    pub trees: Vec<DecisionTree>,
    #[serde(default = "default_attribution_layout")]
    pub attribution_layout: Option<AttributionLayout>,
}

fn default_attribution_layout() -> Option<AttributionLayout> {
    Some(AttributionLayout::PerFeaturePerClass { class_axis: 0 })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Node 0 is the root; children always have a larger index than their parent
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    /// `None` for leaves
    #[serde(default)]
    pub split: Option<Split>,
    /// Class distribution of the training rows at this node
    pub value: Vec<f64>,
}

/// Rows with `features[feature] <= threshold` go left
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Split {
    pub feature: usize,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
}

/// A validated tree ensemble ready for inference
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    classes: Vec<String>,
    trees: Vec<DecisionTree>,
    layout: Option<AttributionLayout>,
}

impl ForestClassifier {
    /// Validate an artifact and normalize every node distribution to sum to 1
    pub fn from_artifact(artifact: ForestArtifact) -> Result<Self> {
        if artifact.classes.is_empty() {
            return Err(Error::Artifact(
                "classifier exposes no class labels / probabilities".to_string(),
            ));
        }

        let expected: Vec<&str> = Feature::ALL.iter().map(|f| f.name()).collect();
        if artifact.feature_names.iter().map(String::as_str).ne(expected.iter().copied()) {
            return Err(Error::Artifact(format!(
                "feature order {:?} does not match {:?}",
                artifact.feature_names, expected
            )));
        }

        if artifact.trees.is_empty() {
            return Err(Error::Artifact("classifier has no trees".to_string()));
        }

        if let Some(AttributionLayout::PerFeaturePerClass { class_axis }) = artifact.attribution_layout {
            if class_axis > 1 {
                return Err(Error::Artifact(format!("invalid class axis {}", class_axis)));
            }
        }

        let n_classes = artifact.classes.len();
        let mut trees = artifact.trees;
        for (tree_idx, tree) in trees.iter_mut().enumerate() {
            validate_tree(tree, tree_idx, n_classes)?;
            for node in &mut tree.nodes {
                let total: f64 = node.value.iter().sum();
                for v in &mut node.value {
                    *v /= total;
                }
            }
        }

        Ok(Self {
            classes: artifact.classes,
            trees,
            layout: artifact.attribution_layout,
        })
    }

    /// Read and validate a JSON artifact
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Artifact(format!("model file not found at {}", path.display())));
        }
        let raw = std::fs::read_to_string(path)?;
        let artifact: ForestArtifact = serde_json::from_str(&raw)?;
        Self::from_artifact(artifact)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Node indices from the root to the leaf reached by `features`
    fn decision_path<'a>(tree: &'a DecisionTree, features: &[f64; FEATURE_COUNT]) -> Vec<&'a TreeNode> {
        let mut path = Vec::new();
        let mut idx = 0;
        loop {
            let node = &tree.nodes[idx];
            path.push(node);
            match node.split {
                None => break,
                Some(split) => {
                    idx = if features[split.feature] <= split.threshold {
                        split.left
                    } else {
                        split.right
                    };
                }
            }
        }
        path
    }

    /// Feature-by-class contributions, averaged over trees
    fn path_contributions(&self, features: &[f64; FEATURE_COUNT]) -> Vec<Vec<f64>> {
        let n_classes = self.classes.len();
        let mut contributions = vec![vec![0.0; n_classes]; FEATURE_COUNT];

        for tree in &self.trees {
            let path = Self::decision_path(tree, features);
            for pair in path.windows(2) {
                let (parent, child) = (pair[0], pair[1]);
                if let Some(split) = parent.split {
                    for (c, slot) in contributions[split.feature].iter_mut().enumerate() {
                        *slot += child.value[c] - parent.value[c];
                    }
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        for row in &mut contributions {
            for v in row.iter_mut() {
                *v /= n_trees;
            }
        }
        contributions
    }

}

fn validate_tree(tree: &DecisionTree, tree_idx: usize, n_classes: usize) -> Result<()> {
    if tree.nodes.is_empty() {
        return Err(Error::Artifact(format!("tree {} has no nodes", tree_idx)));
    }
    let n_nodes = tree.nodes.len();
    for (idx, node) in tree.nodes.iter().enumerate() {
        if node.value.len() != n_classes {
            return Err(Error::Artifact(format!(
                "tree {} node {}: expected {} class values, got {}",
                tree_idx,
                idx,
                n_classes,
                node.value.len()
            )));
        }
        if node.value.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(Error::Artifact(format!("tree {} node {}: invalid class values", tree_idx, idx)));
        }
        if node.value.iter().sum::<f64>() <= 0.0 {
            return Err(Error::Artifact(format!("tree {} node {}: empty class distribution", tree_idx, idx)));
        }
        if let Some(split) = node.split {
            let children_ok = split.left > idx
                && split.right > idx
                && split.left < n_nodes
                && split.right < n_nodes;
            if split.feature >= FEATURE_COUNT || !split.threshold.is_finite() || !children_ok {
                return Err(Error::Artifact(format!("tree {} node {}: invalid split", tree_idx, idx)));
            }
        }
    }
    Ok(())
}

impl ProbabilisticClassifier for ForestClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, features: &[f64; FEATURE_COUNT]) -> Result<Vec<f64>> {
        if features.iter().any(|v| !v.is_finite()) {
            return Err(Error::Prediction("non-finite feature value".to_string()));
        }
        let mut probs = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let path = Self::decision_path(tree, features);
            if let Some(leaf) = path.last() {
                for (p, v) in probs.iter_mut().zip(&leaf.value) {
                    *p += v;
                }
            }
        }
        let n_trees = self.trees.len() as f64;
        probs.iter_mut().for_each(|p| *p /= n_trees);
        Ok(probs)
    }
}

impl AttributionBackend for ForestClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn attribution_layout(&self) -> Option<AttributionLayout> {
        self.layout
    }

    fn attributions(
        &self,
        features: &[f64; FEATURE_COUNT],
        class_index: usize,
    ) -> std::result::Result<AttributionArray, AttributionError> {
        let layout = self
            .layout
            .ok_or_else(|| AttributionError::Unavailable("artifact declares no attribution layout".to_string()))?;
        if class_index >= self.classes.len() {
            return Err(AttributionError::Compute(format!("class index {} out of range", class_index)));
        }

        let by_feature = self.path_contributions(features);
        let n_classes = self.classes.len();

        let array = match layout {
            AttributionLayout::PerFeature => AttributionArray {
                shape: vec![FEATURE_COUNT],
                data: by_feature.iter().map(|row| row[class_index]).collect(),
            },
            AttributionLayout::PerFeaturePerClass { class_axis: 0 } => AttributionArray {
                shape: vec![n_classes, FEATURE_COUNT],
                data: (0..n_classes)
                    .flat_map(|c| by_feature.iter().map(move |row| row[c]))
                    .collect(),
            },
            AttributionLayout::PerFeaturePerClass { .. } => AttributionArray {
                shape: vec![FEATURE_COUNT, n_classes],
                data: by_feature.into_iter().flatten().collect(),
            },
        };
        Ok(array)
    }
}

/// Load the classifier artifact, logging and returning `None` when it is unusable
pub fn load_classifier<P: AsRef<Path>>(path: P) -> Option<Arc<ForestClassifier>> {
    let path = path.as_ref();
    match ForestClassifier::load(path) {
        Ok(model) => {
            info!(
                path = %path.display(),
                classes = model.classes.len(),
                trees = model.n_trees(),
                "Loaded crop classifier"
            );
            Some(Arc::new(model))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Crop classifier unavailable");
            None
        }
    }
}
