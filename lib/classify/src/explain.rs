//! Per-feature explanations of a crop prediction
//!
//! The engine prefers attributions from the trained model. When the model cannot
//! attribute, or the attribution fails or comes back in an unexpected shape, it
//! falls back to a z-score surrogate: how far each input sits from the reference
//! data, in standard deviations.

use crate::artifact::{AttributionArray, AttributionBackend, AttributionError, AttributionLayout};
use crate::dataset::{ColumnStats, ReferenceDataset};
use agrisage_core::{round_to, Feature, FeatureVector, Outcome, FEATURE_COUNT};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainMethod {
    TreeAttribution,
    SurrogateZscore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: Feature,
    pub value: f64,
    pub impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainabilityResult {
    pub method: ExplainMethod,
    pub top_crop: String,
    pub summary: String,
    pub contributions: Vec<FeatureContribution>,
}

/// Center and scale per feature, used when no reference dataset is loaded
const SURROGATE_STATS: [(f64, f64); FEATURE_COUNT] = [
    (50.55, 36.92),
    (53.36, 32.99),
    (48.15, 50.65),
    (25.62, 5.06),
    (71.48, 22.26),
    (103.46, 54.96),
    (6.47, 0.77),
];

enum Primary {
    Attribution {
        backend: Arc<dyn AttributionBackend>,
        layout: AttributionLayout,
    },
    Unavailable(String),
}

pub struct ExplainabilityEngine {
    primary: Primary,
    stats: Option<ColumnStats>,
}

impl ExplainabilityEngine {
    /// Probes the backend's attribution layout once; it is not re-checked per call
    pub fn new(backend: Option<Arc<dyn AttributionBackend>>, dataset: Option<&ReferenceDataset>) -> Self {
        let primary = match backend {
            None => Primary::Unavailable("no trained classifier loaded".to_string()),
            Some(backend) if backend.classes().is_empty() => {
                Primary::Unavailable("classifier exposes no class labels".to_string())
            }
            Some(backend) => match backend.attribution_layout() {
                Some(layout) => {
                    info!(?layout, "Explainability backend: tree attribution");
                    Primary::Attribution { backend, layout }
                }
                None => Primary::Unavailable("classifier declares no attribution layout".to_string()),
            },
        };
        if let Primary::Unavailable(reason) = &primary {
            info!(reason = %reason, "Explainability backend: z-score surrogate");
        }

        Self {
            primary,
            stats: dataset.map(|d| *d.stats()),
        }
    }

    pub fn method(&self) -> ExplainMethod {
        match self.primary {
            Primary::Attribution { .. } => ExplainMethod::TreeAttribution,
            Primary::Unavailable(_) => ExplainMethod::SurrogateZscore,
        }
    }

    pub fn explain(&self, features: &FeatureVector, top_crop: &str) -> ExplainabilityResult {
        self.explain_outcome(features, top_crop).into_value()
    }

    /// Like [`explain`](Self::explain), but reports whether the surrogate was used and why
    pub fn explain_outcome(&self, features: &FeatureVector, top_crop: &str) -> Outcome<ExplainabilityResult> {
        let reason = match &self.primary {
            Primary::Attribution { backend, layout } => {
                match attribute(backend.as_ref(), *layout, features, top_crop) {
                    Ok(impacts) => {
                        return Outcome::Ok(build_result(ExplainMethod::TreeAttribution, features, top_crop, impacts));
                    }
                    Err(e) => {
                        warn!(crop = top_crop, error = %e, "Attribution failed, using z-score surrogate");
                        e.to_string()
                    }
                }
            }
            Primary::Unavailable(reason) => reason.clone(),
        };

        let impacts = self.surrogate_impacts(features);
        Outcome::degraded(build_result(ExplainMethod::SurrogateZscore, features, top_crop, impacts), reason)
    }

    fn surrogate_impacts(&self, features: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let mut impacts = [0.0; FEATURE_COUNT];
        for (feature, value) in features.iter() {
            let j = feature.index();
            impacts[j] = match &self.stats {
                Some(stats) => stats.z_score(feature, value),
                None => {
                    let (center, scale) = SURROGATE_STATS[j];
                    (value - center) / scale
                }
            };
        }
        impacts
    }
}

fn attribute(
    backend: &dyn AttributionBackend,
    layout: AttributionLayout,
    features: &FeatureVector,
    top_crop: &str,
) -> Result<[f64; FEATURE_COUNT], AttributionError> {
    let classes = backend.classes();
    let class_index = classes.iter().position(|c| c == top_crop).unwrap_or_else(|| {
        debug!(crop = top_crop, "Crop not among classifier classes, attributing class 0");
        0
    });
    let array = backend.attributions(&features.to_array(), class_index)?;
    normalize_attributions(&array, layout, class_index, classes.len())
}

/// Reduce an attribution array to one value per feature for `class_index`.
///
/// Accepted shapes: `[F]` (per feature), `[C, F]` or `[F, C]` (per class, by
/// `class_axis`), each optionally with a leading sample axis of length 1.
pub fn normalize_attributions(
    array: &AttributionArray,
    layout: AttributionLayout,
    class_index: usize,
    n_classes: usize,
) -> Result<[f64; FEATURE_COUNT], AttributionError> {
    let shape_error = || AttributionError::Shape { shape: array.shape.clone(), layout };

    let expected_rank = match layout {
        AttributionLayout::PerFeature => 1,
        AttributionLayout::PerFeaturePerClass { .. } => 2,
    };
    let shape: &[usize] = match array.shape.as_slice() {
        [1, rest @ ..] if rest.len() == expected_rank => rest,
        s if s.len() == expected_rank => s,
        _ => return Err(shape_error()),
    };
    if array.data.len() != shape.iter().product::<usize>() {
        return Err(shape_error());
    }

    let mut out = [0.0; FEATURE_COUNT];
    match (layout, shape) {
        (AttributionLayout::PerFeature, &[f]) if f == FEATURE_COUNT => {
            out.copy_from_slice(&array.data);
        }
        (AttributionLayout::PerFeaturePerClass { class_axis: 0 }, &[c, f])
            if f == FEATURE_COUNT && c == n_classes && class_index < c =>
        {
            out.copy_from_slice(&array.data[class_index * f..(class_index + 1) * f]);
        }
        (AttributionLayout::PerFeaturePerClass { class_axis: 1 }, &[f, c])
            if f == FEATURE_COUNT && c == n_classes && class_index < c =>
        {
            for (j, slot) in out.iter_mut().enumerate() {
                *slot = array.data[j * c + class_index];
            }
        }
        _ => return Err(shape_error()),
    }

    if out.iter().any(|v| !v.is_finite()) {
        return Err(AttributionError::Compute("non-finite attribution".to_string()));
    }
    Ok(out)
}

fn build_result(
    method: ExplainMethod,
    features: &FeatureVector,
    top_crop: &str,
    impacts: [f64; FEATURE_COUNT],
) -> ExplainabilityResult {
    let mut contributions: Vec<FeatureContribution> = features
        .iter()
        .map(|(feature, value)| FeatureContribution {
            feature,
            value,
            impact: round_to(impacts[feature.index()], 6),
        })
        .collect();
    contributions.sort_by(|a, b| b.impact.abs().total_cmp(&a.impact.abs()));

    ExplainabilityResult {
        method,
        top_crop: top_crop.to_string(),
        summary: summarize(top_crop, &contributions),
        contributions,
    }
}

/// "Top positive drivers for rice: rainfall (+0.117), humidity (+0.100). Top negative drivers: none."
fn summarize(top_crop: &str, contributions: &[FeatureContribution]) -> String {
    let mut positive: Vec<&FeatureContribution> = contributions.iter().filter(|c| c.impact > 0.0).collect();
    positive.sort_by(|a, b| b.impact.total_cmp(&a.impact));
    let mut negative: Vec<&FeatureContribution> = contributions.iter().filter(|c| c.impact < 0.0).collect();
    negative.sort_by(|a, b| a.impact.total_cmp(&b.impact));

    let list = |items: &[&FeatureContribution]| -> String {
        if items.is_empty() {
            return "none".to_string();
        }
        items
            .iter()
            .take(2)
            .map(|c| format!("{} ({:+.3})", c.feature, c.impact))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "Top positive drivers for {}: {}. Top negative drivers: {}.",
        top_crop,
        list(&positive),
        list(&negative)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ForestClassifier;
    use crate::fixtures::{humid_profile, sample_artifact, sample_forest};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn humid() -> FeatureVector {
        FeatureVector::from_array(humid_profile())
    }

    fn impact_of(result: &ExplainabilityResult, feature: Feature) -> f64 {
        result
            .contributions
            .iter()
            .find(|c| c.feature == feature)
            .map(|c| c.impact)
            .unwrap()
    }

    struct FixedBackend {
        classes: Vec<String>,
        layout: Option<AttributionLayout>,
        array: std::result::Result<AttributionArray, AttributionError>,
    }

    impl AttributionBackend for FixedBackend {
        fn classes(&self) -> &[String] {
            &self.classes
        }

        fn attribution_layout(&self) -> Option<AttributionLayout> {
            self.layout
        }

        fn attributions(
            &self,
            _features: &[f64; FEATURE_COUNT],
            _class_index: usize,
        ) -> std::result::Result<AttributionArray, AttributionError> {
            self.array.clone()
        }
    }

    #[test]
    fn test_tree_attribution_for_top_crop() {
        let engine = ExplainabilityEngine::new(Some(Arc::new(sample_forest())), None);
        assert_eq!(engine.method(), ExplainMethod::TreeAttribution);

        let outcome = engine.explain_outcome(&humid(), "rice");
        assert!(!outcome.is_degraded());
        let result = outcome.value();

        assert_eq!(result.method, ExplainMethod::TreeAttribution);
        assert_eq!(result.contributions.len(), FEATURE_COUNT);
        assert_eq!(result.contributions[0].feature, Feature::Rainfall);
        assert_relative_eq!(impact_of(result, Feature::Rainfall), 0.116667, epsilon = 1e-9);
        assert_relative_eq!(impact_of(result, Feature::Humidity), 0.1, epsilon = 1e-9);
        assert_relative_eq!(impact_of(result, Feature::Nitrogen), 0.083333, epsilon = 1e-9);
        assert_relative_eq!(impact_of(result, Feature::Ph), 0.033333, epsilon = 1e-9);
        assert_eq!(
            result.summary,
            "Top positive drivers for rice: rainfall (+0.117), humidity (+0.100). Top negative drivers: none."
        );
    }

    #[test]
    fn test_every_layout_yields_same_attributions() {
        let layouts = [
            AttributionLayout::PerFeature,
            AttributionLayout::PerFeaturePerClass { class_axis: 0 },
            AttributionLayout::PerFeaturePerClass { class_axis: 1 },
        ];
        let expected = ExplainabilityEngine::new(Some(Arc::new(sample_forest())), None).explain(&humid(), "jute");

        for layout in layouts {
            let forest = ForestClassifier::from_artifact(sample_artifact(Some(layout))).unwrap();
            let engine = ExplainabilityEngine::new(Some(Arc::new(forest)), None);
            assert_eq!(engine.explain(&humid(), "jute"), expected, "{:?}", layout);
        }
        assert_relative_eq!(impact_of(&expected, Feature::Rainfall), 0.05, epsilon = 1e-9);
    }

    #[test]
    fn test_leading_sample_axis_is_stripped() {
        let array = AttributionArray {
            shape: vec![1, FEATURE_COUNT],
            data: vec![0.1, -0.2, 0.0, 0.3, 0.0, 0.0, 0.05],
        };
        let out = normalize_attributions(&array, AttributionLayout::PerFeature, 0, 2).unwrap();
        assert_eq!(out[3], 0.3);

        let array = AttributionArray {
            shape: vec![1, FEATURE_COUNT, 2],
            data: (0..14).map(f64::from).collect(),
        };
        let out = normalize_attributions(&array, AttributionLayout::PerFeaturePerClass { class_axis: 1 }, 1, 2).unwrap();
        assert_eq!(out, [1.0, 3.0, 5.0, 7.0, 9.0, 11.0, 13.0]);
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let array = AttributionArray { shape: vec![3, FEATURE_COUNT], data: vec![0.0; 21] };
        let err = normalize_attributions(&array, AttributionLayout::PerFeaturePerClass { class_axis: 0 }, 0, 4);
        assert!(matches!(err, Err(AttributionError::Shape { .. })));

        let array = AttributionArray { shape: vec![2, FEATURE_COUNT], data: vec![0.0; 14] };
        assert!(normalize_attributions(&array, AttributionLayout::PerFeature, 0, 2).is_err());
    }

    #[test]
    fn test_bad_shape_falls_back_to_surrogate() {
        let backend = FixedBackend {
            classes: vec!["rice".to_string()],
            layout: Some(AttributionLayout::PerFeature),
            array: Ok(AttributionArray { shape: vec![5], data: vec![0.0; 5] }),
        };
        let engine = ExplainabilityEngine::new(Some(Arc::new(backend)), None);
        assert_eq!(engine.method(), ExplainMethod::TreeAttribution);

        let outcome = engine.explain_outcome(&humid(), "rice");
        assert!(outcome.is_degraded());
        assert_eq!(outcome.value().method, ExplainMethod::SurrogateZscore);
    }

    #[test]
    fn test_compute_error_falls_back_to_surrogate() {
        let backend = FixedBackend {
            classes: vec!["rice".to_string()],
            layout: Some(AttributionLayout::PerFeature),
            array: Err(AttributionError::Compute("boom".to_string())),
        };
        let engine = ExplainabilityEngine::new(Some(Arc::new(backend)), None);
        let result = engine.explain(&humid(), "rice");
        assert_eq!(result.method, ExplainMethod::SurrogateZscore);
        assert_eq!(result.contributions.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_surrogate_uses_fixed_constants_without_dataset() {
        let engine = ExplainabilityEngine::new(None, None);
        let outcome = engine.explain_outcome(&humid(), "rice");
        assert_eq!(outcome.reason(), Some("no trained classifier loaded"));

        let result = outcome.into_value();
        assert_relative_eq!(impact_of(&result, Feature::Rainfall), round_to((200.0 - 103.46) / 54.96, 6));
        assert_relative_eq!(impact_of(&result, Feature::Ph), round_to((6.5 - 6.47) / 0.77, 6));
        assert_eq!(result.contributions[0].feature, Feature::Rainfall);
        assert!(result.summary.starts_with("Top positive drivers for rice: rainfall (+1.757)"));
    }

    #[test]
    fn test_surrogate_uses_dataset_stats() {
        let rows = vec![[80.0, 40.0, 40.0, 28.0, 80.0, 200.0, 6.5], [100.0, 40.0, 40.0, 28.0, 80.0, 200.0, 6.5]];
        let dataset = ReferenceDataset::new(rows, vec!["a".into(), "b".into()]).unwrap();
        let engine = ExplainabilityEngine::new(None, Some(&dataset));

        let result = engine.explain(&humid(), "rice");
        // N mean 90: zero impact; K constant column: std 1, 43 - 40 = 3
        assert_eq!(impact_of(&result, Feature::Nitrogen), 0.0);
        assert_eq!(impact_of(&result, Feature::Potassium), 3.0);
        assert_eq!(result.summary, "Top positive drivers for rice: K (+3.000), P (+2.000). Top negative drivers: none.");
    }

    #[test]
    fn test_missing_layout_probes_to_surrogate() {
        let forest = ForestClassifier::from_artifact(sample_artifact(None)).unwrap();
        let engine = ExplainabilityEngine::new(Some(Arc::new(forest)), None);
        assert_eq!(engine.method(), ExplainMethod::SurrogateZscore);
    }

    #[test]
    fn test_summary_reports_negative_drivers() {
        let contributions = vec![
            FeatureContribution { feature: Feature::Ph, value: 4.0, impact: -3.2 },
            FeatureContribution { feature: Feature::Rainfall, value: 20.0, impact: -1.5 },
            FeatureContribution { feature: Feature::Humidity, value: 30.0, impact: -0.4 },
        ];
        assert_eq!(
            summarize("maize", &contributions),
            "Top positive drivers for maize: none. Top negative drivers: ph (-3.200), rainfall (-1.500)."
        );
    }

    #[test]
    fn test_summary_single_driver_has_no_separator() {
        let contributions = vec![
            FeatureContribution { feature: Feature::Nitrogen, value: 120.0, impact: 0.25 },
            FeatureContribution { feature: Feature::Temperature, value: 28.0, impact: 0.0 },
            FeatureContribution { feature: Feature::Ph, value: 8.1, impact: -0.05 },
        ];
        assert_eq!(
            summarize("cotton", &contributions),
            "Top positive drivers for cotton: N (+0.250). Top negative drivers: ph (-0.050)."
        );
    }

    fn feature_vector() -> impl Strategy<Value = FeatureVector> {
        prop::array::uniform7(0.0f64..200.0).prop_map(FeatureVector::from_array)
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: seven contributions, sorted by non-increasing |impact|, on both paths.
        #[test]
        fn contributions_sorted_by_magnitude(features in feature_vector()) {
            let engines = [
                ExplainabilityEngine::new(Some(Arc::new(sample_forest())), None),
                ExplainabilityEngine::new(None, None),
            ];
            for engine in &engines {
                let result = engine.explain(&features, "maize");
                prop_assert_eq!(result.contributions.len(), FEATURE_COUNT);
                prop_assert!(result
                    .contributions
                    .windows(2)
                    .all(|w| w[0].impact.abs() >= w[1].impact.abs()));
            }
        }
    }
}
