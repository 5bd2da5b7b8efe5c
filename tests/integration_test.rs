// Integration tests for AgriSage
use agrisage::prelude::*;
use agrisage::{
    simulate_risk_seeded, ClassifierBackend, ExplainMethod, MetricsSource, RetrievalBackend, RiskSimulationParams,
};
use approx::assert_relative_eq;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

fn humid_profile() -> FeatureVector {
    FeatureVector::new(90.0, 42.0, 43.0, 28.0, 80.0, 200.0, 6.5)
}

fn write_forest(dir: &Path) {
    let forest = json!({
        "classes": ["jute", "maize", "rice", "chickpea"],
        "feature_names": ["N", "P", "K", "temperature", "humidity", "rainfall", "ph"],
        "trees": [
            {
                "nodes": [
                    {"split": {"feature": 5, "threshold": 150.0, "left": 1, "right": 2}, "value": [0.25, 0.25, 0.25, 0.25]},
                    {"value": [0.1, 0.5, 0.1, 0.3]},
                    {"value": [0.4, 0.05, 0.5, 0.05]}
                ]
            }
        ]
    });
    std::fs::write(dir.join("crop_model.json"), forest.to_string()).unwrap();
}

fn write_dataset(dir: &Path) {
    let mut csv = String::from("N,P,K,temperature,humidity,rainfall,ph,label\n");
    for i in 0..6 {
        let d = i as f64;
        csv.push_str(&format!("{},{},{},{},{},{},{},rice\n", 85.0 + d, 40.0 + d, 40.0, 27.0, 82.0, 210.0 - d, 6.4));
    }
    for i in 0..4 {
        let d = i as f64;
        csv.push_str(&format!("{},{},{},{},{},{},{},chickpea\n", 40.0 + d, 65.0, 80.0, 18.0, 16.0 + d, 80.0, 7.2));
    }
    std::fs::write(dir.join("Crop_recommendation.csv"), csv).unwrap();
}

fn write_brain(dir: &Path) {
    let brain = json!({
        "price_model": {"origin": "2020-01-01", "intercept": 3800.0, "slope": 0.0},
        "yield_model": {"intercept": 20.0, "nitrogen": 0.1, "phosphorus": 0.0, "rainfall": 0.0, "ph": 0.0},
        "volatility": 0.12,
        "last_date": "2024-06-30",
        "crop": "rice",
        "district": "Cuttack"
    });
    std::fs::write(dir.join("agrisage_brain.json"), brain.to_string()).unwrap();
}

fn write_policies(dir: &Path) {
    let docs = json!([
        {"id": "pmfby-1", "scheme_id": "PMFBY", "title": "Crop insurance", "source": "pmfby.gov.in",
         "content": "Pradhan Mantri Fasal Bima Yojana provides crop insurance against flood, drought and pest damage."},
        {"id": "kcc-1", "scheme_id": "KCC", "title": "Kisan Credit Card", "source": "nabard.org",
         "content": "Kisan Credit Card gives farmers short term credit for seeds, fertilizer and equipment."},
        {"id": "shc-1", "scheme_id": "SHC", "title": "Soil Health Card", "source": "soilhealth.dac.gov.in",
         "content": "Soil Health Card reports nitrogen, phosphorus and potassium levels with fertilizer advice."}
    ]);
    std::fs::write(dir.join("policy_docs.json"), docs.to_string()).unwrap();
}

fn config_for(dir: &TempDir) -> CoreConfig {
    CoreConfig {
        policy_docs_path: dir.path().join("policy_docs.json"),
        vector_store_dir: None,
        simulation_iterations: 2_000,
        seed: Some(42),
        ..CoreConfig::default()
    }
    .with_models_dir(dir.path())
}

#[test]
fn test_recommendation_with_trained_model() {
    let dir = tempfile::tempdir().unwrap();
    write_forest(dir.path());
    write_dataset(dir.path());

    let core = DecisionCore::load(config_for(&dir)).unwrap();
    assert_eq!(core.status().classifier, ClassifierBackend::TrainedModel);
    assert_eq!(core.status().explainability, ExplainMethod::TreeAttribution);

    let rec = core.recommend(&humid_profile(), 2.0).unwrap();

    let crops: Vec<&str> = rec.top_crops.iter().map(|p| p.crop.as_str()).collect();
    assert_eq!(crops, vec!["rice", "jute", "maize"]);
    assert!(rec.top_crops.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    assert!(rec.top_crops.iter().map(|p| p.confidence).sum::<f64>() <= 1.0 + 1e-9);
    assert_eq!(rec.top_crops[0].confidence, 0.5);

    assert_eq!(rec.explainability.top_crop, "rice");
    assert_eq!(rec.explainability.contributions.len(), 7);
    assert!(rec.explainability.summary.starts_with("Top positive drivers for rice"));

    assert_eq!(rec.market_prediction.per_crop.len(), 3);
    assert!(rec
        .market_prediction
        .per_crop
        .iter()
        .all(|c| c.metrics_source == MetricsSource::Heuristic));
}

#[test]
fn test_recommendation_with_nearest_neighbor_fallback() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());

    let core = DecisionCore::load(config_for(&dir)).unwrap();
    let status = core.status();
    assert_eq!(status.classifier, ClassifierBackend::NearestNeighbor);
    assert_eq!(status.explainability, ExplainMethod::SurrogateZscore);

    let rec = core.recommend(&humid_profile(), 1.0).unwrap();
    assert_eq!(rec.top_crops.len(), 2);
    assert_eq!(rec.top_crops[0].crop, "rice");
    assert_eq!(rec.top_crops[0].confidence, 0.6);
    assert_eq!(rec.top_crops[1].crop, "chickpea");
    assert_eq!(rec.top_crops[1].confidence, 0.4);
    assert_eq!(rec.explainability.method, ExplainMethod::SurrogateZscore);
}

#[test]
fn test_recommendation_without_any_classifier_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();

    let core = DecisionCore::load(config_for(&dir)).unwrap();
    assert_eq!(core.status().classifier, ClassifierBackend::Unavailable);
    assert!(matches!(
        core.recommend(&humid_profile(), 1.0),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn test_market_brain_drives_metrics() {
    let dir = tempfile::tempdir().unwrap();
    write_forest(dir.path());
    write_brain(dir.path());

    let core = DecisionCore::load(config_for(&dir)).unwrap();
    assert_eq!(core.status().market_metrics, MetricsSource::TrainedModels);

    let rec = core.recommend(&humid_profile(), 3.0).unwrap();
    for outlook in &rec.market_prediction.per_crop {
        assert_eq!(outlook.metrics_source, MetricsSource::TrainedModels);
        assert_eq!(outlook.price_per_quintal, 3800.0);
        // 20 + 0.1 * 90
        assert_eq!(outlook.yield_per_acre, 29.0);
    }
}

#[test]
fn test_input_is_normalized_before_classification() {
    let dir = tempfile::tempdir().unwrap();
    write_forest(dir.path());

    let core = DecisionCore::load(config_for(&dir)).unwrap();
    let raw = FeatureVector::new(400.0, 42.0, 43.0, 28.0, 80.0, 900.0, 6.5);
    let rec = core.recommend(&raw, 1.0).unwrap();

    assert_eq!(rec.normalized_features.n, 150.0);
    assert_eq!(rec.normalized_features.rainfall, 500.0);
    assert!(rec.normalized_features.is_normalized());
}

#[test]
fn test_invalid_inputs_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_forest(dir.path());
    let core = DecisionCore::load(config_for(&dir)).unwrap();

    assert!(matches!(core.recommend(&humid_profile(), 0.0), Err(Error::InvalidInput(_))));
    assert!(matches!(core.recommend(&humid_profile(), f64::NAN), Err(Error::InvalidInput(_))));

    let bad = FeatureVector::new(f64::NAN, 42.0, 43.0, 28.0, 80.0, 200.0, 6.5);
    assert!(core.recommend(&bad, 1.0).is_err());
}

#[test]
fn test_seeded_recommendations_are_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    write_forest(dir.path());

    let core = DecisionCore::load(config_for(&dir)).unwrap();
    let first = core.recommend(&humid_profile(), 2.0).unwrap();
    let second = core.recommend(&humid_profile(), 2.0).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_invalid_config_is_an_error() {
    let config = CoreConfig {
        classification_top_k: 0,
        ..CoreConfig::default()
    };
    assert!(matches!(DecisionCore::load(config), Err(Error::InvalidConfig(_))));
}

#[test]
fn test_risk_scenarios() {
    let params = RiskSimulationParams::new(3800.0, 32.0, 200.0)
        .with_volatility(0.15, 0.10)
        .with_iterations(10_000);
    let result = simulate_risk_seeded(&params, Some(7)).unwrap();

    let expected = 3800.0 * 32.0;
    assert_relative_eq!(result.baseline.expected_revenue, expected, max_relative = 0.05);
    assert_eq!(result.rainfall_drop.expected_revenue, 97280.0);
    assert_eq!(result.price_crash.expected_revenue, 91200.0);
    assert_eq!(result.combined_shock.expected_revenue, 68400.0);
    assert!(result.baseline.worst_case_revenue < result.baseline.expected_revenue);
}

#[test]
fn test_policy_query_with_empty_corpus() {
    let dir = tempfile::tempdir().unwrap();

    let core = DecisionCore::load(config_for(&dir)).unwrap();
    assert_eq!(core.status().policy_documents, 0);
    assert!(core.query_policies("crop insurance", None).is_empty());
    assert!(core.query_policies("", Some(10)).is_empty());
}

#[test]
fn test_policy_query_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    write_policies(dir.path());

    let core = DecisionCore::load(config_for(&dir)).unwrap();
    assert_eq!(core.status().retrieval, RetrievalBackend::InMemory);

    let hits = core.query_policies("crop insurance against flood damage", Some(2));
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].scheme_id, "PMFBY");
    assert!(hits[0].score >= hits[1].score);
}

#[test]
fn test_policy_query_uses_configured_default_top_k() {
    let dir = tempfile::tempdir().unwrap();
    write_policies(dir.path());

    let config = CoreConfig {
        retrieval_top_k: 2,
        ..config_for(&dir)
    };
    let core = DecisionCore::load(config).unwrap();
    assert_eq!(core.query_policies("crop insurance and credit", None).len(), 2);
    assert_eq!(core.query_policies("crop insurance and credit", Some(1)).len(), 1);
}

#[test]
fn test_policy_query_with_persistent_index() {
    let dir = tempfile::tempdir().unwrap();
    write_policies(dir.path());

    let config = CoreConfig {
        vector_store_dir: Some(dir.path().join("policy_index")),
        ..config_for(&dir)
    };
    let core = DecisionCore::load(config).unwrap();
    let status = core.status();
    assert_eq!(status.retrieval, RetrievalBackend::ExternalIndex);
    assert_eq!(status.policy_documents, 3);

    let hits = core.query_policies("nitrogen phosphorus potassium soil fertilizer", None);
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].scheme_id, "SHC");
}

#[test]
fn test_status_reports_feature_order() {
    let dir = tempfile::tempdir().unwrap();
    let core = DecisionCore::load(config_for(&dir)).unwrap();
    let status = core.status();
    assert_eq!(status.feature_order, "N,P,K,temperature,humidity,rainfall,ph");
    assert_eq!(status.model_path, dir.path().join("crop_model.json"));

    let value = serde_json::to_value(&status).unwrap();
    assert_eq!(value["classifier"], "unavailable");
}
