//! Per-crop market outlook
//!
//! For each recommended crop: estimate price and yield (trained models, else a
//! closed-form heuristic), run the revenue risk simulation and scale the result
//! to the farm size. Crops are simulated in parallel, each with its own RNG.

use crate::brain::MarketBrain;
use crate::simulation::{simulate_risk, RiskLevel, RiskSimulationParams, DEFAULT_ITERATIONS};
use agrisage_core::{round_to, Error, FeatureVector, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Monte-Carlo iterations per crop
    pub iterations: usize,
    /// Yield volatility used for every crop
    pub yield_volatility: f64,
    /// Price volatility of the heuristic estimate
    pub fallback_volatility: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            yield_volatility: 0.10,
            fallback_volatility: 0.16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsSource {
    TrainedModels,
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketMetrics {
    pub price_per_quintal: f64,
    pub yield_per_acre: f64,
    pub volatility: f64,
    pub source: MetricsSource,
}

/// A crop from the classifier with its confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropCandidate {
    pub crop: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropMarketOutlook {
    pub crop: String,
    pub price_per_quintal: f64,
    pub yield_per_acre: f64,
    pub expected_revenue_per_acre: f64,
    pub worst_case_revenue_per_acre: f64,
    pub expected_revenue_total: f64,
    pub worst_case_revenue_total: f64,
    pub cvi: f64,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub metrics_source: MetricsSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPrediction {
    pub per_crop: Vec<CropMarketOutlook>,
    pub overall_cvi: f64,
    pub recommended_market_crop: Option<String>,
}

/// Closed-form price and yield estimate from the soil profile and classifier confidence
pub fn heuristic_metrics(features: &FeatureVector, confidence: f64, volatility: f64) -> MarketMetrics {
    let rainfall_factor = (features.rainfall / 180.0).clamp(0.7, 1.35);
    let temp_penalty = (1.0 - (features.temperature - 27.0).abs() * 0.015).max(0.72);
    let ph_factor = (1.0 - (features.ph - 6.5).abs() * 0.1).max(0.8);

    let base_price = 2100.0 + confidence * 2900.0;
    let base_yield = 12.0 + (features.n + features.p + features.k) / 42.0;

    MarketMetrics {
        price_per_quintal: round_to(base_price * ph_factor, 2),
        yield_per_acre: round_to(base_yield * rainfall_factor * temp_penalty, 2),
        volatility,
        source: MetricsSource::Heuristic,
    }
}

pub struct MarketRiskEngine {
    brain: Option<MarketBrain>,
    config: MarketConfig,
}

impl MarketRiskEngine {
    pub fn new(brain: Option<MarketBrain>, config: MarketConfig) -> Self {
        match &brain {
            Some(brain) if brain.is_complete() => info!("Market metrics backend: trained models"),
            Some(_) => warn!("Market brain is incomplete, heuristic metrics will be used"),
            None => info!("Market metrics backend: heuristic"),
        }
        Self { brain, config }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn metrics_source(&self) -> MetricsSource {
        match &self.brain {
            Some(brain) if brain.is_complete() => MetricsSource::TrainedModels,
            _ => MetricsSource::Heuristic,
        }
    }

    /// Trained-model metrics when they are usable, heuristic ones otherwise
    pub fn market_metrics(&self, features: &FeatureVector, confidence: f64) -> MarketMetrics {
        if let Some(brain) = &self.brain {
            match brain.estimate(features) {
                Ok(estimate) => {
                    return MarketMetrics {
                        price_per_quintal: estimate.price_per_quintal,
                        yield_per_acre: estimate.yield_per_acre,
                        volatility: estimate.volatility,
                        source: MetricsSource::TrainedModels,
                    };
                }
                Err(e) => warn!(error = %e, "Market brain prediction failed, using heuristic"),
            }
        }
        heuristic_metrics(features, confidence, self.config.fallback_volatility)
    }

    /// Outlook for every candidate, with an RNG seeded from the OS
    pub fn build_market_predictions(
        &self,
        top_crops: &[CropCandidate],
        features: &FeatureVector,
        acres: f64,
    ) -> Result<MarketPrediction> {
        self.build_market_predictions_seeded(top_crops, features, acres, None)
    }

    /// Outlook for every candidate. With a seed, crop `i` simulates with `seed + i`
    /// so results do not depend on scheduling.
    pub fn build_market_predictions_seeded(
        &self,
        top_crops: &[CropCandidate],
        features: &FeatureVector,
        acres: f64,
        seed: Option<u64>,
    ) -> Result<MarketPrediction> {
        if !acres.is_finite() || acres <= 0.0 {
            return Err(Error::InvalidInput(format!("acres must be a positive number, got {}", acres)));
        }

        let mut per_crop = top_crops
            .par_iter()
            .enumerate()
            .map(|(i, candidate)| {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(i as u64)),
                    None => StdRng::from_os_rng(),
                };
                self.crop_outlook(candidate, features, acres, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;

        per_crop.sort_by(|a, b| b.expected_revenue_total.total_cmp(&a.expected_revenue_total));

        let overall_cvi = if per_crop.is_empty() {
            0.0
        } else {
            round_to(per_crop.iter().map(|c| c.cvi).sum::<f64>() / per_crop.len() as f64, 2)
        };
        let recommended_market_crop = per_crop.first().map(|c| c.crop.clone());

        debug!(crops = per_crop.len(), overall_cvi, "Built market predictions");

        Ok(MarketPrediction {
            per_crop,
            overall_cvi,
            recommended_market_crop,
        })
    }

    fn crop_outlook(
        &self,
        candidate: &CropCandidate,
        features: &FeatureVector,
        acres: f64,
        rng: &mut StdRng,
    ) -> Result<CropMarketOutlook> {
        let metrics = self.market_metrics(features, candidate.confidence);

        let params = RiskSimulationParams::new(metrics.price_per_quintal, metrics.yield_per_acre, features.rainfall)
            .with_volatility(metrics.volatility, self.config.yield_volatility)
            .with_iterations(self.config.iterations);
        let risk = simulate_risk(&params, rng)?;

        let expected = risk.baseline.expected_revenue;
        let worst = risk.baseline.worst_case_revenue;

        Ok(CropMarketOutlook {
            crop: candidate.crop.clone(),
            price_per_quintal: round_to(metrics.price_per_quintal, 2),
            yield_per_acre: round_to(metrics.yield_per_acre, 2),
            expected_revenue_per_acre: round_to(expected, 2),
            worst_case_revenue_per_acre: round_to(worst, 2),
            expected_revenue_total: round_to(expected * acres, 2),
            worst_case_revenue_total: round_to(worst * acres, 2),
            cvi: risk.baseline.cvi,
            risk_level: risk.risk_level,
            confidence: round_to(candidate.confidence, 4),
            metrics_source: metrics.source,
        })
    }
}
