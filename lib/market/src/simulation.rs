//! Monte-Carlo revenue risk
//!
//! Revenue per acre is simulated as the product of two independent normals,
//! price ~ N(price, price * price_volatility) and yield ~ N(yield, yield * yield_volatility).
//! From the samples we report the mean, the 5th percentile (worst case) and the
//! coefficient of variation as a percentage, the Climate Volatility Index (CVI).
//! Three deterministic shock scenarios are computed from the base values.

use agrisage_core::{round_to, Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_ITERATIONS: usize = 10_000;
pub const DEFAULT_PRICE_VOLATILITY: f64 = 0.15;
pub const DEFAULT_YIELD_VOLATILITY: f64 = 0.10;

/// Percentile reported as the worst case
pub const WORST_CASE_PERCENTILE: f64 = 5.0;

const RAINFALL_DROP_YIELD_FACTOR: f64 = 0.8;
const PRICE_CRASH_FACTOR: f64 = 0.75;
const COMBINED_SHOCK_FACTOR: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskSimulationParams {
    /// Price per quintal
    pub base_price: f64,
    /// Quintals per acre
    pub base_yield: f64,
    /// Carried with the request; the simulation does not use it
    pub rainfall: f64,
    pub price_volatility: f64,
    pub yield_volatility: f64,
    pub iterations: usize,
}

impl RiskSimulationParams {
    pub fn new(base_price: f64, base_yield: f64, rainfall: f64) -> Self {
        Self {
            base_price,
            base_yield,
            rainfall,
            price_volatility: DEFAULT_PRICE_VOLATILITY,
            yield_volatility: DEFAULT_YIELD_VOLATILITY,
            iterations: DEFAULT_ITERATIONS,
        }
    }

    #[must_use]
    pub fn with_volatility(mut self, price_volatility: f64, yield_volatility: f64) -> Self {
        self.price_volatility = price_volatility;
        self.yield_volatility = yield_volatility;
        self
    }

    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(Error::InvalidInput("iterations must be positive".to_string()));
        }
        let values = [
            ("base_price", self.base_price),
            ("base_yield", self.base_yield),
            ("price_volatility", self.price_volatility),
            ("yield_volatility", self.yield_volatility),
        ];
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidInput(format!("{} must be finite and non-negative, got {}", name, value)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Moderate Risk")]
    Moderate,
    #[serde(rename = "High Risk")]
    High,
    #[serde(rename = "Extreme Risk")]
    Extreme,
}

impl RiskLevel {
    /// Thresholds are exclusive upper bounds: 15, 30, 50
    pub fn from_cvi(cvi: f64) -> Self {
        if cvi < 15.0 {
            RiskLevel::Low
        } else if cvi < 30.0 {
            RiskLevel::Moderate
        } else if cvi < 50.0 {
            RiskLevel::High
        } else {
            RiskLevel::Extreme
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Moderate => "Moderate Risk",
            RiskLevel::High => "High Risk",
            RiskLevel::Extreme => "Extreme Risk",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineRisk {
    pub expected_revenue: f64,
    pub worst_case_revenue: f64,
    pub cvi: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RainfallDropScenario {
    pub adjusted_yield: f64,
    pub expected_revenue: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceCrashScenario {
    pub adjusted_price: f64,
    pub expected_revenue: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinedShockScenario {
    pub expected_revenue: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskSimulationResult {
    pub baseline: BaselineRisk,
    pub risk_level: RiskLevel,
    pub rainfall_drop: RainfallDropScenario,
    pub price_crash: PriceCrashScenario,
    pub combined_shock: CombinedShockScenario,
}

/// Percentile of sorted data with linear interpolation between the closest ranks
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

/// Run the simulation with the caller's RNG
pub fn simulate_risk<R: Rng>(params: &RiskSimulationParams, rng: &mut R) -> Result<RiskSimulationResult> {
    params.validate()?;

    let price = Normal::new(params.base_price, params.base_price * params.price_volatility)
        .map_err(|e| Error::InvalidInput(format!("price distribution: {}", e)))?;
    let yld = Normal::new(params.base_yield, params.base_yield * params.yield_volatility)
        .map_err(|e| Error::InvalidInput(format!("yield distribution: {}", e)))?;

    let mut revenue: Vec<f64> = (0..params.iterations)
        .map(|_| price.sample(rng) * yld.sample(rng))
        .collect();

    let n = revenue.len() as f64;
    let expected = revenue.iter().sum::<f64>() / n;
    let variance = revenue.iter().map(|r| (r - expected).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    revenue.sort_by(f64::total_cmp);
    let worst_case = percentile(&revenue, WORST_CASE_PERCENTILE);

    let cvi = if expected == 0.0 { 0.0 } else { std_dev / expected * 100.0 };

    let drought_yield = params.base_yield * RAINFALL_DROP_YIELD_FACTOR;
    let crash_price = params.base_price * PRICE_CRASH_FACTOR;
    let combined = (params.base_price * COMBINED_SHOCK_FACTOR) * (params.base_yield * COMBINED_SHOCK_FACTOR);

    Ok(RiskSimulationResult {
        baseline: BaselineRisk {
            expected_revenue: round_to(expected, 2),
            worst_case_revenue: round_to(worst_case, 2),
            cvi: round_to(cvi, 2),
        },
        risk_level: RiskLevel::from_cvi(cvi),
        rainfall_drop: RainfallDropScenario {
            adjusted_yield: round_to(drought_yield, 2),
            expected_revenue: round_to(params.base_price * drought_yield, 2),
        },
        price_crash: PriceCrashScenario {
            adjusted_price: round_to(crash_price, 2),
            expected_revenue: round_to(crash_price * params.base_yield, 2),
        },
        combined_shock: CombinedShockScenario {
            expected_revenue: round_to(combined, 2),
        },
    })
}

/// Run the simulation with an RNG seeded from `seed`, or from the OS when `None`
pub fn simulate_risk_seeded(params: &RiskSimulationParams, seed: Option<u64>) -> Result<RiskSimulationResult> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    simulate_risk(params, &mut rng)
}
