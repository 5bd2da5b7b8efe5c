//! # AgriSage Market
//!
//! Revenue outlook for recommended crops.
//!
//! - [`MarketBrain`] - trained price forecaster and yield regressor (optional)
//! - [`simulate_risk`] - Monte-Carlo revenue simulation with shock scenarios
//! - [`MarketRiskEngine`] - per-crop outlook, ranked by expected total revenue
//!
//! ```rust
//! use agrisage_market::{simulate_risk_seeded, RiskSimulationParams};
//!
//! let params = RiskSimulationParams::new(3800.0, 32.0, 650.0);
//! let result = simulate_risk_seeded(&params, Some(42)).unwrap();
//! assert_eq!(result.combined_shock.expected_revenue, 68400.0);
//! ```

pub mod brain;
pub mod engine;
pub mod simulation;

pub use brain::{load_brain, BrainEstimate, MarketBrain, MarketModelError, PriceForecaster, YieldRegressor};
pub use engine::{
    heuristic_metrics, CropCandidate, CropMarketOutlook, MarketConfig, MarketMetrics, MarketPrediction,
    MarketRiskEngine, MetricsSource,
};
pub use simulation::{
    percentile, simulate_risk, simulate_risk_seeded, BaselineRisk, CombinedShockScenario, PriceCrashScenario,
    RainfallDropScenario, RiskLevel, RiskSimulationParams, RiskSimulationResult,
};
