//! Trained market models
//!
//! The "brain" bundle holds a daily price forecaster, a yield regressor, the
//! historical price volatility and the last date the forecaster has seen. Every
//! component is optional; the engine falls back to heuristics when one is
//! missing or produces an unusable value.

use agrisage_core::{Error, FeatureVector, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Days forecast past the last known date
pub const FORECAST_HORIZON_DAYS: i64 = 90;

pub const DEFAULT_BRAIN_VOLATILITY: f64 = 0.15;

const DAYS_PER_YEAR: f64 = 365.25;
const DAYS_PER_WEEK: f64 = 7.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketModelError {
    #[error("market brain has no {0}")]
    MissingComponent(&'static str),

    #[error("{what} is not a positive finite number: {value}")]
    InvalidPrediction { what: &'static str, value: f64 },

    #[error("forecast date out of range")]
    DateOutOfRange,
}

/// Fourier coefficients `(cos, sin)` for harmonics 1..=n of one seasonal period
pub type SeasonalTerms = Vec<(f64, f64)>;

/// Additive daily price model: linear trend plus yearly and weekly seasonality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceForecaster {
    /// Day zero of the trend
    pub origin: NaiveDate,
    pub intercept: f64,
    /// Price change per day
    pub slope: f64,
    #[serde(default)]
    pub yearly: SeasonalTerms,
    #[serde(default)]
    pub weekly: SeasonalTerms,
}

fn seasonal(terms: &[(f64, f64)], t: f64, period: f64) -> f64 {
    terms
        .iter()
        .enumerate()
        .map(|(i, (a, b))| {
            let angle = 2.0 * PI * (i + 1) as f64 * t / period;
            a * angle.cos() + b * angle.sin()
        })
        .sum()
}

impl PriceForecaster {
    /// Point forecast for one day
    pub fn predict(&self, date: NaiveDate) -> f64 {
        let t = (date - self.origin).num_days() as f64;
        self.intercept
            + self.slope * t
            + seasonal(&self.yearly, t, DAYS_PER_YEAR)
            + seasonal(&self.weekly, t, DAYS_PER_WEEK)
    }

    /// Mean forecast over the `days` days after `last_date` (exclusive)
    pub fn average_forecast(&self, last_date: NaiveDate, days: i64) -> std::result::Result<f64, MarketModelError> {
        let mut total = 0.0;
        for offset in 1..=days {
            let date = last_date
                .checked_add_signed(Duration::days(offset))
                .ok_or(MarketModelError::DateOutOfRange)?;
            total += self.predict(date);
        }
        Ok(total / days as f64)
    }
}

/// Linear yield model over (N, P, rainfall, ph)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldRegressor {
    pub intercept: f64,
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub rainfall: f64,
    pub ph: f64,
}

impl YieldRegressor {
    /// Quintals per acre
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        self.intercept
            + self.nitrogen * features.n
            + self.phosphorus * features.p
            + self.rainfall * features.rainfall
            + self.ph * features.ph
    }
}

/// Price, yield and volatility from the trained models
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrainEstimate {
    pub price_per_quintal: f64,
    pub yield_per_acre: f64,
    pub volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketBrain {
    #[serde(default)]
    pub price_model: Option<PriceForecaster>,
    #[serde(default)]
    pub yield_model: Option<YieldRegressor>,
    #[serde(default)]
    pub volatility: Option<f64>,
    #[serde(default)]
    pub last_date: Option<NaiveDate>,
    /// Crop and district the models were fitted on, informational
    #[serde(default)]
    pub crop: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
}

impl MarketBrain {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Artifact(format!("market brain not found at {}", path.display())));
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn is_complete(&self) -> bool {
        self.price_model.is_some() && self.yield_model.is_some() && self.last_date.is_some()
    }

    /// Average price over the forecast horizon and the predicted yield
    pub fn estimate(&self, features: &FeatureVector) -> std::result::Result<BrainEstimate, MarketModelError> {
        let price_model = self.price_model.as_ref().ok_or(MarketModelError::MissingComponent("price model"))?;
        let yield_model = self.yield_model.as_ref().ok_or(MarketModelError::MissingComponent("yield model"))?;
        let last_date = self.last_date.ok_or(MarketModelError::MissingComponent("last date"))?;
        let volatility = self.volatility.unwrap_or(DEFAULT_BRAIN_VOLATILITY);

        let price = price_model.average_forecast(last_date, FORECAST_HORIZON_DAYS)?;
        let yield_per_acre = yield_model.predict(features);

        let checks = [
            ("price forecast", price),
            ("yield prediction", yield_per_acre),
            ("volatility", volatility),
        ];
        for (what, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(MarketModelError::InvalidPrediction { what, value });
            }
        }

        Ok(BrainEstimate {
            price_per_quintal: price,
            yield_per_acre,
            volatility,
        })
    }
}

/// Load the market brain, logging and returning `None` when it is unusable
pub fn load_brain<P: AsRef<Path>>(path: P) -> Option<MarketBrain> {
    let path = path.as_ref();
    match MarketBrain::load(path) {
        Ok(brain) => {
            info!(
                path = %path.display(),
                complete = brain.is_complete(),
                crop = brain.crop.as_deref().unwrap_or("unknown"),
                "Loaded market brain"
            );
            Some(brain)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Market brain unavailable");
            None
        }
    }
}
