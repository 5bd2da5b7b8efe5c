//! Soil and climate feature vectors
//!
//! Every decision service consumes the same seven features in the same order.
//! [`normalize_features`] is the single entry point that turns raw estimates into
//! a [`FeatureVector`] the services can trust: each value is clamped into its
//! agronomic range and rounded to two decimals.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const FEATURE_COUNT: usize = 7;

/// One of the seven model input features, in model column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Feature {
    #[serde(rename = "N")]
    Nitrogen,
    #[serde(rename = "P")]
    Phosphorus,
    #[serde(rename = "K")]
    Potassium,
    #[serde(rename = "temperature")]
    Temperature,
    #[serde(rename = "humidity")]
    Humidity,
    #[serde(rename = "rainfall")]
    Rainfall,
    #[serde(rename = "ph")]
    Ph,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Nitrogen,
        Feature::Phosphorus,
        Feature::Potassium,
        Feature::Temperature,
        Feature::Humidity,
        Feature::Rainfall,
        Feature::Ph,
    ];

    /// Column name used by artifacts and datasets
    pub fn name(self) -> &'static str {
        match self {
            Feature::Nitrogen => "N",
            Feature::Phosphorus => "P",
            Feature::Potassium => "K",
            Feature::Temperature => "temperature",
            Feature::Humidity => "humidity",
            Feature::Rainfall => "rainfall",
            Feature::Ph => "ph",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Closed interval every normalized value lies in
    pub fn range(self) -> (f64, f64) {
        match self {
            Feature::Nitrogen => (10.0, 150.0),
            Feature::Phosphorus => (5.0, 120.0),
            Feature::Potassium => (5.0, 150.0),
            Feature::Temperature => (10.0, 45.0),
            Feature::Humidity => (20.0, 100.0),
            Feature::Rainfall => (0.0, 500.0),
            Feature::Ph => (3.5, 9.5),
        }
    }

    pub fn from_name(name: &str) -> Option<Feature> {
        Feature::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The seven soil/climate inputs of one request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(rename = "N")]
    pub n: f64,
    #[serde(rename = "P")]
    pub p: f64,
    #[serde(rename = "K")]
    pub k: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
    pub ph: f64,
}

impl FeatureVector {
    #[must_use]
    pub fn new(n: f64, p: f64, k: f64, temperature: f64, humidity: f64, rainfall: f64, ph: f64) -> Self {
        Self { n, p, k, temperature, humidity, rainfall, ph }
    }

    #[must_use]
    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        let [n, p, k, temperature, humidity, rainfall, ph] = values;
        Self { n, p, k, temperature, humidity, rainfall, ph }
    }

    /// Values in model column order
    #[must_use]
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [self.n, self.p, self.k, self.temperature, self.humidity, self.rainfall, self.ph]
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.to_array()[feature.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> {
        Feature::ALL.into_iter().zip(self.to_array())
    }

    /// True when every value already sits inside its range at two-decimal precision
    pub fn is_normalized(&self) -> bool {
        self.iter().all(|(feature, value)| {
            let (lo, hi) = feature.range();
            value >= lo && value <= hi && round_to(value, 2) == value
        })
    }
}

/// Round half away from zero to `decimals` places
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Clamp a single value into its feature range and round it to 2 decimals
pub fn clamp_feature(feature: Feature, value: f64) -> Result<f64> {
    if value.is_nan() {
        return Err(Error::InvalidFeature { feature: feature.name(), value });
    }
    let (lo, hi) = feature.range();
    Ok(round_to(value.clamp(lo, hi), 2))
}

/// Clamp every field into its range, then round to 2 decimals.
///
/// Out-of-range values are clamped, never rejected. Only NaN, which has no
/// position relative to the bounds, is an error. Idempotent.
pub fn normalize_features(raw: &FeatureVector) -> Result<FeatureVector> {
    let mut out = [0.0; FEATURE_COUNT];
    for (feature, value) in raw.iter() {
        out[feature.index()] = clamp_feature(feature, value)?;
    }
    Ok(FeatureVector::from_array(out))
}
