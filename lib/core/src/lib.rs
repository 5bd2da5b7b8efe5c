//! # AgriSage Core
//!
//! Shared building blocks for the AgriSage decision services.
//!
//! - [`FeatureVector`] - the seven soil/climate inputs, with [`normalize_features`]
//! - [`Vector`] - dense embedding vectors used by policy retrieval
//! - [`Outcome`] - a value tagged with the path (primary or fallback) that produced it
//! - [`CoreConfig`] - artifact locations and tuning knobs
//! - [`Error`] - the error type shared by every crate in the workspace
//!
//! ## Example
//!
//! ```rust
//! use agrisage_core::{normalize_features, FeatureVector};
//!
//! let raw = FeatureVector::new(90.0, 42.0, 43.0, 28.0, 80.0, 620.0, 6.5);
//! let features = normalize_features(&raw).unwrap();
//! assert_eq!(features.rainfall, 500.0);
//! ```

pub mod config;
pub mod error;
pub mod features;
pub mod outcome;
pub mod vector;

pub use config::CoreConfig;
pub use error::{Error, Result};
pub use features::{clamp_feature, normalize_features, round_to, Feature, FeatureVector, FEATURE_COUNT};
pub use outcome::Outcome;
pub use vector::Vector;
