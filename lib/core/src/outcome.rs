//! Degradation-aware results
//!
//! Optional enhancements (a trained model, an attribution backend, an external
//! vector index) may be missing or fail. The services never surface that as an
//! error; they fall back and return an [`Outcome::Degraded`] carrying the reason,
//! so callers and tests can tell which path produced the value.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// Produced by the preferred (primary) path
    Ok(T),
    /// Produced by a fallback path
    Degraded { value: T, reason: String },
}

impl<T> Outcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Outcome::Degraded { value, reason: reason.into() }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Ok(value) | Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Ok(value) | Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::Degraded { value, reason } => Outcome::Degraded { value: f(value), reason },
        }
    }
}
