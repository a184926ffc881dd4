//! Values that may have been replaced by a documented default.
//!
//! Upstream failures in the pipeline never surface as errors. Instead the
//! affected stage hands back its fallback value together with a
//! [`Degradation`] describing what went wrong, so callers and tests can tell
//! a defaulted value from a genuine one.

use serde::{Deserialize, Serialize};

/// Why a value was replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// Every attempt against the upstream API failed.
    UpstreamExhausted { attempts: u32, last_error: String },
    /// The request was rejected before any network call.
    InvalidRequest { reason: String },
    /// The judge response did not contain two scores.
    Unscored { numbers_found: usize },
}

/// A value plus an optional note that it is a fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub degradation: Option<Degradation>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            degradation: None,
        }
    }

    pub fn degraded(value: T, degradation: Degradation) -> Self {
        Self {
            value,
            degradation: Some(degradation),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degradation.is_some()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            degradation: self.degradation,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}
