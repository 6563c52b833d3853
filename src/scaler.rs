use serde::Deserialize;

use crate::error::{InferenceError, StartupError};

/// Pre-fitted normalization exported from the training side.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

impl Scaler {
    pub fn n_features(&self) -> usize {
        match self {
            Scaler::Standard { mean, .. } => mean.len(),
            Scaler::MinMax { min, .. } => min.len(),
        }
    }

    pub(crate) fn check(&self) -> Result<(), StartupError> {
        let (a, b) = match self {
            Scaler::Standard { mean, scale } => (mean, scale),
            Scaler::MinMax { min, scale } => (min, scale),
        };
        if a.is_empty() || a.len() != b.len() {
            return Err(StartupError::invalid(
                "scaler",
                format!("parameter lengths {} and {} do not match", a.len(), b.len()),
            ));
        }
        if a.iter().chain(b).any(|p| !p.is_finite()) {
            return Err(StartupError::invalid("scaler", "non-finite parameter"));
        }
        Ok(())
    }

    pub fn transform(&self, x: &[f64]) -> Result<Vec<f64>, InferenceError> {
        let expected = self.n_features();
        if x.len() != expected {
            return Err(InferenceError::DimensionMismatch {
                got: x.len(),
                expected,
            });
        }
        let out = match self {
            Scaler::Standard { mean, scale } => x
                .iter()
                .zip(mean.iter().zip(scale))
                // zero-variance columns keep a unit scale
                .map(|(v, (m, s))| (v - m) / if *s == 0.0 { 1.0 } else { *s })
                .collect(),
            Scaler::MinMax { min, scale } => x
                .iter()
                .zip(min.iter().zip(scale))
                .map(|(v, (m, s))| v * s + m)
                .collect(),
        };
        Ok(out)
    }
}
