use serde::Serialize;

pub const FIRE_RISK_MESSAGE: &str = "🔥 Fire Risk Detected!";
pub const NO_FIRE_RISK_MESSAGE: &str = "✅ No Fire Risk Detected.";
pub const LIVENESS_MESSAGE: &str = "🌲 Vanrakshak Forest Fire Prediction API is running successfully!";

/// Decimal places kept in the reported probability.
pub const PROBABILITY_DECIMALS: i32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    /// 0 = no risk, 1 = fire risk
    pub label: u8,
    /// P(fire risk), rounded for presentation
    pub probability: f64,
    pub message: String,
}

impl PredictionResult {
    pub fn new(label: u8, probability: f64) -> Self {
        let message = if label == 1 {
            FIRE_RISK_MESSAGE
        } else {
            NO_FIRE_RISK_MESSAGE
        };
        Self {
            label,
            probability: round_to(probability.clamp(0.0, 1.0), PROBABILITY_DECIMALS),
            message: message.to_string(),
        }
    }
}

fn round_to(x: f64, decimals: i32) -> f64 {
    let k = 10f64.powi(decimals);
    (x * k).round() / k
}

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Readiness {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
