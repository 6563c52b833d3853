//! Forest fire risk prediction service: loads a pre-fitted scaler and binary
//! classifier once, then answers `POST /predict` with a label and probability.

pub mod app;
pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod predictor;
pub mod scaler;
#[cfg(feature = "torch")]
pub mod torch;
pub mod types;

pub use app::{build_router, AppState};
pub use config::AppConfig;
pub use error::{InferenceError, PredictError, StartupError, ValidationError};
pub use features::FeatureSchema;
pub use model::Model;
pub use predictor::{Engine, Predictor};
pub use types::PredictionResult;
