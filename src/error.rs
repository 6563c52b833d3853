use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Client-side problems with a `/predict` body. Always a 400.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Request body must be a JSON object.")]
    MissingBody,
    #[error("Missing required input parameters: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("Invalid value for '{field}': expected a number.")]
    InvalidFormat { field: String },
}

/// Failures raised by the scaler or classifier while serving a request.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("feature length mismatch: got {got}, expected {expected}")]
    DimensionMismatch { got: usize, expected: usize },
    #[error("model produced a non-finite probability: {0}")]
    NonFinite(f64),
    #[error("unexpected model output: {0}")]
    BadOutput(String),
    #[cfg(feature = "torch")]
    #[error("torch: {0}")]
    Torch(#[from] tch::TchError),
}

/// Artifact problems detected while the process starts.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read {what} at {path}: {source}")]
    Read {
        what: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {what} at {path}: {source}")]
    Parse {
        what: &'static str,
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {what}: {reason}")]
    Invalid { what: &'static str, reason: String },
    #[error("warmup prediction failed: {0}")]
    Warmup(#[from] InferenceError),
    #[cfg(feature = "torch")]
    #[error("failed to load TorchScript {path}: {source}")]
    Torch {
        path: String,
        #[source]
        source: tch::TchError,
    },
}

impl StartupError {
    pub(crate) fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            what,
            reason: reason.into(),
        }
    }
}

/// Everything `/predict` can answer with besides a prediction.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("model not loaded: {0}")]
    NotLoaded(String),
    /// The body could not be read at all (too large, aborted upload).
    #[error("{message}")]
    Body { status: StatusCode, message: String },
}

impl PredictError {
    pub fn status(&self) -> StatusCode {
        match self {
            PredictError::Validation(_) => StatusCode::BAD_REQUEST,
            PredictError::Inference(_) | PredictError::NotLoaded(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            PredictError::Body { status, .. } => *status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            missing: None,
            field: None,
        }
    }
}

impl From<&PredictError> for ErrorBody {
    fn from(err: &PredictError) -> Self {
        let mut body = ErrorBody::new(err.to_string());
        match err {
            PredictError::Validation(ValidationError::MissingFields(names)) => {
                body.missing = Some(names.clone());
            }
            PredictError::Validation(ValidationError::InvalidFormat { field }) => {
                body.field = Some(field.clone());
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody::from(&self))).into_response()
    }
}
