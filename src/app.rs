use std::{any::Any, sync::Arc};

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::error::{ErrorBody, PredictError};
use crate::features::parse_body;
use crate::predictor::Engine;
use crate::types::{Liveness, PredictionResult, Readiness, LIVENESS_MESSAGE};

// ---------- Server state ----------

/// Largest `/predict` body accepted unless configured otherwise.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_body_limit(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);

    Router::new()
        .route("/", get(home))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/predict", post(predict).layer(body_limit))
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ---------- Handlers ----------

async fn home() -> Json<Liveness> {
    Json(Liveness {
        message: LIVENESS_MESSAGE.to_string(),
    })
}

async fn healthz() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    match state.engine.as_ref() {
        Engine::Ready(p) => (
            StatusCode::OK,
            Json(Readiness {
                status: "ready".into(),
                features: Some(p.model().schema().names().to_vec()),
                error: None,
            }),
        ),
        Engine::Unavailable(reason) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Readiness {
                status: "unavailable".into(),
                features: None,
                error: Some(reason.clone()),
            }),
        ),
    }
}

async fn predict(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<PredictionResult>, PredictError> {
    let body = body.map_err(|rejection| {
        tracing::warn!(status = %rejection.status(), "unreadable predict body");
        PredictError::Body {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    })?;
    let map = parse_body(&body).map_err(|e| {
        tracing::warn!(error = %e, "rejected predict body");
        PredictError::from(e)
    })?;

    match state.engine.predict(&Value::Object(map)) {
        Ok(result) => Ok(Json(result)),
        Err(err @ PredictError::Validation(_)) => {
            tracing::warn!(error = %err, "invalid predict input");
            Err(err)
        }
        Err(err) => {
            tracing::error!(error = %err, "prediction failed");
            Err(err)
        }
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new(format!("internal error: {}", detail))),
    )
        .into_response()
}
