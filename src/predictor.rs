//! The prediction request handler, independent of HTTP.

use serde_json::Value;

use crate::config::AppConfig;
use crate::error::PredictError;
use crate::model::Model;
use crate::types::PredictionResult;

/// Outcome of the one-time artifact load. Built before the server accepts
/// connections and never changed afterwards.
#[derive(Debug)]
pub enum Engine {
    Ready(Predictor),
    /// Artifacts failed to load; carries the startup error text.
    Unavailable(String),
}

impl Engine {
    pub fn load(cfg: &AppConfig) -> Self {
        match Model::load(cfg) {
            Ok(model) => {
                tracing::info!(
                    "loaded model; feat_list[{}]: {:?}",
                    model.schema().len(),
                    model.schema().names()
                );
                Engine::Ready(Predictor::new(model).with_vector_logging(cfg.log_pred))
            }
            Err(err) => {
                tracing::error!(error = %err, "model artifacts failed to load; serving errors only");
                Engine::Unavailable(err.to_string())
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Engine::Ready(_))
    }

    pub fn predict(&self, raw: &Value) -> Result<PredictionResult, PredictError> {
        match self {
            Engine::Ready(p) => p.predict(raw),
            Engine::Unavailable(reason) => Err(PredictError::NotLoaded(reason.clone())),
        }
    }
}

#[derive(Debug)]
pub struct Predictor {
    model: Model,
    log_vectors: bool,
}

impl Predictor {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            log_vectors: false,
        }
    }

    pub fn with_vector_logging(mut self, on: bool) -> Self {
        self.log_vectors = on;
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Validates `raw`, builds the ordered feature vector and classifies it.
    pub fn predict(&self, raw: &Value) -> Result<PredictionResult, PredictError> {
        let vec = self.model.schema().vectorize(raw)?;

        // Debug signal so we can confirm what the model actually sees
        if self.log_vectors {
            let sample: Vec<String> = self
                .model
                .schema()
                .names()
                .iter()
                .zip(&vec)
                .map(|(name, x)| format!("{}={:.3}", name, x))
                .collect();
            tracing::info!("recv in_dim={} vector=[{}]", vec.len(), sample.join(", "));
        }

        let (label, p1) = self.model.score(&vec)?;
        let result = PredictionResult::new(label, p1);
        tracing::debug!(label = result.label, probability = result.probability, "prediction");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::LogisticRegression;
    use crate::error::ValidationError;
    use crate::features::FeatureSchema;
    use crate::scaler::Scaler;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn predictor() -> Predictor {
        let mut defaults = BTreeMap::new();
        defaults.insert("wind_gust".to_string(), 0.0);
        let schema = FeatureSchema::new(
            vec!["smoke".into(), "wind_gust".into(), "humidity".into()],
            &defaults,
        )
        .unwrap();
        let scaler = Scaler::Standard {
            mean: vec![500.0, 5.0, 50.0],
            scale: vec![250.0, 5.0, 20.0],
        };
        let clf = LogisticRegression {
            coef: vec![2.0, 0.5, -1.5],
            intercept: -0.25,
        };
        Predictor::new(Model::new(schema, scaler, Box::new(clf)).unwrap())
    }

    #[test]
    fn predicts_label_and_probability_in_range() {
        let out = predictor()
            .predict(&json!({"smoke": 2500, "wind_gust": 12.0, "humidity": 8}))
            .unwrap();
        assert_eq!(out.label, 1);
        assert!((0.0..=1.0).contains(&out.probability));

        let out = predictor()
            .predict(&json!({"smoke": 10, "humidity": 95}))
            .unwrap();
        assert_eq!(out.label, 0);
    }

    #[test]
    fn omitted_wind_gust_matches_explicit_zero() {
        let p = predictor();
        let a = p.predict(&json!({"smoke": 700, "humidity": 30})).unwrap();
        let b = p
            .predict(&json!({"smoke": 700, "humidity": 30, "wind_gust": 0.0}))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn identical_input_gives_identical_output() {
        let p = predictor();
        let body = json!({"smoke": 812.25, "humidity": 41.0, "wind_gust": 3.3});
        let a = serde_json::to_string(&p.predict(&body).unwrap()).unwrap();
        let b = serde_json::to_string(&p.predict(&body).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn validation_failures_surface_unchanged() {
        let err = predictor().predict(&json!({"smoke": 1})).unwrap_err();
        match err {
            PredictError::Validation(ValidationError::MissingFields(names)) => {
                assert_eq!(names, vec!["humidity".to_string()]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn unavailable_engine_reports_the_load_error() {
        let engine = Engine::Unavailable("failed to read scaler".into());
        assert!(!engine.is_ready());
        let err = engine.predict(&json!({})).unwrap_err();
        assert_eq!(err.to_string(), "model not loaded: failed to read scaler");
    }
}
