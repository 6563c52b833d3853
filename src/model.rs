use std::{fs, path::Path};

use serde::de::DeserializeOwned;

use crate::classifier::{label_of, BinaryClassifier, ClassifierArtifact};
use crate::config::AppConfig;
use crate::error::{InferenceError, StartupError};
use crate::features::FeatureSchema;
use crate::scaler::Scaler;

/// Scaler, classifier and the feature order they were fit with.
pub struct Model {
    schema: FeatureSchema,
    scaler: Scaler,
    classifier: Box<dyn BinaryClassifier>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("features", &self.schema.names())
            .field("scaler", &self.scaler)
            .finish_non_exhaustive()
    }
}

fn read_json<T: DeserializeOwned>(what: &'static str, path: &str) -> Result<T, StartupError> {
    let txt = fs::read_to_string(Path::new(path)).map_err(|source| StartupError::Read {
        what,
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&txt).map_err(|source| StartupError::Parse {
        what,
        path: path.to_string(),
        source,
    })
}

impl Model {
    /// Loads all three artifacts named by the config.
    pub fn load(cfg: &AppConfig) -> Result<Self, StartupError> {
        let schema = FeatureSchema::load(&cfg.meta_path)?;
        let scaler: Scaler = read_json("scaler", &cfg.scaler_path)?;
        let artifact: ClassifierArtifact = read_json("classifier", &cfg.model_path)?;
        let classifier = artifact.build()?;
        Self::new(schema, scaler, classifier)
    }

    /// Checks that the three pieces agree on width, then runs one warm-up row.
    pub fn new(
        schema: FeatureSchema,
        scaler: Scaler,
        classifier: Box<dyn BinaryClassifier>,
    ) -> Result<Self, StartupError> {
        scaler.check()?;
        let width = schema.len();
        if scaler.n_features() != width {
            return Err(StartupError::invalid(
                "scaler",
                format!(
                    "expects {} features but feat_list has {}",
                    scaler.n_features(),
                    width
                ),
            ));
        }
        if classifier.n_features() != width {
            return Err(StartupError::invalid(
                "classifier",
                format!(
                    "expects {} features but feat_list has {}",
                    classifier.n_features(),
                    width
                ),
            ));
        }

        let model = Self {
            schema,
            scaler,
            classifier,
        };
        let (label, p1) = model.score(&model.schema.warmup_vector())?;
        tracing::info!(label, probability = p1, "warmup prediction ok");
        Ok(model)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Scales a raw row and classifies it. Returns the label and P(class 1).
    pub fn score(&self, raw: &[f64]) -> Result<(u8, f64), InferenceError> {
        let scaled = self.scaler.transform(raw)?;
        let proba = self.classifier.predict_proba(&scaled)?;
        if let Some(bad) = proba.iter().copied().find(|p| !p.is_finite()) {
            return Err(InferenceError::NonFinite(bad));
        }
        Ok((label_of(&proba), proba[1]))
    }
}
