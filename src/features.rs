//! Feature schema and request vectorization.
//!
//! The order of `feat_list` is the order the scaler and classifier were fit
//! with. It ships next to the artifacts in `meta.json` and is never derived
//! from the request.

use serde::Deserialize;
use serde_json::{value::RawValue, Map, Value};
use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::Path,
};

use crate::error::{StartupError, ValidationError};

/// Optional reading filled in when a request omits it.
pub const WIND_GUST: &str = "wind_gust";

#[derive(Deserialize)]
struct MetaJson {
    feat_list: Vec<String>,
    in_dim: Option<usize>,
    defaults: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    names: Vec<String>,
    /// `Some(v)` marks an optional feature and its fill value.
    fill: Vec<Option<f64>>,
}

impl FeatureSchema {
    /// Builds a schema from an ordered name list and the optional features.
    pub fn new(
        names: Vec<String>,
        defaults: &BTreeMap<String, f64>,
    ) -> Result<Self, StartupError> {
        if names.is_empty() {
            return Err(StartupError::invalid("feature schema", "feat_list is empty"));
        }
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(StartupError::invalid(
                    "feature schema",
                    format!("duplicate feature '{}'", name),
                ));
            }
        }
        for (name, value) in defaults {
            if !seen.contains(name.as_str()) {
                return Err(StartupError::invalid(
                    "feature schema",
                    format!("default given for unknown feature '{}'", name),
                ));
            }
            if !value.is_finite() {
                return Err(StartupError::invalid(
                    "feature schema",
                    format!("default for '{}' is not finite", name),
                ));
            }
        }
        let fill = names.iter().map(|n| defaults.get(n).copied()).collect();
        Ok(Self { names, fill })
    }

    pub fn from_meta_str(text: &str, path: &str) -> Result<Self, StartupError> {
        let meta: MetaJson = serde_json::from_str(text).map_err(|source| StartupError::Parse {
            what: "feature meta",
            path: path.to_string(),
            source,
        })?;

        if let Some(in_dim) = meta.in_dim {
            if in_dim != meta.feat_list.len() {
                tracing::warn!(
                    "meta.in_dim ({}) != feat_list.len() ({}); using feat_list.len()",
                    in_dim,
                    meta.feat_list.len()
                );
            }
        }

        let defaults = match meta.defaults {
            Some(explicit) => explicit,
            // Unstated defaults only cover wind_gust, and only if the artifact uses it.
            None => meta
                .feat_list
                .iter()
                .filter(|n| n.as_str() == WIND_GUST)
                .map(|n| (n.clone(), 0.0))
                .collect(),
        };
        Self::new(meta.feat_list, &defaults)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| StartupError::Read {
            what: "feature meta",
            path: shown.clone(),
            source,
        })?;
        Self::from_meta_str(&text, &shown)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names a request must carry, in artifact order.
    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.names
            .iter()
            .zip(&self.fill)
            .filter(|(_, fill)| fill.is_none())
            .map(|(name, _)| name.as_str())
    }

    /// Vector used for the startup warm-up: defaults where known, zero elsewhere.
    pub fn warmup_vector(&self) -> Vec<f64> {
        self.fill.iter().map(|f| f.unwrap_or(0.0)).collect()
    }

    /// Validates a decoded body and lays it out in artifact order.
    ///
    /// Missing required names are all reported at once and take precedence
    /// over malformed values. Unknown keys are ignored.
    pub fn vectorize(&self, body: &Value) -> Result<Vec<f64>, ValidationError> {
        let map = body.as_object().ok_or(ValidationError::MissingBody)?;

        let mut missing = Vec::new();
        let mut invalid: Option<&String> = None;
        let mut v = Vec::with_capacity(self.names.len());
        for (name, fill) in self.names.iter().zip(&self.fill) {
            match (map.get(name), fill) {
                (Some(raw), _) => match coerce(raw) {
                    Some(x) => v.push(x),
                    None => {
                        invalid.get_or_insert(name);
                    }
                },
                (None, Some(default)) => v.push(*default),
                (None, None) => missing.push(name.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }
        if let Some(field) = invalid {
            return Err(ValidationError::InvalidFormat {
                field: field.clone(),
            });
        }
        Ok(v)
    }
}

/// Decodes a raw request body into a JSON object.
///
/// Each value is decoded on its own, so a number outside the `f64` range
/// only poisons its own key: it is kept as `null` and later rejected under
/// that field's name.
pub fn parse_body(bytes: &[u8]) -> Result<Map<String, Value>, ValidationError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationError::MissingBody);
    }
    let raw: BTreeMap<String, Box<RawValue>> =
        serde_json::from_slice(bytes).map_err(|_| ValidationError::MissingBody)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let decoded = serde_json::from_str(value.get()).unwrap_or(Value::Null);
            (key, decoded)
        })
        .collect())
}

/// Numbers pass through; numeric strings are parsed. Everything else, and
/// anything non-finite, is rejected.
fn coerce(raw: &Value) -> Option<f64> {
    let x = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    x.is_finite().then_some(x)
}
