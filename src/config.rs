use std::{env, str::FromStr};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model_path: String,
    pub scaler_path: String,
    pub meta_path: String,
    pub host: String,
    pub port: u16,
    /// Log a summary of every feature vector (`LOG_PRED=1`).
    pub log_pred: bool,
    pub max_body_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: "forest_fire_model.json".to_string(),
            scaler_path: "scaler.json".to_string(),
            meta_path: "meta.json".to_string(),
            host: "0.0.0.0".to_string(),
            port: 10000,
            log_pred: false,
            max_body_bytes: 64 * 1024,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_env_prefixed("")
    }

    /// Same as `from_env`, reading `{prefix}MODEL_PATH` and so on.
    pub fn from_env_prefixed(prefix: &str) -> Self {
        let d = Self::default();
        let key = |name: &str| format!("{}{}", prefix, name);
        Self {
            model_path: env::var(key("MODEL_PATH")).unwrap_or(d.model_path),
            scaler_path: env::var(key("SCALER_PATH")).unwrap_or(d.scaler_path),
            meta_path: env::var(key("META_PATH")).unwrap_or(d.meta_path),
            host: env::var(key("HOST")).unwrap_or(d.host),
            port: env_or(&key("PORT"), d.port),
            log_pred: env::var(key("LOG_PRED")).ok().as_deref() == Some("1"),
            max_body_bytes: env_or(&key("MAX_BODY_BYTES"), d.max_body_bytes),
        }
    }
}

/// Typed env lookup, falling back to `default` when unset or unparseable.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}
