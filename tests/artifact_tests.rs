//! Loading the JSON artifacts the way the binary does at startup.
use fire_risk_api::{AppConfig, Engine, Model, StartupError};
use serde_json::json;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn config(model: &str, meta: &str) -> AppConfig {
    AppConfig {
        model_path: fixture(model),
        scaler_path: fixture("scaler.json"),
        meta_path: fixture(meta),
        ..AppConfig::default()
    }
}

#[test]
fn forest_and_logistic_artifacts_both_load() {
    for model in ["forest.json", "logistic.json"] {
        let m = Model::load(&config(model, "meta.json"))
            .unwrap_or_else(|e| panic!("{} failed to load: {}", model, e));
        assert_eq!(m.schema().len(), 11);
        assert_eq!(m.schema().required().count(), 10);
    }
}

#[test]
fn logistic_flags_extreme_heat() {
    let engine = Engine::load(&config("logistic.json", "meta.json"));
    let out = engine
        .predict(&json!({
            "temperature": 120, "humidity": 10, "smoke": 2500,
            "temp_max": 130, "temp_min": 110, "pressure": 950,
            "clouds_all": 0.1, "wind_speed": 5, "wind_deg": 180,
            "temp_local": 115
        }))
        .unwrap();
    assert_eq!(out.label, 1);
    assert!(out.probability > 0.99 && out.probability <= 1.0);
}

#[test]
fn feature_list_narrower_than_artifacts_is_refused() {
    let err = Model::load(&config("forest.json", "meta_short.json")).unwrap_err();
    match err {
        StartupError::Invalid { what, reason } => {
            assert_eq!(what, "scaler");
            assert!(reason.contains("11"), "{}", reason);
        }
        other => panic!("unexpected: {}", other),
    }
}

#[test]
fn scaler_cannot_stand_in_for_a_classifier() {
    let cfg = AppConfig {
        model_path: fixture("scaler.json"),
        ..config("forest.json", "meta.json")
    };
    assert!(matches!(
        Model::load(&cfg),
        Err(StartupError::Parse { what: "classifier", .. })
    ));
}

#[cfg(not(feature = "torch"))]
#[test]
fn torchscript_artifact_needs_torch_build() {
    let engine = Engine::load(&config("torchscript.json", "meta.json"));
    assert!(!engine.is_ready());
}
