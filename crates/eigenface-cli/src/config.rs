use anyhow::{Context, Result};
use eigenface_core::{DistanceMetric, RecognitionConfig};
use std::path::{Path, PathBuf};

/// Build recognition settings: defaults, then an optional TOML file, then
/// `EIGENFACE_*` environment variables.
pub fn load(config_file: Option<&Path>) -> Result<RecognitionConfig> {
    let base = match config_file {
        Some(path) => from_toml_file(path)?,
        None => RecognitionConfig::default(),
    };
    Ok(apply_env(base, |key| std::env::var(key).ok()))
}

/// Read a TOML file; missing keys keep their defaults.
pub fn from_toml_file(path: &Path) -> Result<RecognitionConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
}

/// Overlay environment values. Unparsable values are ignored.
pub fn apply_env(mut config: RecognitionConfig, var: impl Fn(&str) -> Option<String>) -> RecognitionConfig {
    if let Some(v) = parsed::<f32>(&var, "EIGENFACE_THRESHOLD") {
        config.threshold = v;
    }
    if let Some(v) = parsed::<DistanceMetric>(&var, "EIGENFACE_DISTANCE") {
        config.distance = v;
    }
    if let Some(v) = var("EIGENFACE_IMAGE_EXTENSION").filter(|v| !v.is_empty()) {
        config.image_extension = v;
    }
    if let Some(v) = var("EIGENFACE_TRAINING_FILE").filter(|v| !v.is_empty()) {
        config.training_file = PathBuf::from(v);
    }
    if let Some(v) = var("EIGENFACE_EQUALIZE") {
        config.equalize = v != "0" && !v.eq_ignore_ascii_case("false");
    }
    if let Some(v) = parsed::<usize>(&var, "EIGENFACE_MAX_COMPONENTS") {
        config.max_components = Some(v);
    }
    if let Some(v) = var("EIGENFACE_ARTIFACT_DIR").filter(|v| !v.is_empty()) {
        config.artifact_dir = PathBuf::from(v);
    }
    config
}

fn parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable environment value");
            None
        }
    }
}
