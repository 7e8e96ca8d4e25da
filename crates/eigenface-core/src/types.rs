use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Subject identifier. `0` is reserved for "unknown".
pub type SubjectId = u32;

/// Subject id returned when the best match falls below the threshold.
pub const UNKNOWN_SUBJECT: SubjectId = 0;

pub const DEFAULT_THRESHOLD: f32 = 0.5;
pub const DEFAULT_IMAGE_EXTENSION: &str = "pgm";
pub const DEFAULT_TRAINING_DATA_FILE: &str = "trainingData.json";

/// Distance used when comparing a projected face against the training set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Euclidean,
    /// Distance scaled per component by the inverse eigenvalue.
    #[default]
    Mahalanobis,
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Euclidean => f.write_str("euclidean"),
            Self::Mahalanobis => f.write_str("mahalanobis"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euclidean" | "euclidian" => Ok(Self::Euclidean),
            "mahalanobis" => Ok(Self::Mahalanobis),
            other => Err(format!("unknown distance metric: {other}")),
        }
    }
}

/// Where training faces come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingSource {
    /// Text file with one `subjectID imagePath` per line.
    Manifest,
    /// Directory with one numeric subfolder per subject.
    Directory,
}

impl FromStr for TrainingSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manifest" | "file" => Ok(Self::Manifest),
            "directory" | "dir" | "database" => Ok(Self::Directory),
            other => Err(format!("unknown training source: {other}")),
        }
    }
}

/// Recognition parameters. Setting them performs no computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Minimum accepted confidence in `[0, 1]`.
    pub threshold: f32,
    pub distance: DistanceMetric,
    /// Extension of face images inside a directory database (no dot).
    pub image_extension: String,
    /// Model file used when save/load is called without a path.
    pub training_file: PathBuf,
    /// Histogram-equalize faces before training and recognition.
    pub equalize: bool,
    /// Upper bound on the number of eigenfaces kept.
    pub max_components: Option<usize>,
    /// Output directory for the average face and eigenface images.
    pub artifact_dir: PathBuf,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            distance: DistanceMetric::default(),
            image_extension: DEFAULT_IMAGE_EXTENSION.to_string(),
            training_file: PathBuf::from(DEFAULT_TRAINING_DATA_FILE),
            equalize: false,
            max_components: None,
            artifact_dir: PathBuf::from("."),
        }
    }
}

impl RecognitionConfig {
    pub fn new(
        threshold: f32,
        distance: DistanceMetric,
        image_extension: impl Into<String>,
        training_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            threshold,
            distance,
            image_extension: image_extension.into(),
            training_file: training_file.into(),
            ..Self::default()
        }
    }
}

/// One candidate identity for a queried face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub subject: SubjectId,
    /// Confidence in `[0, 1]`. Higher = closer.
    pub confidence: f32,
}

impl RecognitionResult {
    pub fn is_unknown(&self) -> bool {
        self.subject == UNKNOWN_SUBJECT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_metric_parse() {
        assert_eq!("euclidean".parse::<DistanceMetric>(), Ok(DistanceMetric::Euclidean));
        assert_eq!(" Mahalanobis ".parse::<DistanceMetric>(), Ok(DistanceMetric::Mahalanobis));
        assert!("cosine".parse::<DistanceMetric>().is_err());
    }

    #[test]
    fn test_distance_metric_display_round_trips() {
        for metric in [DistanceMetric::Euclidean, DistanceMetric::Mahalanobis] {
            assert_eq!(metric.to_string().parse::<DistanceMetric>(), Ok(metric));
        }
    }

    #[test]
    fn test_training_source_aliases() {
        assert_eq!("file".parse::<TrainingSource>(), Ok(TrainingSource::Manifest));
        assert_eq!("database".parse::<TrainingSource>(), Ok(TrainingSource::Directory));
        assert!("sql".parse::<TrainingSource>().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = RecognitionConfig::default();
        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
        assert_eq!(config.distance, DistanceMetric::Mahalanobis);
        assert_eq!(config.image_extension, "pgm");
        assert_eq!(config.training_file, PathBuf::from("trainingData.json"));
        assert!(!config.equalize);
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config: RecognitionConfig =
            serde_json::from_str(r#"{"threshold": 0.8, "distance": "euclidean"}"#).unwrap();
        assert_eq!(config.threshold, 0.8);
        assert_eq!(config.distance, DistanceMetric::Euclidean);
        assert_eq!(config.image_extension, "pgm");
    }

    #[test]
    fn test_unknown_result() {
        let r = RecognitionResult { subject: UNKNOWN_SUBJECT, confidence: 0.1 };
        assert!(r.is_unknown());
    }
}
