//! eigenface-core — Eigenface face recognition engine.
//!
//! Trains a PCA eigenspace from labeled face images, stores it as a
//! checksummed JSON model, and classifies new faces by nearest neighbour
//! (Euclidean or Mahalanobis) in that space.

pub mod artifacts;
pub mod face;
pub mod manifest;
pub mod matcher;
pub mod model;
pub mod pca;
pub mod recognizer;
pub mod types;

pub use face::FaceImage;
pub use manifest::{ManifestEntry, TrainingImage};
pub use model::Model;
pub use recognizer::{
    EvaluationEntry, Outcome, PerformanceReport, Recognition, RecognitionError, TrainingSummary,
};
pub use types::{
    DistanceMetric, RecognitionConfig, RecognitionResult, SubjectId, TrainingSource,
    UNKNOWN_SUBJECT,
};
