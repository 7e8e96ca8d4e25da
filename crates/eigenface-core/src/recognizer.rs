//! Eigenface recognizer: training, persistence and classification.

use crate::artifacts::{self, ArtifactError};
use crate::face::{FaceError, FaceImage};
use crate::manifest::{self, ManifestError, TrainingImage};
use crate::matcher::Gallery;
use crate::model::{Model, ModelError};
use crate::pca::{Eigenspace, PcaError};
use crate::types::{RecognitionConfig, RecognitionResult, SubjectId, TrainingSource};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("no face images found in {0}")]
    NoImages(String),
    #[error("image {index} is {got_w}x{got_h}, expected {expected_w}x{expected_h}")]
    DimensionMismatch {
        index: usize,
        expected_w: u32,
        expected_h: u32,
        got_w: u32,
        got_h: u32,
    },
    #[error("no trained model — call train() or load_training_data() first")]
    NotTrained,
    #[error("recognition threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f32),
    #[error("image extension must not be empty")]
    InvalidExtension,
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("face error: {0}")]
    Face(#[from] FaceError),
    #[error("PCA failed: {0}")]
    Pca(#[from] PcaError),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

impl RecognitionError {
    /// Integer status for callers that only carry a code.
    pub fn status_code(&self) -> i32 {
        match self {
            Self::NoImages(_) => -1,
            Self::DimensionMismatch { .. } => -2,
            Self::Pca(PcaError::DimensionMismatch { .. }) => -2,
            Self::Manifest(_) | Self::Face(_) | Self::Model(_) | Self::Artifact(_) => -3,
            Self::Pca(_) => -4,
            Self::NotTrained => -5,
            Self::InvalidThreshold(_) | Self::InvalidExtension => -6,
        }
    }
}

/// What a training run produced.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub faces: usize,
    pub subjects: usize,
    pub components: usize,
    pub width: u32,
    pub height: u32,
    /// Visualization images written, if requested.
    pub artifacts: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    Wrong,
    Unknown,
}

/// Result for one labeled test face.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationEntry {
    pub path: PathBuf,
    pub expected: SubjectId,
    pub predicted: SubjectId,
    pub confidence: f32,
    pub outcome: Outcome,
}

/// Batch evaluation over a labeled manifest.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceReport {
    pub entries: Vec<EvaluationEntry>,
    pub correct: usize,
    pub wrong: usize,
    pub unknown: usize,
}

impl PerformanceReport {
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Fraction of faces recognized as the right subject.
    pub fn accuracy(&self) -> f32 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.correct as f32 / self.entries.len() as f32
        }
    }
}

/// Eigenface recognizer. Owns at most one trained model.
pub struct Recognition {
    config: RecognitionConfig,
    model: Option<Model>,
}

impl Recognition {
    pub fn new(config: RecognitionConfig) -> Result<Self, RecognitionError> {
        validate_config(&config)?;
        Ok(Self {
            config,
            model: None,
        })
    }

    /// Replace the recognition parameters. The current model is kept.
    pub fn initialize(&mut self, config: RecognitionConfig) -> Result<(), RecognitionError> {
        validate_config(&config)?;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    /// Learn faces from a manifest file or a directory database.
    ///
    /// Once PCA succeeds the previous model, if any, is replaced. When
    /// `save_eigenfaces` is set, the average face and eigenface mosaic are
    /// written to the configured artifact directory; a write failure is
    /// returned but the new model stays loaded.
    pub fn train(
        &mut self,
        source: TrainingSource,
        path: &Path,
        save_eigenfaces: bool,
    ) -> Result<TrainingSummary, RecognitionError> {
        let entries = match source {
            TrainingSource::Manifest => manifest::read_manifest(path)?,
            TrainingSource::Directory => manifest::scan_directory(path, &self.config.image_extension)?,
        };
        if entries.is_empty() {
            return Err(RecognitionError::NoImages(path.display().to_string()));
        }

        let images = manifest::load_images(&entries)?;
        tracing::info!(faces = images.len(), source = ?source, path = %path.display(), "training faces loaded");

        let model = self.build_model(images)?;
        let mut summary = TrainingSummary {
            faces: model.training_faces(),
            subjects: model.subject_ids().len(),
            components: model.components(),
            width: model.width,
            height: model.height,
            artifacts: Vec::new(),
        };
        tracing::info!(
            faces = summary.faces,
            subjects = summary.subjects,
            components = summary.components,
            "training complete"
        );

        // The model is kept even if the images below cannot be written.
        let model = self.model.insert(model);

        if save_eigenfaces {
            summary.artifacts = artifacts::save_eigenfaces(
                &self.config.artifact_dir,
                &model.mean_face,
                &model.eigenfaces,
                model.width,
                model.height,
            )
            .inspect_err(|e| {
                tracing::warn!(error = %e, "eigenface images not written, trained model kept");
            })?;
        }

        Ok(summary)
    }

    /// Train directly from decoded faces.
    pub fn train_images(&mut self, images: Vec<TrainingImage>) -> Result<TrainingSummary, RecognitionError> {
        if images.is_empty() {
            return Err(RecognitionError::NoImages("<memory>".into()));
        }
        let model = self.build_model(images)?;
        let summary = TrainingSummary {
            faces: model.training_faces(),
            subjects: model.subject_ids().len(),
            components: model.components(),
            width: model.width,
            height: model.height,
            artifacts: Vec::new(),
        };
        self.model = Some(model);
        Ok(summary)
    }

    fn build_model(&self, images: Vec<TrainingImage>) -> Result<Model, RecognitionError> {
        let (width, height) = images[0].face.dimensions();
        for (index, img) in images.iter().enumerate() {
            let (w, h) = img.face.dimensions();
            if (w, h) != (width, height) {
                return Err(RecognitionError::DimensionMismatch {
                    index,
                    expected_w: width,
                    expected_h: height,
                    got_w: w,
                    got_h: h,
                });
            }
        }

        let equalize = self.config.equalize;
        let (subjects, vectors): (Vec<SubjectId>, Vec<Vec<f64>>) = images
            .into_iter()
            .map(|img| {
                let face = if equalize { img.face.equalized() } else { img.face };
                (img.subject, face.to_vector())
            })
            .unzip();

        let space = Eigenspace::compute(&vectors, self.config.max_components)?;
        let projections = vectors.iter().map(|v| space.project(v)).collect();

        Ok(Model {
            width,
            height,
            equalized: equalize,
            mean_face: space.mean,
            eigenfaces: space.eigenfaces,
            eigenvalues: space.eigenvalues,
            projections,
            subjects,
            trained_at: Utc::now(),
        })
    }

    /// Save the trained model; `None` uses the configured training file.
    pub fn save_training_data(&self, path: Option<&Path>) -> Result<PathBuf, RecognitionError> {
        let model = self.model.as_ref().ok_or(RecognitionError::NotTrained)?;
        let path = path.map_or_else(|| self.config.training_file.clone(), Path::to_path_buf);
        model.save(&path)?;
        Ok(path)
    }

    /// Load a model; `None` uses the configured training file.
    pub fn load_training_data(&mut self, path: Option<&Path>) -> Result<(), RecognitionError> {
        let path = path.map_or_else(|| self.config.training_file.clone(), Path::to_path_buf);
        self.model = Some(Model::load(&path)?);
        Ok(())
    }

    /// Classify each face, returning up to `results_no` candidates per face.
    ///
    /// Every face must have the training image dimensions. A face whose
    /// best confidence is below the threshold gets a single result with
    /// subject `0`.
    pub fn recognize_faces(
        &self,
        faces: &[FaceImage],
        results_no: usize,
    ) -> Result<Vec<Vec<RecognitionResult>>, RecognitionError> {
        let model = self.model.as_ref().ok_or(RecognitionError::NotTrained)?;
        let gallery = Gallery {
            projections: &model.projections,
            subjects: &model.subjects,
            eigenvalues: &model.eigenvalues,
        };

        faces
            .iter()
            .enumerate()
            .map(|(index, face)| {
                if face.dimensions() != (model.width, model.height) {
                    return Err(RecognitionError::DimensionMismatch {
                        index,
                        expected_w: model.width,
                        expected_h: model.height,
                        got_w: face.width,
                        got_h: face.height,
                    });
                }

                let vector = if model.equalized {
                    face.equalized().to_vector()
                } else {
                    face.to_vector()
                };
                let query = crate::pca::project(&model.mean_face, &model.eigenfaces, &vector);
                let results = gallery.find_closest(
                    &query,
                    self.config.distance,
                    self.config.threshold,
                    results_no,
                );
                tracing::debug!(
                    index,
                    subject = results[0].subject,
                    confidence = results[0].confidence,
                    "face recognized"
                );
                Ok(results)
            })
            .collect()
    }

    /// Recognize every face of a labeled manifest and tally the outcomes.
    pub fn test_recognition_performance(&self, manifest_path: &Path) -> Result<PerformanceReport, RecognitionError> {
        if self.model.is_none() {
            return Err(RecognitionError::NotTrained);
        }

        let entries = manifest::read_manifest(manifest_path)?;
        if entries.is_empty() {
            return Err(RecognitionError::NoImages(manifest_path.display().to_string()));
        }

        let mut report = PerformanceReport::default();
        for entry in entries {
            let face = FaceImage::load(&entry.path)?;
            let results = self.recognize_faces(std::slice::from_ref(&face), 1)?;
            let best = results
                .first()
                .and_then(|r| r.first())
                .copied()
                .unwrap_or(RecognitionResult {
                    subject: crate::types::UNKNOWN_SUBJECT,
                    confidence: 0.0,
                });

            let outcome = if best.is_unknown() {
                report.unknown += 1;
                Outcome::Unknown
            } else if best.subject == entry.subject {
                report.correct += 1;
                Outcome::Correct
            } else {
                report.wrong += 1;
                Outcome::Wrong
            };

            tracing::info!(
                path = %entry.path.display(),
                expected = entry.subject,
                predicted = best.subject,
                confidence = best.confidence,
                outcome = ?outcome,
                "evaluated face"
            );

            report.entries.push(EvaluationEntry {
                path: entry.path,
                expected: entry.subject,
                predicted: best.subject,
                confidence: best.confidence,
                outcome,
            });
        }

        tracing::info!(
            total = report.total(),
            correct = report.correct,
            wrong = report.wrong,
            unknown = report.unknown,
            accuracy = report.accuracy(),
            "recognition performance"
        );
        Ok(report)
    }
}

fn validate_config(config: &RecognitionConfig) -> Result<(), RecognitionError> {
    if !config.threshold.is_finite() || !(0.0..=1.0).contains(&config.threshold) {
        return Err(RecognitionError::InvalidThreshold(config.threshold));
    }
    if config.image_extension.trim_start_matches('.').is_empty() {
        return Err(RecognitionError::InvalidExtension);
    }
    Ok(())
}
