//! Trained model and its on-disk format.
//!
//! The file is a JSON envelope holding a format tag, a version, a SHA-256
//! checksum of the serialized model, and the model itself. The checksum
//! covers the exact model text stored in the file.

use crate::types::SubjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

const MODEL_FORMAT: &str = "eigenface-model";
const MODEL_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model file I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("model file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported model file: format {format:?} version {version}")]
    UnsupportedFormat { format: String, version: u32 },
    #[error("model checksum mismatch — file is corrupt")]
    ChecksumMismatch,
    #[error("model is inconsistent: {0}")]
    Corrupt(String),
}

/// Everything needed to classify new faces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub width: u32,
    pub height: u32,
    /// Whether faces were histogram-equalized before training.
    pub equalized: bool,
    pub mean_face: Vec<f32>,
    pub eigenfaces: Vec<Vec<f32>>,
    /// Descending, one per eigenface.
    pub eigenvalues: Vec<f32>,
    /// One projection per training face.
    pub projections: Vec<Vec<f32>>,
    /// Subject of each projection.
    pub subjects: Vec<SubjectId>,
    pub trained_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct ModelFile {
    format: String,
    version: u32,
    checksum: String,
    model: Box<RawValue>,
}

impl Model {
    pub fn components(&self) -> usize {
        self.eigenfaces.len()
    }

    pub fn training_faces(&self) -> usize {
        self.projections.len()
    }

    /// Distinct subjects, in ascending order.
    pub fn subject_ids(&self) -> Vec<SubjectId> {
        let mut ids = self.subjects.clone();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Check the structural invariants between the model's parts.
    pub fn validate(&self) -> Result<(), ModelError> {
        let corrupt = |msg: String| Err(ModelError::Corrupt(msg));
        let pixels = self.pixel_count();
        let k = self.components();
        let n = self.training_faces();

        if pixels == 0 {
            return corrupt("zero image dimensions".into());
        }
        if self.mean_face.len() != pixels {
            return corrupt(format!("mean face has {} pixels, expected {pixels}", self.mean_face.len()));
        }
        if k == 0 {
            return corrupt("no eigenfaces".into());
        }
        if self.eigenvalues.len() != k {
            return corrupt(format!("{} eigenvalues for {k} eigenfaces", self.eigenvalues.len()));
        }
        if let Some(i) = self.eigenfaces.iter().position(|u| u.len() != pixels) {
            return corrupt(format!("eigenface {i} has wrong pixel count"));
        }
        if self.eigenvalues.iter().any(|&v| !(v.is_finite() && v > 0.0)) {
            return corrupt("eigenvalues must be positive".into());
        }
        if self.eigenvalues.windows(2).any(|w| w[0] < w[1]) {
            return corrupt("eigenvalues are not sorted".into());
        }
        if self.subjects.len() != n {
            return corrupt(format!("{} labels for {n} projections", self.subjects.len()));
        }
        if k >= n {
            return corrupt(format!("{k} eigenfaces for only {n} training faces"));
        }
        if let Some(i) = self.projections.iter().position(|p| p.len() != k) {
            return corrupt(format!("projection {i} has wrong length"));
        }
        Ok(())
    }

    /// Write the model to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let body = serde_json::to_string(self)?;
        let file = ModelFile {
            format: MODEL_FORMAT.to_string(),
            version: MODEL_VERSION,
            checksum: checksum(&body),
            model: RawValue::from_string(body)?,
        };
        let json = serde_json::to_vec(&file)?;
        std::fs::write(path, json).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;

        tracing::info!(
            path = %path.display(),
            faces = self.training_faces(),
            components = self.components(),
            "model saved"
        );
        Ok(())
    }

    /// Read and verify a model from `path`.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let bytes = std::fs::read(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: ModelFile = serde_json::from_slice(&bytes)?;

        if file.format != MODEL_FORMAT || file.version != MODEL_VERSION {
            return Err(ModelError::UnsupportedFormat {
                format: file.format,
                version: file.version,
            });
        }
        if checksum(file.model.get()) != file.checksum {
            return Err(ModelError::ChecksumMismatch);
        }
        let model: Model = serde_json::from_str(file.model.get())?;
        model.validate()?;

        tracing::info!(
            path = %path.display(),
            faces = model.training_faces(),
            components = model.components(),
            trained_at = %model.trained_at,
            "model loaded"
        );
        Ok(model)
    }
}

fn checksum(body: &str) -> String {
    format!("{:x}", Sha256::digest(body.as_bytes()))
}
