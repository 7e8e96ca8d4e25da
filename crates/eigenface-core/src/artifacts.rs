//! Visualization images written after training.

use crate::face::scale_to_u8;
use image::GrayImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const AVERAGE_IMAGE_FILE: &str = "outAverageImage.pgm";
pub const EIGENFACES_IMAGE_FILE: &str = "outEigenfacesImage.pgm";

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("failed to create {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("buffer does not match {width}x{height}")]
    BadDimensions { width: u32, height: u32 },
}

/// Render one float plane as an 8-bit image, min/max scaled.
pub fn render_plane(values: &[f32], width: u32, height: u32) -> Result<GrayImage, ArtifactError> {
    GrayImage::from_raw(width, height, scale_to_u8(values))
        .ok_or(ArtifactError::BadDimensions { width, height })
}

/// Tile every eigenface into one image, row-major, `ceil(sqrt(k))` per row.
pub fn eigenface_mosaic(
    eigenfaces: &[Vec<f32>],
    width: u32,
    height: u32,
) -> Result<GrayImage, ArtifactError> {
    let k = eigenfaces.len().max(1) as u32;
    let cols = (k as f64).sqrt().ceil() as u32;
    let rows = k.div_ceil(cols);
    let mut mosaic = GrayImage::new(cols * width, rows * height);

    for (i, face) in eigenfaces.iter().enumerate() {
        let tile = render_plane(face, width, height)?;
        let ox = (i as u32 % cols) * width;
        let oy = (i as u32 / cols) * height;
        for (x, y, px) in tile.enumerate_pixels() {
            mosaic.put_pixel(ox + x, oy + y, *px);
        }
    }

    Ok(mosaic)
}

/// Write the average face and the eigenface mosaic into `dir`.
pub fn save_eigenfaces(
    dir: &Path,
    mean_face: &[f32],
    eigenfaces: &[Vec<f32>],
    width: u32,
    height: u32,
) -> Result<Vec<PathBuf>, ArtifactError> {
    std::fs::create_dir_all(dir).map_err(|source| ArtifactError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let average_path = dir.join(AVERAGE_IMAGE_FILE);
    write(&render_plane(mean_face, width, height)?, &average_path)?;

    let mosaic_path = dir.join(EIGENFACES_IMAGE_FILE);
    write(&eigenface_mosaic(eigenfaces, width, height)?, &mosaic_path)?;

    tracing::info!(
        average = %average_path.display(),
        eigenfaces = %mosaic_path.display(),
        count = eigenfaces.len(),
        "saved eigenface images"
    );
    Ok(vec![average_path, mosaic_path])
}

fn write(img: &GrayImage, path: &Path) -> Result<(), ArtifactError> {
    img.save(path).map_err(|source| ArtifactError::Encode {
        path: path.display().to_string(),
        source,
    })
}
