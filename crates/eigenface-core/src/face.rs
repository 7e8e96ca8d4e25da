//! Grayscale face images and pixel preprocessing.

use image::GrayImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceError {
    #[error("failed to read image {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("image has zero dimensions")]
    ZeroDimensions,
    #[error("pixel buffer length {actual} does not match {width}x{height}")]
    InvalidLength { width: u32, height: u32, actual: usize },
}

/// A cropped grayscale face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceImage {
    /// Grayscale pixel data (width * height bytes, row-major).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl FaceImage {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FaceError> {
        if width == 0 || height == 0 {
            return Err(FaceError::ZeroDimensions);
        }
        if data.len() != (width as usize) * (height as usize) {
            return Err(FaceError::InvalidLength {
                width,
                height,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height })
    }

    /// Decode an image file and convert it to 8-bit luma.
    pub fn load(path: &Path) -> Result<Self, FaceError> {
        let img = image::open(path).map_err(|source| FaceError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_gray(img.to_luma8())
    }

    pub fn from_gray(img: GrayImage) -> Result<Self, FaceError> {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixels as `f64`, the layout PCA works on.
    pub fn to_vector(&self) -> Vec<f64> {
        self.data.iter().map(|&p| p as f64).collect()
    }

    /// Return a histogram-equalized copy.
    pub fn equalized(&self) -> Self {
        let mut data = self.data.clone();
        equalize_histogram(&mut data);
        Self {
            data,
            width: self.width,
            height: self.height,
        }
    }
}

/// Global histogram equalization in-place.
///
/// Maps each level through the normalized CDF so the output spans 0–255.
/// Flat images are left untouched.
pub fn equalize_histogram(gray: &mut [u8]) {
    if gray.is_empty() {
        return;
    }

    let mut hist = [0u32; 256];
    for &p in gray.iter() {
        hist[p as usize] += 1;
    }

    let mut cdf = [0u32; 256];
    let mut running = 0u32;
    for (i, &count) in hist.iter().enumerate() {
        running += count;
        cdf[i] = running;
    }

    let total = gray.len() as u32;
    let cdf_min = cdf.iter().copied().find(|&v| v > 0).unwrap_or(0);
    let denom = total - cdf_min;
    if denom == 0 {
        return;
    }

    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        let scaled = (cdf[i].saturating_sub(cdf_min)) as f32 / denom as f32 * 255.0;
        *v = scaled.round().clamp(0.0, 255.0) as u8;
    }

    for p in gray.iter_mut() {
        *p = lut[*p as usize];
    }
}

/// Linearly rescale float pixels to 0–255 using their min/max.
pub fn scale_to_u8(values: &[f32]) -> Vec<u8> {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if !range.is_finite() || range <= f32::EPSILON {
        return vec![0; values.len()];
    }
    values
        .iter()
        .map(|&v| ((v - min) / range * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_length() {
        let err = FaceImage::new(vec![0; 5], 2, 2).unwrap_err();
        assert!(matches!(err, FaceError::InvalidLength { actual: 5, .. }));
    }

    #[test]
    fn test_new_rejects_zero_dimensions() {
        assert!(matches!(
            FaceImage::new(vec![], 0, 4),
            Err(FaceError::ZeroDimensions)
        ));
    }

    #[test]
    fn test_from_gray() {
        let img = GrayImage::from_raw(2, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let face = FaceImage::from_gray(img).unwrap();
        assert_eq!(face.dimensions(), (2, 3));
        assert_eq!(face.data, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_equalize_stretches_range() {
        // Low-contrast image: levels 100..=103
        let mut gray: Vec<u8> = (0..16).map(|i| 100 + (i % 4) as u8).collect();
        equalize_histogram(&mut gray);
        assert_eq!(*gray.iter().min().unwrap(), 0);
        assert_eq!(*gray.iter().max().unwrap(), 255);
    }

    #[test]
    fn test_equalize_flat_image_unchanged() {
        let mut gray = vec![77u8; 64];
        equalize_histogram(&mut gray);
        assert!(gray.iter().all(|&p| p == 77));
    }

    #[test]
    fn test_equalize_preserves_order() {
        let mut gray = vec![10, 20, 30, 40, 40, 50];
        equalize_histogram(&mut gray);
        for w in gray.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }

    #[test]
    fn test_scale_to_u8() {
        assert_eq!(scale_to_u8(&[-1.0, 0.0, 1.0]), vec![0, 128, 255]);
        assert_eq!(scale_to_u8(&[3.0, 3.0]), vec![0, 0]);
    }
}
