//! Principal component analysis over face vectors.
//!
//! Uses the small-matrix formulation: with n faces of d pixels (n ≪ d),
//! eigenvectors of the n×n matrix AᵀA are lifted to eigenfaces via A.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use thiserror::Error;

/// Relative cutoff below which a component is treated as numerical noise.
const EIGENVALUE_EPSILON: f64 = 1e-9;
const MIN_EIGEN_ITERATIONS: usize = 1_000;

#[derive(Error, Debug)]
pub enum PcaError {
    #[error("need at least 2 faces for PCA, got {0}")]
    NotEnoughFaces(usize),
    #[error("face vector {index} has {got} pixels, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },
    #[error("training faces have no variance — all eigenvalues vanish")]
    Degenerate,
    #[error("eigendecomposition did not converge")]
    DecompositionFailed,
}

/// Mean face plus orthonormal eigenfaces, sorted by descending eigenvalue.
#[derive(Debug, Clone)]
pub struct Eigenspace {
    pub mean: Vec<f32>,
    pub eigenfaces: Vec<Vec<f32>>,
    /// Variance captured by each eigenface.
    pub eigenvalues: Vec<f32>,
}

impl Eigenspace {
    /// Compute the eigenspace of `faces`, keeping at most `max_components`
    /// (and never more than `faces.len() - 1`) components.
    pub fn compute(faces: &[Vec<f64>], max_components: Option<usize>) -> Result<Self, PcaError> {
        let n = faces.len();
        if n < 2 {
            return Err(PcaError::NotEnoughFaces(n));
        }
        let d = faces[0].len();
        for (index, face) in faces.iter().enumerate() {
            if face.len() != d {
                return Err(PcaError::DimensionMismatch {
                    index,
                    expected: d,
                    got: face.len(),
                });
            }
        }

        let mut mean = vec![0.0f64; d];
        for face in faces {
            for (m, &p) in mean.iter_mut().zip(face) {
                *m += p;
            }
        }
        for m in mean.iter_mut() {
            *m /= n as f64;
        }

        // Centred data, one face per column.
        let a = DMatrix::from_fn(d, n, |r, c| faces[c][r] - mean[r]);
        let small = a.tr_mul(&a);

        let max_niter = MIN_EIGEN_ITERATIONS.max(100 * n);
        let eigen = SymmetricEigen::try_new(small, f64::EPSILON, max_niter)
            .ok_or(PcaError::DecompositionFailed)?;

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&i, &j| eigen.eigenvalues[j].total_cmp(&eigen.eigenvalues[i]));

        let largest = eigen.eigenvalues[order[0]];
        if largest.is_nan() || largest <= 0.0 {
            return Err(PcaError::Degenerate);
        }

        let limit = max_components.unwrap_or(usize::MAX).min(n - 1);
        let mut eigenfaces = Vec::with_capacity(limit);
        let mut eigenvalues = Vec::with_capacity(limit);

        for &idx in order.iter().take(limit) {
            let lambda = eigen.eigenvalues[idx];
            if lambda <= largest * EIGENVALUE_EPSILON {
                break;
            }
            let v: DVector<f64> = eigen.eigenvectors.column(idx).into_owned();
            let u = &a * v;
            let norm = u.norm();
            if norm <= 0.0 {
                break;
            }
            eigenfaces.push(u.iter().map(|&x| (x / norm) as f32).collect());
            eigenvalues.push((lambda / n as f64) as f32);
        }

        if eigenfaces.is_empty() {
            return Err(PcaError::Degenerate);
        }

        tracing::debug!(
            faces = n,
            pixels = d,
            components = eigenfaces.len(),
            top_eigenvalue = eigenvalues[0],
            "eigenspace computed"
        );

        Ok(Self {
            mean: mean.into_iter().map(|m| m as f32).collect(),
            eigenfaces,
            eigenvalues,
        })
    }

    /// Coordinates of `face` along each eigenface.
    pub fn project(&self, face: &[f64]) -> Vec<f32> {
        project(&self.mean, &self.eigenfaces, face)
    }
}

/// Project `face` onto `eigenfaces` after subtracting `mean`.
pub fn project(mean: &[f32], eigenfaces: &[Vec<f32>], face: &[f64]) -> Vec<f32> {
    let centred: Vec<f64> = face
        .iter()
        .zip(mean)
        .map(|(&p, &m)| p - m as f64)
        .collect();

    eigenfaces
        .iter()
        .map(|u| {
            u.iter()
                .zip(&centred)
                .map(|(&w, &c)| w as f64 * c)
                .sum::<f64>() as f32
        })
        .collect()
}
