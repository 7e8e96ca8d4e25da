//! Nearest-neighbour search in eigenspace.

use crate::types::{DistanceMetric, RecognitionResult, SubjectId, UNKNOWN_SUBJECT};

/// Squared distance between two eigenspace projections.
pub trait Metric {
    fn squared_distance(&self, query: &[f32], stored: &[f32]) -> f64;

    /// Factor bringing `squared_distance` back to squared pixel units.
    fn pixel_scale(&self) -> f64 {
        1.0
    }
}

pub struct Euclidean;

impl Metric for Euclidean {
    fn squared_distance(&self, query: &[f32], stored: &[f32]) -> f64 {
        query
            .iter()
            .zip(stored)
            .map(|(&p, &s)| (p as f64 - s as f64).powi(2))
            .sum()
    }
}

/// Each component weighted by the inverse of its eigenvalue.
pub struct Mahalanobis<'a> {
    pub eigenvalues: &'a [f32],
}

impl Metric for Mahalanobis<'_> {
    fn squared_distance(&self, query: &[f32], stored: &[f32]) -> f64 {
        query
            .iter()
            .zip(stored)
            .zip(self.eigenvalues)
            .map(|((&p, &s), &ev)| (p as f64 - s as f64).powi(2) / ev as f64)
            .sum()
    }

    /// Mean eigenvalue: turns `Σ d²/λᵢ` into `Σ d²·λ̄/λᵢ`.
    fn pixel_scale(&self) -> f64 {
        if self.eigenvalues.is_empty() {
            return 1.0;
        }
        self.eigenvalues.iter().map(|&v| v as f64).sum::<f64>() / self.eigenvalues.len() as f64
    }
}

/// Stored training projections with their labels.
pub struct Gallery<'a> {
    pub projections: &'a [Vec<f32>],
    pub subjects: &'a [SubjectId],
    pub eigenvalues: &'a [f32],
}

impl Gallery<'_> {
    /// Rank subjects by closeness to `query`.
    ///
    /// Returns up to `results_no` (at least one) results ordered by
    /// descending confidence, one per subject. When the best confidence is
    /// below `threshold` the result is a single unknown entry carrying
    /// that confidence.
    pub fn find_closest(
        &self,
        query: &[f32],
        distance: DistanceMetric,
        threshold: f32,
        results_no: usize,
    ) -> Vec<RecognitionResult> {
        let metric: Box<dyn Metric + '_> = match distance {
            DistanceMetric::Euclidean => Box::new(Euclidean),
            DistanceMetric::Mahalanobis => Box::new(Mahalanobis {
                eigenvalues: self.eigenvalues,
            }),
        };

        // Best distance per subject, in first-seen order.
        let mut best: Vec<(SubjectId, f64)> = Vec::new();
        for (stored, &subject) in self.projections.iter().zip(self.subjects) {
            let dist = metric.squared_distance(query, stored);
            match best.iter_mut().find(|(s, _)| *s == subject) {
                Some(entry) if dist < entry.1 => entry.1 = dist,
                Some(_) => {}
                None => best.push((subject, dist)),
            }
        }

        if best.is_empty() {
            return vec![RecognitionResult {
                subject: UNKNOWN_SUBJECT,
                confidence: 0.0,
            }];
        }

        best.sort_by(|a, b| a.1.total_cmp(&b.1));

        let scale = (self.projections.len() * query.len().max(1)) as f64;
        let pixel_scale = metric.pixel_scale();
        let results: Vec<RecognitionResult> = best
            .into_iter()
            .take(results_no.max(1))
            .map(|(subject, dist)| RecognitionResult {
                subject,
                confidence: confidence(dist * pixel_scale, scale),
            })
            .collect();

        let top = results[0].confidence;
        if top < threshold {
            tracing::debug!(confidence = top, threshold, "best match below threshold");
            return vec![RecognitionResult {
                subject: UNKNOWN_SUBJECT,
                confidence: top,
            }];
        }

        results
    }
}

/// `1 - sqrt(dist / scale) / 255`, clamped to `[0, 1]`.
fn confidence(squared_distance: f64, scale: f64) -> f32 {
    let c = 1.0 - (squared_distance / scale).sqrt() / 255.0;
    if c.is_nan() {
        0.0
    } else {
        c.clamp(0.0, 1.0) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gallery_fixture() -> (Vec<Vec<f32>>, Vec<SubjectId>, Vec<f32>) {
        (
            vec![
                vec![0.0, 0.0],
                vec![10.0, 0.0],
                vec![0.0, 100.0],
                vec![1.0, 0.0],
            ],
            vec![1, 2, 3, 1],
            vec![4.0, 1.0],
        )
    }

    #[test]
    fn test_euclidean() {
        assert_eq!(Euclidean.squared_distance(&[1.0, 2.0], &[4.0, 6.0]), 25.0);
    }

    #[test]
    fn test_mahalanobis_weights_by_eigenvalue() {
        let m = Mahalanobis { eigenvalues: &[4.0, 1.0] };
        assert_eq!(m.squared_distance(&[2.0, 1.0], &[0.0, 0.0]), 2.0);
    }

    #[test]
    fn test_mahalanobis_pixel_scale_is_mean_eigenvalue() {
        let m = Mahalanobis { eigenvalues: &[4.0, 1.0] };
        assert_eq!(m.pixel_scale(), 2.5);
        assert_eq!(Euclidean.pixel_scale(), 1.0);
    }

    #[test]
    fn test_mahalanobis_confidence_on_pixel_scale() {
        // Equal variances: Mahalanobis confidence must match Euclidean.
        let projections = vec![vec![0.0, 0.0], vec![300.0, 400.0]];
        let subjects = vec![1, 2];
        let eigenvalues = vec![9.0, 9.0];
        let gallery = Gallery {
            projections: &projections,
            subjects: &subjects,
            eigenvalues: &eigenvalues,
        };
        let query = [30.0, 40.0];
        let eu = gallery.find_closest(&query, DistanceMetric::Euclidean, 0.0, 1);
        let ma = gallery.find_closest(&query, DistanceMetric::Mahalanobis, 0.0, 1);
        assert_eq!(eu[0].subject, 1);
        assert_eq!(ma[0].subject, 1);
        assert!((eu[0].confidence - ma[0].confidence).abs() < 1e-6);
        // sqrt(2500 / 4) / 255 ≈ 0.098
        assert!((ma[0].confidence - 0.902).abs() < 1e-3);
    }

    #[test]
    fn test_mahalanobis_far_face_rejected() {
        let projections = vec![vec![0.0, 0.0], vec![10.0, 0.0]];
        let subjects = vec![1, 2];
        let eigenvalues = vec![50.0, 2.0];
        let gallery = Gallery {
            projections: &projections,
            subjects: &subjects,
            eigenvalues: &eigenvalues,
        };
        let results = gallery.find_closest(&[0.0, 400.0], DistanceMetric::Mahalanobis, 0.9, 2);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_unknown());
    }

    #[test]
    fn test_exact_match_full_confidence() {
        let (p, s, e) = gallery_fixture();
        let gallery = Gallery { projections: &p, subjects: &s, eigenvalues: &e };
        let results = gallery.find_closest(&[10.0, 0.0], DistanceMetric::Euclidean, 0.5, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].subject, 2);
        assert_eq!(results[0].confidence, 1.0);
    }

    #[test]
    fn test_results_one_per_subject_ordered() {
        let (p, s, e) = gallery_fixture();
        let gallery = Gallery { projections: &p, subjects: &s, eigenvalues: &e };
        let results = gallery.find_closest(&[0.5, 0.0], DistanceMetric::Euclidean, 0.0, 10);
        let subjects: Vec<SubjectId> = results.iter().map(|r| r.subject).collect();
        assert_eq!(subjects, vec![1, 2, 3]);
        for w in results.windows(2) {
            assert!(w[0].confidence >= w[1].confidence);
        }
    }

    #[test]
    fn test_results_truncated() {
        let (p, s, e) = gallery_fixture();
        let gallery = Gallery { projections: &p, subjects: &s, eigenvalues: &e };
        let results = gallery.find_closest(&[0.0, 0.0], DistanceMetric::Euclidean, 0.0, 2);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_zero_results_treated_as_one() {
        let (p, s, e) = gallery_fixture();
        let gallery = Gallery { projections: &p, subjects: &s, eigenvalues: &e };
        let results = gallery.find_closest(&[0.0, 0.0], DistanceMetric::Euclidean, 0.0, 0);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_below_threshold_unknown() {
        let (p, s, e) = gallery_fixture();
        let gallery = Gallery { projections: &p, subjects: &s, eigenvalues: &e };
        // Far from every stored point: sqrt(1e8 / 8) / 255 > 1 → confidence 0.
        let results = gallery.find_closest(&[10_000.0, 0.0], DistanceMetric::Euclidean, 0.5, 3);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_unknown());
        assert_eq!(results[0].confidence, 0.0);
    }

    #[test]
    fn test_metric_changes_ranking() {
        // Euclidean prefers subject 2; Mahalanobis discounts the high-variance axis.
        let projections = vec![vec![3.0, 0.0], vec![0.0, 2.0]];
        let subjects = vec![1, 2];
        let eigenvalues = vec![100.0, 1.0];
        let gallery = Gallery {
            projections: &projections,
            subjects: &subjects,
            eigenvalues: &eigenvalues,
        };
        let eu = gallery.find_closest(&[0.0, 0.0], DistanceMetric::Euclidean, 0.0, 1);
        let ma = gallery.find_closest(&[0.0, 0.0], DistanceMetric::Mahalanobis, 0.0, 1);
        assert_eq!(eu[0].subject, 2);
        assert_eq!(ma[0].subject, 1);
    }

    #[test]
    fn test_empty_gallery_unknown() {
        let gallery = Gallery { projections: &[], subjects: &[], eigenvalues: &[] };
        let results = gallery.find_closest(&[1.0], DistanceMetric::Euclidean, 0.0, 3);
        assert_eq!(results.len(), 1);
        assert!(results[0].is_unknown());
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(confidence(0.0, 1.0), 1.0);
        assert_eq!(confidence(1e12, 1.0), 0.0);
    }
}
