//! Silhouette-level pose similarity.
//!
//! No skeleton is involved: two descriptors are compared on body aspect,
//! horizontal and vertical placement, and occupied area. Each axis scores
//! `max(0, 1 - diff / tolerance)` and the axes are blended by weight.

use super::descriptor::PersonDescriptor;

/// Difference at which an axis stops contributing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseTolerances {
    pub aspect: f32,
    pub center_x: f32,
    pub center_y: f32,
    pub area: f32,
}

impl Default for PoseTolerances {
    fn default() -> Self {
        Self {
            aspect: 1.5,
            center_x: 0.25,
            center_y: 0.25,
            area: 0.3,
        }
    }
}

/// Axis weights. Area is down-weighted since it bleeds with clothing and background.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseWeights {
    pub aspect: f32,
    pub center_x: f32,
    pub center_y: f32,
    pub area: f32,
}

impl Default for PoseWeights {
    fn default() -> Self {
        Self {
            aspect: 0.3,
            center_x: 0.3,
            center_y: 0.3,
            area: 0.1,
        }
    }
}

impl PoseWeights {
    /// Sum of the axis weights; a valid set sums to one.
    pub fn total(&self) -> f32 {
        self.aspect + self.center_x + self.center_y + self.area
    }
}

/// Per-axis similarities and the blended score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityBreakdown {
    pub aspect: f32,
    pub center_x: f32,
    pub center_y: f32,
    pub area: f32,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PoseSimilarityScorer {
    tolerances: PoseTolerances,
    weights: PoseWeights,
}

impl PoseSimilarityScorer {
    pub fn new(tolerances: PoseTolerances, weights: PoseWeights) -> Self {
        Self {
            tolerances,
            weights,
        }
    }

    /// Score in [0, 1]; zero when either side has no silhouette.
    pub fn score(
        &self,
        current: Option<&PersonDescriptor>,
        reference: Option<&PersonDescriptor>,
    ) -> f32 {
        match (current, reference) {
            (Some(current), Some(reference)) => self.breakdown(current, reference).score,
            _ => 0.0,
        }
    }

    pub fn breakdown(
        &self,
        current: &PersonDescriptor,
        reference: &PersonDescriptor,
    ) -> SimilarityBreakdown {
        let axis = |a: f32, b: f32, tolerance: f32| (1.0 - (a - b).abs() / tolerance).max(0.0);

        let aspect = axis(current.aspect_ratio, reference.aspect_ratio, self.tolerances.aspect);
        let center_x = axis(
            current.relative_center_x,
            reference.relative_center_x,
            self.tolerances.center_x,
        );
        let center_y = axis(
            current.relative_center_y,
            reference.relative_center_y,
            self.tolerances.center_y,
        );
        let area = axis(current.area_ratio, reference.area_ratio, self.tolerances.area);

        let w = &self.weights;
        let weighted =
            aspect * w.aspect + center_x * w.center_x + center_y * w.center_y + area * w.area;
        // Weights sum to one, so this only absorbs float rounding.
        let score = (weighted / w.total()).clamp(0.0, 1.0);

        tracing::trace!(aspect, center_x, center_y, area, score, "pose similarity");

        SimilarityBreakdown {
            aspect,
            center_x,
            center_y,
            area,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::BoundingBox;

    fn descriptor(aspect: f32, cx: f32, cy: f32, area: f32) -> PersonDescriptor {
        PersonDescriptor {
            bbox: BoundingBox { min_x: 0, max_x: 9, min_y: 0, max_y: 9 },
            pixel_ratio: area,
            bounding_box_ratio: area,
            aspect_ratio: aspect,
            relative_center_x: cx,
            relative_center_y: cy,
            area_ratio: area,
        }
    }

    #[test]
    fn identical_descriptors_score_one() {
        let scorer = PoseSimilarityScorer::default();
        for d in [
            descriptor(2.1, 0.5, 0.5, 0.3),
            descriptor(0.4, 0.1, 0.9, 0.0),
            descriptor(3.0, 1.0, 0.0, 1.0),
        ] {
            assert_eq!(scorer.score(Some(&d), Some(&d)), 1.0);
        }
    }

    #[test]
    fn score_is_symmetric() {
        let scorer = PoseSimilarityScorer::default();
        let mut grid = Vec::new();
        for aspect in [0.4, 1.0, 2.0, 3.5] {
            for center in [0.0, 0.3, 0.5, 1.0] {
                for area in [0.0, 0.15, 0.6, 1.0] {
                    grid.push(descriptor(aspect, center, 1.0 - center, area));
                }
            }
        }

        for a in &grid {
            for b in &grid {
                let forward = scorer.score(Some(a), Some(b));
                let backward = scorer.score(Some(b), Some(a));
                assert_eq!(forward, backward, "{:?} vs {:?}", a, b);
                assert!((0.0..=1.0).contains(&forward));
            }
        }
    }

    #[test]
    fn missing_side_scores_zero() {
        let scorer = PoseSimilarityScorer::default();
        let d = descriptor(2.0, 0.5, 0.5, 0.3);
        assert_eq!(scorer.score(None, Some(&d)), 0.0);
        assert_eq!(scorer.score(Some(&d), None), 0.0);
        assert_eq!(scorer.score(None, None), 0.0);
    }

    #[test]
    fn axes_floor_at_zero() {
        let scorer = PoseSimilarityScorer::default();
        let a = descriptor(0.5, 0.0, 0.0, 0.0);
        let b = descriptor(3.0, 1.0, 1.0, 1.0);
        let breakdown = scorer.breakdown(&a, &b);
        assert_eq!(breakdown.aspect, 0.0);
        assert_eq!(breakdown.center_x, 0.0);
        assert_eq!(breakdown.area, 0.0);
        assert_eq!(breakdown.score, 0.0);
    }

    #[test]
    fn weighted_blend() {
        let scorer = PoseSimilarityScorer::default();
        // Only horizontal placement differs, by half the tolerance.
        let a = descriptor(2.0, 0.5, 0.5, 0.3);
        let b = descriptor(2.0, 0.625, 0.5, 0.3);
        let breakdown = scorer.breakdown(&a, &b);
        assert!((breakdown.center_x - 0.5).abs() < 1e-6);
        assert!((breakdown.score - 0.85).abs() < 1e-6);
    }

    #[test]
    fn score_is_plain_weighted_sum() {
        let scorer = PoseSimilarityScorer::default();
        let a = descriptor(2.0, 0.5, 0.5, 0.3);
        let b = descriptor(2.75, 0.55, 0.4, 0.45);
        let breakdown = scorer.breakdown(&a, &b);
        let weighted = 0.3 * breakdown.aspect
            + 0.3 * breakdown.center_x
            + 0.3 * breakdown.center_y
            + 0.1 * breakdown.area;
        assert!((breakdown.score - weighted).abs() < 1e-6);
    }
}
