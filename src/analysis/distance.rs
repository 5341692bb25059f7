//! Heuristic subject distance from silhouette occupancy.

use super::descriptor::PersonDescriptor;

/// Occupancy ladder: the first rung whose ratio is exceeded gives the distance.
const DISTANCE_LADDER: [(f32, f32); 5] = [
    (0.25, 0.5),
    (0.15, 0.8),
    (0.08, 1.2),
    (0.04, 1.8),
    (0.01, 2.2),
];

/// Distance reported when occupancy is below every rung.
pub const FARTHEST_DISTANCE_M: f32 = 2.5;

/// One tick's distance reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSample {
    pub raw_m: f32,
    pub smoothed_m: f32,
    pub in_range: bool,
}

/// Maps occupancy to a bucketed distance and damps it with an EMA.
///
/// The estimator holds no cross-tick state; the previous smoothed value is
/// passed in by the caller.
#[derive(Debug, Clone, Copy)]
pub struct DistanceEstimator {
    smoothing: f32,
    in_range_max_m: f32,
}

impl Default for DistanceEstimator {
    fn default() -> Self {
        Self::new(0.3, 1.0)
    }
}

impl DistanceEstimator {
    pub fn new(smoothing: f32, in_range_max_m: f32) -> Self {
        Self {
            smoothing,
            in_range_max_m,
        }
    }

    pub fn estimate(&self, descriptor: &PersonDescriptor) -> f32 {
        Self::bucket(descriptor.effective_ratio())
    }

    /// Step function from effective ratio to meters. More occupancy, closer subject.
    pub fn bucket(effective_ratio: f32) -> f32 {
        DISTANCE_LADDER
            .iter()
            .find(|(ratio, _)| effective_ratio > *ratio)
            .map(|(_, meters)| *meters)
            .unwrap_or(FARTHEST_DISTANCE_M)
    }

    /// Exponential moving average; a zero `previous` means no history yet.
    pub fn smooth(&self, raw: f32, previous: f32) -> f32 {
        if previous == 0.0 {
            raw
        } else {
            previous * (1.0 - self.smoothing) + raw * self.smoothing
        }
    }

    pub fn is_in_range(&self, smoothed_m: f32) -> bool {
        smoothed_m <= self.in_range_max_m
    }

    /// Full per-tick reading. Without a subject the raw reading is the
    /// farthest rung and the subject is never in range.
    pub fn sample(&self, descriptor: Option<&PersonDescriptor>, previous_m: f32) -> DistanceSample {
        let raw_m = descriptor.map_or(FARTHEST_DISTANCE_M, |d| self.estimate(d));
        let smoothed_m = self.smooth(raw_m, previous_m);

        DistanceSample {
            raw_m,
            smoothed_m,
            in_range: descriptor.is_some() && self.is_in_range(smoothed_m),
        }
    }
}
