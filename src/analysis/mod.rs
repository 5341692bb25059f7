mod descriptor;
mod distance;
mod similarity;

pub use descriptor::{BoundingBox, MaskAnalyzer, PersonDescriptor};
pub use distance::{DistanceEstimator, DistanceSample, FARTHEST_DISTANCE_M};
pub use similarity::{PoseSimilarityScorer, PoseTolerances, PoseWeights, SimilarityBreakdown};
