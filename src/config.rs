//! Booth configuration.
//!
//! One struct selects pipeline behaviour (pose matching on/off, mirrored
//! output, capture mode) and carries the numeric policy of every component.

use crate::analysis::{PoseTolerances, PoseWeights};
use crate::error::{BoothError, BoothResult};
use std::time::Duration;

/// How a finished countdown is turned into a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// Capture as soon as the countdown reaches zero, then cool down.
    #[default]
    Auto,
    /// Raise the ready flag at zero and wait for an explicit capture request.
    Manual,
}

/// Countdown and cooldown policy.
#[derive(Debug, Clone, PartialEq)]
pub struct CountdownConfig {
    /// Similarity at or above which a countdown starts.
    pub trigger_threshold: f32,
    /// Similarity below which a running countdown is cancelled.
    pub cancel_threshold: f32,
    /// First digit shown when a countdown starts.
    pub start_count: u8,
    /// Wall-clock length of one countdown step.
    pub step: Duration,
    /// Minimum interval after an automatic capture.
    pub cooldown: Duration,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            trigger_threshold: 0.80,
            cancel_threshold: 0.75,
            start_count: 3,
            step: Duration::from_secs(1),
            cooldown: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoothConfig {
    /// Output canvas width; every composite is scaled to this.
    pub canvas_width: u32,
    /// Output canvas height.
    pub canvas_height: u32,

    pub enable_pose_matching: bool,
    /// Flip the displayed composite horizontally. Captured photos are never flipped.
    pub mirror_output: bool,
    pub capture_mode: CaptureMode,

    /// Matte value above which a pixel counts toward the occupancy ratio.
    pub pixel_threshold: u8,
    /// Matte value above which a pixel extends the bounding box.
    pub bbox_threshold: u8,

    /// EMA weight of the newest distance sample.
    pub distance_smoothing: f32,
    /// Smoothed distance (meters) at or below which the subject is in range.
    pub in_range_max_m: f32,

    pub pose_tolerances: PoseTolerances,
    pub pose_weights: PoseWeights,

    pub countdown: CountdownConfig,

    /// Gaussian sigma for the blurred background.
    pub blur_sigma: f32,
}

impl Default for BoothConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1280,
            canvas_height: 720,
            enable_pose_matching: true,
            mirror_output: false,
            capture_mode: CaptureMode::Auto,
            pixel_threshold: 200,
            bbox_threshold: 128,
            distance_smoothing: 0.3,
            in_range_max_m: 1.0,
            pose_tolerances: PoseTolerances::default(),
            pose_weights: PoseWeights::default(),
            countdown: CountdownConfig::default(),
            blur_sigma: 8.0,
        }
    }
}

impl BoothConfig {
    pub fn validate(&self) -> BoothResult<()> {
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(BoothError::invalid_config(format!(
                "canvas must be non-empty, got {}x{}",
                self.canvas_width, self.canvas_height
            )));
        }

        if self.pixel_threshold < self.bbox_threshold {
            return Err(BoothError::invalid_config(
                "pixel threshold must not be below the bounding-box threshold",
            ));
        }

        if !(self.distance_smoothing > 0.0 && self.distance_smoothing <= 1.0) {
            return Err(BoothError::invalid_config(format!(
                "distance smoothing must be in (0, 1], got {}",
                self.distance_smoothing
            )));
        }

        if !(self.in_range_max_m > 0.0) {
            return Err(BoothError::invalid_config("in-range limit must be positive"));
        }

        let tolerances = &self.pose_tolerances;
        if [tolerances.aspect, tolerances.center_x, tolerances.center_y, tolerances.area]
            .iter()
            .any(|t| !(*t > 0.0))
        {
            return Err(BoothError::invalid_config("pose tolerances must be positive"));
        }

        let weights = &self.pose_weights;
        let parts = [weights.aspect, weights.center_x, weights.center_y, weights.area];
        if parts.iter().any(|w| *w < 0.0) || (weights.total() - 1.0).abs() > 1e-3 {
            return Err(BoothError::invalid_config(format!(
                "pose weights must be non-negative and sum to 1, got {}",
                weights.total()
            )));
        }

        let countdown = &self.countdown;
        for (name, value) in [
            ("trigger", countdown.trigger_threshold),
            ("cancel", countdown.cancel_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(BoothError::invalid_config(format!(
                    "{name} threshold must be in [0, 1], got {value}"
                )));
            }
        }
        if countdown.cancel_threshold > countdown.trigger_threshold {
            return Err(BoothError::invalid_config(
                "cancel threshold must not exceed the trigger threshold",
            ));
        }
        if countdown.start_count == 0 || countdown.start_count > 9 {
            return Err(BoothError::invalid_config(format!(
                "countdown must start between 1 and 9, got {}",
                countdown.start_count
            )));
        }
        if countdown.step.is_zero() {
            return Err(BoothError::invalid_config("countdown step must be non-zero"));
        }

        if self.blur_sigma < 0.0 {
            return Err(BoothError::invalid_config("blur sigma must not be negative"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BoothConfig::default();
        assert_eq!((config.canvas_width, config.canvas_height), (1280, 720));
        assert_eq!(config.pixel_threshold, 200);
        assert_eq!(config.bbox_threshold, 128);
        assert_eq!(config.distance_smoothing, 0.3);
        assert_eq!(config.countdown.start_count, 3);
        assert_eq!(config.countdown.step, Duration::from_secs(1));
        assert_eq!(config.countdown.cooldown, Duration::from_secs(3));
        assert_eq!(config.capture_mode, CaptureMode::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_hysteresis() {
        let config = BoothConfig {
            countdown: CountdownConfig {
                trigger_threshold: 0.7,
                cancel_threshold: 0.8,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BoothError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_empty_canvas_and_bad_smoothing() {
        let config = BoothConfig {
            canvas_width: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BoothConfig {
            distance_smoothing: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pose_weights_must_sum_to_one() {
        let config = BoothConfig {
            pose_weights: PoseWeights {
                aspect: 0.5,
                center_x: 0.5,
                center_y: 0.5,
                area: 0.5,
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BoothError::InvalidConfig(_))));

        let config = BoothConfig {
            pose_weights: PoseWeights {
                aspect: 0.25,
                center_x: 0.25,
                center_y: 0.25,
                area: 0.25,
            },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_two_digit_countdown() {
        let config = BoothConfig {
            countdown: CountdownConfig {
                start_count: 10,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
