mod webcam;

pub use webcam::WebcamCapture;

use anyhow::Result;
use image::RgbImage;

/// Source of raw camera frames.
pub trait CaptureSource {
    /// Block until the next frame is available.
    fn capture_frame(&mut self) -> Result<RgbImage>;

    /// Negotiated frame size as (width, height).
    fn resolution(&self) -> (u32, u32);
}
