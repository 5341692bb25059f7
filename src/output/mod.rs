mod loopback;
mod photo;

pub use loopback::V4L2Output;
pub use photo::{PhotoSink, PngDirectorySink};

use anyhow::Result;
use image::RgbImage;

/// Destination for composited frames.
pub trait OutputSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Expected frame size as (width, height).
    fn resolution(&self) -> (u32, u32);
}
