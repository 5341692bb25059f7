use anyhow::Result;
use image::{GrayImage, RgbImage};

/// Foreground occupancy per pixel: 0 = background, 255 = certain foreground.
///
/// Dimensions match the frame the matte was produced from.
pub type Matte = GrayImage;

/// A per-frame person segmentation provider.
pub trait SegmentationModel {
    /// Produce a matte for `frame`.
    fn segment(&mut self, frame: &RgbImage) -> Result<Matte>;

    /// Drop temporal state, e.g. before segmenting an unrelated still image.
    fn reset_state(&mut self) {}

    /// Preferred inference size as (width, height).
    fn input_size(&self) -> (u32, u32);
}
