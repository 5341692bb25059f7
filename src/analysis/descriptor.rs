use crate::segmentation::Matte;
use image::imageops::{self, FilterType};

/// Inclusive pixel bounds of the foreground silhouette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl BoundingBox {
    fn at(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            max_x: x,
            min_y: y,
            max_y: y,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// Coarse silhouette statistics for one matte.
///
/// Every ratio except `aspect_ratio` lies in [0, 1]. A frame without a
/// subject has no descriptor at all rather than a zero-area one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersonDescriptor {
    pub bbox: BoundingBox,
    /// High-confidence foreground pixels over all pixels.
    pub pixel_ratio: f32,
    /// Bounding-box area over frame area.
    pub bounding_box_ratio: f32,
    /// Bounding-box height over width.
    pub aspect_ratio: f32,
    pub relative_center_x: f32,
    pub relative_center_y: f32,
    /// Silhouette area over frame area, as used for pose comparison.
    pub area_ratio: f32,
}

impl PersonDescriptor {
    /// Larger of the pixel and bounding-box occupancy; drives distance bucketing.
    pub fn effective_ratio(&self) -> f32 {
        self.pixel_ratio.max(self.bounding_box_ratio)
    }
}

/// Reduces a segmentation matte to a [`PersonDescriptor`].
///
/// Two thresholds are applied in the same pass: a strict one for counting
/// foreground pixels and a looser one for growing the bounding envelope.
#[derive(Debug, Clone, Copy)]
pub struct MaskAnalyzer {
    pixel_threshold: u8,
    bbox_threshold: u8,
}

impl Default for MaskAnalyzer {
    fn default() -> Self {
        Self::new(200, 128)
    }
}

impl MaskAnalyzer {
    pub fn new(pixel_threshold: u8, bbox_threshold: u8) -> Self {
        Self {
            pixel_threshold,
            bbox_threshold,
        }
    }

    /// Analyze `matte` as if it covered a `width`x`height` frame.
    ///
    /// A matte of a different size is resampled first. Returns `None` for an
    /// empty frame or when no pixel clears the bounding-box threshold.
    pub fn analyze(&self, matte: &Matte, width: u32, height: u32) -> Option<PersonDescriptor> {
        let _span = tracing::debug_span!("analyze_matte").entered();

        if width == 0 || height == 0 || matte.width() == 0 || matte.height() == 0 {
            return None;
        }

        let resized;
        let matte = if matte.dimensions() != (width, height) {
            resized = imageops::resize(matte, width, height, FilterType::Triangle);
            &resized
        } else {
            matte
        };

        let mut foreground = 0u64;
        let mut bbox: Option<BoundingBox> = None;

        for (x, y, pixel) in matte.enumerate_pixels() {
            let value = pixel[0];
            if value > self.pixel_threshold {
                foreground += 1;
            }
            if value > self.bbox_threshold {
                match bbox.as_mut() {
                    Some(bbox) => bbox.include(x, y),
                    None => bbox = Some(BoundingBox::at(x, y)),
                }
            }
        }

        let bbox = bbox?;
        let total = width as f64 * height as f64;
        let bbox_ratio = (bbox.area() as f64 / total) as f32;
        let center_x = (bbox.min_x + bbox.max_x + 1) as f64 / 2.0;
        let center_y = (bbox.min_y + bbox.max_y + 1) as f64 / 2.0;

        Some(PersonDescriptor {
            bbox,
            pixel_ratio: (foreground as f64 / total) as f32,
            bounding_box_ratio: bbox_ratio,
            aspect_ratio: bbox.height() as f32 / bbox.width() as f32,
            relative_center_x: (center_x / width as f64) as f32,
            relative_center_y: (center_y / height as f64) as f32,
            area_ratio: bbox_ratio,
        })
    }
}
