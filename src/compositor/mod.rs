mod background;
mod overlay;

pub use background::{Backdrop, BackgroundLayer, BackgroundSpec};
pub use overlay::draw_countdown;

use crate::segmentation::Matte;
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::borrow::Cow;

/// Renders the displayable frame at a fixed canvas resolution.
///
/// Layering, bottom to top: background (only with the subject in range and
/// a background selected), the subject cut out through the matte, then the
/// countdown overlay. Without a background the raw frame is drawn as-is.
#[derive(Debug, Clone)]
pub struct FrameCompositor {
    width: u32,
    height: u32,
    blur_sigma: f32,
    mirror: bool,
}

impl FrameCompositor {
    pub fn new(width: u32, height: u32, blur_sigma: f32, mirror: bool) -> Self {
        Self {
            width,
            height,
            blur_sigma,
            mirror,
        }
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Scale a frame to the canvas. This is also the unmasked photo that gets captured.
    pub fn fit_frame(&self, frame: &RgbImage) -> RgbImage {
        if frame.dimensions() == (self.width, self.height) {
            frame.clone()
        } else {
            imageops::resize(frame, self.width, self.height, FilterType::Triangle)
        }
    }

    pub fn fit_matte<'a>(&self, matte: &'a Matte) -> Cow<'a, Matte> {
        if matte.dimensions() == (self.width, self.height) {
            Cow::Borrowed(matte)
        } else {
            Cow::Owned(imageops::resize(
                matte,
                self.width,
                self.height,
                FilterType::Triangle,
            ))
        }
    }

    /// Composite a source frame of any size.
    pub fn composite(
        &self,
        frame: &RgbImage,
        matte: Option<&Matte>,
        backdrop: &Backdrop,
        in_range: bool,
        countdown: Option<u8>,
    ) -> RgbImage {
        let base = self.fit_frame(frame);
        let matte = matte.map(|m| self.fit_matte(m));
        self.composite_fitted(&base, matte.as_deref(), backdrop, in_range, countdown)
    }

    /// Composite a frame and matte already at canvas size.
    pub fn composite_fitted(
        &self,
        base: &RgbImage,
        matte: Option<&Matte>,
        backdrop: &Backdrop,
        in_range: bool,
        countdown: Option<u8>,
    ) -> RgbImage {
        let _span = tracing::debug_span!("composite").entered();

        let mut canvas = match (in_range, matte, backdrop.layer()) {
            (true, Some(matte), BackgroundLayer::Blur) => {
                let blurred = if self.blur_sigma > 0.0 {
                    imageops::fast_blur(base, self.blur_sigma)
                } else {
                    base.clone()
                };
                cut_out(base, matte, blurred)
            }
            (true, Some(matte), BackgroundLayer::Image(image)) => {
                cut_out(base, matte, image.clone())
            }
            _ => base.clone(),
        };

        if self.mirror {
            imageops::flip_horizontal_in_place(&mut canvas);
        }

        // Last, so nothing can cover it.
        if let Some(digit) = countdown {
            overlay::draw_countdown(&mut canvas, digit);
        }

        canvas
    }
}

/// Blend `subject` over `background` using the matte as alpha.
fn cut_out(subject: &RgbImage, matte: &Matte, mut background: RgbImage) -> RgbImage {
    for ((fg, alpha), bg) in subject
        .pixels()
        .zip(matte.pixels())
        .zip(background.pixels_mut())
    {
        let a = alpha.0[0] as u16;
        for c in 0..3 {
            let blended = (fg.0[c] as u16 * a + bg.0[c] as u16 * (255 - a) + 127) / 255;
            bg.0[c] = blended as u8;
        }
    }
    background
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb};

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]))
    }

    fn half_matte(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, _| if x < w / 2 { Luma([255]) } else { Luma([0]) })
    }

    #[test]
    fn no_background_is_scaled_raw_frame() {
        let compositor = FrameCompositor::new(64, 36, 8.0, false);
        let frame = gradient(128, 72);
        let expected = compositor.fit_frame(&frame);

        for matte in [None, Some(half_matte(128, 72)), Some(GrayImage::new(32, 18))] {
            for in_range in [false, true] {
                let out = compositor.composite(
                    &frame,
                    matte.as_ref(),
                    &Backdrop::none(),
                    in_range,
                    None,
                );
                assert_eq!(out, expected);
            }
        }
    }

    #[test]
    fn output_is_always_canvas_sized() {
        let compositor = FrameCompositor::new(64, 36, 8.0, false);
        for (w, h) in [(640, 480), (16, 16), (64, 36)] {
            let out = compositor.composite(&gradient(w, h), None, &Backdrop::none(), false, Some(2));
            assert_eq!(out.dimensions(), (64, 36));
        }
    }

    #[test]
    fn out_of_range_skips_background() {
        let compositor = FrameCompositor::new(32, 32, 2.0, false);
        let frame = gradient(32, 32);
        let backdrop = Backdrop::load(&BackgroundSpec::Blur, 32, 32).unwrap();
        let out = compositor.composite(&frame, Some(&half_matte(32, 32)), &backdrop, false, None);
        assert_eq!(out, frame);
    }

    #[test]
    fn subject_is_cut_onto_background() {
        let compositor = FrameCompositor::new(32, 32, 2.0, false);
        let frame = RgbImage::from_pixel(32, 32, Rgb([250, 10, 10]));
        let backdrop_image = RgbImage::from_pixel(32, 32, Rgb([0, 0, 200]));
        let backdrop = Backdrop {
            spec: BackgroundSpec::Image("inline".into()),
            layer: BackgroundLayer::Image(backdrop_image),
        };

        let out = compositor.composite(&frame, Some(&half_matte(32, 32)), &backdrop, true, None);
        assert_eq!(*out.get_pixel(2, 16), Rgb([250, 10, 10]));
        assert_eq!(*out.get_pixel(30, 16), Rgb([0, 0, 200]));
    }

    #[test]
    fn soft_matte_blends() {
        let subject = RgbImage::from_pixel(1, 1, Rgb([200, 0, 100]));
        let matte = GrayImage::from_pixel(1, 1, Luma([128]));
        let background = RgbImage::from_pixel(1, 1, Rgb([0, 200, 100]));
        let out = cut_out(&subject, &matte, background);
        assert_eq!(*out.get_pixel(0, 0), Rgb([100, 100, 100]));
    }

    #[test]
    fn mirror_flips_display() {
        let compositor = FrameCompositor::new(4, 1, 0.0, true);
        let frame = RgbImage::from_fn(4, 1, |x, _| Rgb([x as u8 * 10, 0, 0]));
        let out = compositor.composite(&frame, None, &Backdrop::none(), false, None);
        assert_eq!(out.get_pixel(0, 0).0[0], 30);
        assert_eq!(out.get_pixel(3, 0).0[0], 0);
    }

    #[test]
    fn countdown_overlay_is_drawn_last() {
        let compositor = FrameCompositor::new(64, 36, 8.0, false);
        let frame = RgbImage::from_pixel(64, 36, Rgb([200, 200, 200]));
        let out = compositor.composite(&frame, None, &Backdrop::none(), false, Some(3));
        assert_eq!(*out.get_pixel(0, 0), Rgb([100, 100, 100]));
    }
}
