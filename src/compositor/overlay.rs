//! Countdown overlay: dimmed scrim, dark disc and a seven-segment digit.

use image::{Rgb, RgbImage};

const SCRIM_KEEP: f32 = 0.5;
const DISC_KEEP: f32 = 0.4;
const DISC_RADIUS: f32 = 0.18;
const DIGIT_FILL: Rgb<u8> = Rgb([255, 255, 255]);
const DIGIT_OUTLINE: Rgb<u8> = Rgb([15, 15, 15]);

// Segment order: a (top), b, c, d (bottom), e, f, g (middle).
const SEGMENTS: [[bool; 7]; 10] = [
    [true, true, true, true, true, true, false],
    [false, true, true, false, false, false, false],
    [true, true, false, true, true, false, true],
    [true, true, true, true, false, false, true],
    [false, true, true, false, false, true, true],
    [true, false, true, true, false, true, true],
    [true, false, true, true, true, true, true],
    [true, true, true, false, false, false, false],
    [true, true, true, true, true, true, true],
    [true, true, true, true, false, true, true],
];

/// Draw the countdown overlay for `digit` over everything already on `canvas`.
pub fn draw_countdown(canvas: &mut RgbImage, digit: u8) {
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let radius = width.min(height) as f32 * DISC_RADIUS;

    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        let keep = if dx * dx + dy * dy <= radius * radius {
            SCRIM_KEEP * DISC_KEEP
        } else {
            SCRIM_KEEP
        };
        for channel in pixel.0.iter_mut() {
            *channel = (*channel as f32 * keep) as u8;
        }
    }

    let glyph_height = radius * 1.1;
    let glyph_width = glyph_height * 0.55;
    let thickness = (glyph_height * 0.13).max(1.0);
    let outline = (thickness * 0.35).max(1.0);
    let rects = segment_rects(digit % 10, cx, cy, glyph_width, glyph_height, thickness);

    for rect in &rects {
        fill_rect(canvas, rect.grow(outline), DIGIT_OUTLINE);
    }
    for rect in &rects {
        fill_rect(canvas, *rect, DIGIT_FILL);
    }
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    left: f32,
    top: f32,
    width: f32,
    height: f32,
}

impl Rect {
    fn grow(self, by: f32) -> Self {
        Self {
            left: self.left - by,
            top: self.top - by,
            width: self.width + 2.0 * by,
            height: self.height + 2.0 * by,
        }
    }
}

fn segment_rects(digit: u8, cx: f32, cy: f32, w: f32, h: f32, t: f32) -> Vec<Rect> {
    let left = cx - w / 2.0;
    let top = cy - h / 2.0;
    let half = h / 2.0;
    let all = [
        Rect { left, top, width: w, height: t },
        Rect { left: left + w - t, top, width: t, height: half },
        Rect { left: left + w - t, top: top + half, width: t, height: half },
        Rect { left, top: top + h - t, width: w, height: t },
        Rect { left, top: top + half, width: t, height: half },
        Rect { left, top, width: t, height: half },
        Rect { left, top: top + half - t / 2.0, width: w, height: t },
    ];

    SEGMENTS[digit as usize]
        .iter()
        .zip(all)
        .filter(|(on, _)| **on)
        .map(|(_, rect)| rect)
        .collect()
}

fn fill_rect(canvas: &mut RgbImage, rect: Rect, color: Rgb<u8>) {
    let (width, height) = canvas.dimensions();
    let x0 = rect.left.round().max(0.0) as u32;
    let y0 = rect.top.round().max(0.0) as u32;
    let x1 = ((rect.left + rect.width).round().max(0.0) as u32).min(width);
    let y1 = ((rect.top + rect.height).round().max(0.0) as u32).min(height);

    for y in y0..y1 {
        for x in x0..x1 {
            canvas.put_pixel(x, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrim_dims_corners() {
        let mut canvas = RgbImage::from_pixel(128, 72, Rgb([200, 100, 50]));
        draw_countdown(&mut canvas, 3);
        assert_eq!(*canvas.get_pixel(0, 0), Rgb([100, 50, 25]));
        assert_eq!(*canvas.get_pixel(127, 71), Rgb([100, 50, 25]));
    }

    #[test]
    fn digit_is_drawn_at_center() {
        let mut canvas = RgbImage::from_pixel(1280, 720, Rgb([0, 0, 0]));
        draw_countdown(&mut canvas, 8);
        // The middle bar of an 8 crosses the center.
        assert_eq!(*canvas.get_pixel(640, 360), DIGIT_FILL);
    }

    #[test]
    fn one_leaves_center_dark() {
        let mut canvas = RgbImage::from_pixel(1280, 720, Rgb([200, 200, 200]));
        draw_countdown(&mut canvas, 1);
        let center = canvas.get_pixel(640, 360);
        assert!(center.0[0] < 100);
        let lit = canvas.pixels().filter(|p| **p == DIGIT_FILL).count();
        assert!(lit > 0);
    }
}
