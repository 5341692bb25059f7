use super::types::Matte;
use image::{imageops, Luma, Rgb, RgbImage};
use ndarray::{Array4, ArrayViewD};

/// Converts frames to model tensors and model output back to mattes.
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Resize `image` to the model size and lay it out as a normalized
    /// `[1, 3, H, W]` tensor.
    pub fn to_tensor(&self, image: &RgbImage) -> Array4<f32> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized;
        let image = if image.dimensions() != (self.target_width, self.target_height) {
            resized = imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Triangle,
            );
            &resized
        } else {
            image
        };

        let shape = (1, 3, self.target_height as usize, self.target_width as usize);
        Array4::from_shape_fn(shape, |(_, c, y, x)| {
            image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        })
    }

    /// Turn a `[1, 1, H, W]` alpha tensor into a matte sized `width`x`height`.
    pub fn alpha_to_matte(alpha: ArrayViewD<'_, f32>, width: u32, height: u32) -> Matte {
        let _span = tracing::debug_span!("postprocess").entered();

        let shape = alpha.shape();
        let (alpha_height, alpha_width) = (shape[shape.len() - 2], shape[shape.len() - 1]);
        let plane = alpha.to_shape((alpha_height, alpha_width));

        let matte = match plane {
            Ok(plane) => Matte::from_fn(alpha_width as u32, alpha_height as u32, |x, y| {
                Luma([(plane[[y as usize, x as usize]] * 255.0).clamp(0.0, 255.0) as u8])
            }),
            Err(err) => {
                tracing::warn!("Unexpected alpha tensor shape {:?}: {}", shape, err);
                return Matte::new(width, height);
            }
        };

        if matte.dimensions() == (width, height) {
            matte
        } else {
            imageops::resize(&matte, width, height, imageops::FilterType::Triangle)
        }
    }

    /// Grayscale rendering of a matte for display.
    pub fn matte_to_rgb(matte: &Matte) -> RgbImage {
        RgbImage::from_fn(matte.width(), matte.height(), |x, y| {
            let value = matte.get_pixel(x, y)[0];
            Rgb([value, value, value])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn tensor_is_nchw_normalized() {
        let image = RgbImage::from_pixel(4, 2, Rgb([255, 0, 51]));
        let tensor = Preprocessor::new(4, 2).to_tensor(&image);
        assert_eq!(tensor.shape(), &[1, 3, 2, 4]);
        assert_eq!(tensor[[0, 0, 1, 3]], 1.0);
        assert_eq!(tensor[[0, 1, 0, 0]], 0.0);
        assert!((tensor[[0, 2, 0, 0]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn alpha_becomes_matte() {
        let alpha = Array4::<f32>::from_shape_fn((1, 1, 2, 2), |(_, _, y, _)| y as f32);
        let matte = Preprocessor::alpha_to_matte(alpha.view().into_dyn(), 2, 2);
        assert_eq!(matte.get_pixel(0, 0)[0], 0);
        assert_eq!(matte.get_pixel(1, 1)[0], 255);
    }
}
