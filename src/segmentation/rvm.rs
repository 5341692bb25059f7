use super::preprocess::Preprocessor;
use super::types::{Matte, SegmentationModel};
use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{arr1, Array1, Array4, Ix4};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::Path;

/// Robust Video Matting person segmentation.
///
/// The network is recurrent: four hidden states are fed back on every frame,
/// which keeps the matte stable from one frame to the next.
pub struct RobustVideoMatting {
    session: Session,
    preprocessor: Preprocessor,
    width: u32,
    height: u32,
    downsample_ratio: Array1<f32>,
    recurrent: Option<[Array4<f32>; 4]>,
}

impl RobustVideoMatting {
    /// Load an RVM ONNX export, run at 512x288 with hidden states at 1/4 scale.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading RVM model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!(
            "RVM model loaded ({} inputs, {} outputs)",
            session.inputs.len(),
            session.outputs.len()
        );

        let (width, height) = (512, 288);

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(width, height),
            width,
            height,
            downsample_ratio: arr1(&[0.25]),
            recurrent: None,
        })
    }

    /// The exported graph sizes its own hidden states; a 1x1x1x1 zero seeds them.
    fn initial_states() -> [Array4<f32>; 4] {
        std::array::from_fn(|_| Array4::zeros((1, 1, 1, 1)))
    }
}

impl SegmentationModel for RobustVideoMatting {
    fn segment(&mut self, frame: &RgbImage) -> Result<Matte> {
        let _span = tracing::debug_span!("rvm_segment").entered();

        let input = self.preprocessor.to_tensor(frame);
        let [r1, r2, r3, r4] = self.recurrent.take().unwrap_or_else(Self::initial_states);

        // Inputs: src, r1i..r4i, downsample_ratio.
        // Outputs: fgr, pha, r1o..r4o.
        let outputs = {
            let _infer_span = tracing::debug_span!("inference").entered();
            self.session
                .run(ort::inputs![
                    input.view(),
                    r1.view(),
                    r2.view(),
                    r3.view(),
                    r4.view(),
                    self.downsample_ratio.view()
                ]?)
                .context("Failed to run inference")?
        };

        let alpha = outputs[1].try_extract_tensor::<f32>()?;
        let (frame_width, frame_height) = frame.dimensions();
        let matte = Preprocessor::alpha_to_matte(alpha, frame_width, frame_height);

        let mut next = Vec::with_capacity(4);
        for index in 2..6 {
            let state = outputs[index]
                .try_extract_tensor::<f32>()?
                .to_owned()
                .into_dimensionality::<Ix4>()
                .with_context(|| format!("Recurrent output {} is not 4-D", index))?;
            next.push(state);
        }
        self.recurrent = next.try_into().ok();

        Ok(matte)
    }

    fn reset_state(&mut self) {
        tracing::debug!("Resetting RVM recurrent state");
        self.recurrent = None;
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
