mod preprocess;
mod rvm;
mod types;

pub use preprocess::Preprocessor;
pub use rvm::RobustVideoMatting;
pub use types::{Matte, SegmentationModel};

use anyhow::Result;

/// Load the default segmentation backend (Robust Video Matting).
pub fn create_default_model(model_path: &str) -> Result<Box<dyn SegmentationModel>> {
    let model = RobustVideoMatting::new(model_path)?;
    Ok(Box::new(model))
}
