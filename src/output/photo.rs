use crate::error::{BoothError, BoothResult};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Destination for captured photos.
pub trait PhotoSink {
    /// Persist one captured frame, returning where it went.
    fn save_photo(&mut self, photo: &RgbImage) -> BoothResult<PathBuf>;
}

/// Writes `photo_<unix-millis>.png` files into a directory.
pub struct PngDirectorySink {
    dir: PathBuf,
}

impl PngDirectorySink {
    /// Create the sink, making `dir` if it does not exist.
    pub fn new<P: AsRef<Path>>(dir: P) -> BoothResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        tracing::info!("Saving photos to {}", dir.display());
        Ok(Self { dir })
    }

    fn next_path(&self) -> PathBuf {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        let mut path = self.dir.join(format!("photo_{}.png", millis));
        let mut suffix = 1;
        while path.exists() {
            path = self.dir.join(format!("photo_{}_{}.png", millis, suffix));
            suffix += 1;
        }
        path
    }
}

impl PhotoSink for PngDirectorySink {
    fn save_photo(&mut self, photo: &RgbImage) -> BoothResult<PathBuf> {
        let path = self.next_path();
        photo
            .save(&path)
            .map_err(|source| BoothError::PhotoWrite {
                path: path.clone(),
                source,
            })?;
        tracing::info!(
            "Photo saved to {} ({}x{})",
            path.display(),
            photo.width(),
            photo.height()
        );
        Ok(path)
    }
}
