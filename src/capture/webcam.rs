use super::CaptureSource;
use anyhow::{Context, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;

/// Webcam frames via nokhwa.
pub struct WebcamCapture {
    camera: Camera,
    resolution: (u32, u32),
}

impl WebcamCapture {
    /// Open camera `device_index`, asking for the format closest to
    /// `width`x`height` at `fps`.
    pub fn new(device_index: u32, width: u32, height: u32, fps: u32) -> Result<Self> {
        tracing::info!(
            "Opening webcam {} (requested {}x{} @ {} fps)",
            device_index,
            width,
            height,
            fps
        );

        let wanted = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, fps);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(wanted));

        let mut camera = Camera::new(CameraIndex::Index(device_index), requested)
            .context("Failed to open camera")?;
        camera
            .open_stream()
            .context("Failed to open camera stream")?;

        let format = camera.camera_format();
        let resolution = (format.width(), format.height());
        tracing::info!(
            "Webcam streaming {}x{} {:?} @ {} fps",
            resolution.0,
            resolution.1,
            format.format(),
            format.frame_rate()
        );

        Ok(Self { camera, resolution })
    }
}

impl CaptureSource for WebcamCapture {
    fn capture_frame(&mut self) -> Result<RgbImage> {
        let buffer = self.camera.frame().context("Failed to capture frame")?;
        buffer
            .decode_image::<RgbFormat>()
            .context("Failed to decode frame")
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }
}
