// src/video.rs - Camera capture and frame preparation
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use tracing::{debug, info, warn};

use crate::error::{HandiError, Result};

/// Mirrors the frame horizontally and scales it to `height` rows, keeping the
/// aspect ratio.
pub fn prepare_frame(frame: &RgbImage, height: u32) -> DynamicImage {
    let flipped = imageops::flip_horizontal(frame);
    let (w, h) = flipped.dimensions();
    if h == 0 || w == 0 || h == height {
        return DynamicImage::ImageRgb8(flipped);
    }
    let width = ((w as f64 * height as f64 / h as f64).round() as u32).max(1);
    DynamicImage::ImageRgb8(imageops::resize(&flipped, width, height, FilterType::Triangle))
}

/// Human-readable names of the cameras nokhwa can see.
pub fn list_cameras() -> Result<Vec<String>> {
    let cameras = nokhwa::query(ApiBackend::Auto).map_err(|e| HandiError::Camera(e.to_string()))?;
    Ok(cameras.iter().map(|c| c.human_name()).collect())
}

pub struct CameraSource {
    camera: Camera,
    height: u32,
}

impl CameraSource {
    pub fn open(index: u32, height: u32) -> Result<Self> {
        debug!("Opening camera index {}", index);
        let format = CameraFormat::new(Resolution::new(640, 480), FrameFormat::MJPEG, 30);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| HandiError::Camera(format!("failed to open camera {index}: {e}")))?;
        camera
            .open_stream()
            .map_err(|e| HandiError::Camera(format!("failed to open camera stream: {e}")))?;

        let resolution = camera.resolution();
        info!(
            "Camera {} streaming at {}x{} @ {} fps",
            index,
            resolution.width(),
            resolution.height(),
            camera.frame_rate()
        );
        Ok(Self { camera, height })
    }

    /// Captures one frame, mirrored and resized for detection.
    pub fn read_frame(&mut self) -> Result<DynamicImage> {
        let frame = self
            .camera
            .frame()
            .map_err(|e| HandiError::Camera(format!("failed to capture frame: {e}")))?;
        let decoded = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| HandiError::Camera(format!("failed to decode frame: {e}")))?;
        Ok(prepare_frame(&decoded, self.height))
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            warn!("failed to stop camera stream: {}", e);
        }
    }
}
