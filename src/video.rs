// src/video.rs - webcam acquisition
use crate::error::GameError;
use anyhow::{Context, Result};
use image::{DynamicImage, ImageBuffer};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

pub trait FrameSource {
    fn read_frame(&mut self) -> Result<DynamicImage>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraRequest {
    pub index: u32,
    pub width: u32,
    pub height: u32,
}

/// Lists capture devices. No devices at all means the platform offers no
/// webcam, which is not something a retry can fix.
pub fn probe_webcam() -> Result<Vec<String>, GameError> {
    let cameras = nokhwa::query(ApiBackend::Auto).map_err(|e| {
        tracing::error!("Failed to query cameras: {}", e);
        GameError::WebcamUnavailable
    })?;
    if cameras.is_empty() {
        return Err(GameError::WebcamUnavailable);
    }
    Ok(cameras.iter().map(|camera| camera.human_name()).collect())
}

pub struct CameraSource {
    camera: Camera,
}

impl CameraSource {
    pub fn open(request: CameraRequest) -> Result<Self, GameError> {
        tracing::info!(
            "Opening camera {} at {}x{}",
            request.index,
            request.width,
            request.height
        );

        let format = CameraFormat::new(
            Resolution::new(request.width, request.height),
            FrameFormat::MJPEG,
            30,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera = Camera::new(CameraIndex::Index(request.index), requested)
            .map_err(|e| GameError::StreamFailed(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| GameError::StreamFailed(e.to_string()))?;

        let resolution = camera.resolution();
        tracing::info!(
            "Camera streaming at {}x{} @ {} fps",
            resolution.width(),
            resolution.height(),
            camera.frame_rate()
        );
        Ok(Self { camera })
    }
}

impl FrameSource for CameraSource {
    fn read_frame(&mut self) -> Result<DynamicImage> {
        let frame = self
            .camera
            .frame()
            .map_err(|e| anyhow::anyhow!("Failed to capture frame: {}", e))?;
        let decoded = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| anyhow::anyhow!("Failed to decode frame: {}", e))?;

        let (width, height) = (decoded.width(), decoded.height());
        let rgb = ImageBuffer::from_raw(width, height, decoded.into_raw())
            .context("Failed to create image buffer")?;

        // Left unmirrored: the landmarks fed to the classifier must match
        // the orientation it was trained on. Only the display is flipped.
        Ok(DynamicImage::ImageRgb8(rgb))
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        let _ = self.camera.stop_stream();
    }
}
