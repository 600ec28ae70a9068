// src/bin/camera_test.rs - checks that the game's webcam request can be served
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

const VIDEO_WIDTH: u32 = 360;
const VIDEO_HEIGHT: u32 = 200;

fn main() {
    tracing_subscriber::fmt::init();

    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) if cameras.is_empty() => {
            tracing::error!("Webcam not available: no capture devices found");
            return;
        }
        Ok(cameras) => {
            for (i, camera) in cameras.iter().enumerate() {
                tracing::info!("[{}] {}", i, camera.human_name());
            }
        }
        Err(e) => {
            tracing::error!("Failed to query cameras: {}", e);
            return;
        }
    }

    let format = CameraFormat::new(Resolution::new(VIDEO_WIDTH, VIDEO_HEIGHT), FrameFormat::MJPEG, 30);
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

    let mut camera = match Camera::new(CameraIndex::Index(0), requested) {
        Ok(camera) => camera,
        Err(e) => {
            tracing::error!("Failed to open camera: {}", e);
            tracing::error!("Possible causes: camera in use by another app, permission not granted, no camera connected");
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        tracing::error!("Failed to open stream: {}", e);
        return;
    }
    let resolution = camera.resolution();
    tracing::info!("Stream opened at {}x{}", resolution.width(), resolution.height());

    match camera.frame().and_then(|frame| frame.decode_image::<RgbFormat>()) {
        Ok(image) => tracing::info!("Frame captured: {}x{}", image.width(), image.height()),
        Err(e) => tracing::error!("Failed to capture frame: {}", e),
    }
    let _ = camera.stop_stream();
}
