// src/main.rs
mod app;
mod classifier;
mod config;
mod controller;
mod error;
mod game;
mod gesture;
mod overlay;
mod predict_loop;
mod tracking;
mod ui;
mod video;

use crate::classifier::KnnClassifier;
use crate::config::GameConfig;
use crate::error::GameError;
use crate::predict_loop::{PredictLoopHandle, SharedFrame};
use crate::tracking::{HandDetector, MediaPipeDetector, NoDetector};
use crate::video::{CameraRequest, CameraSource};
use anyhow::Context;
use eframe::egui;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = GameConfig::load()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("rps-worker")
        .build()
        .context("Failed to build async runtime")?;

    let classifier = match KnnClassifier::load(&config.model_path) {
        Ok(classifier) => {
            tracing::info!("Model successfully loaded!");
            Some(Arc::new(classifier))
        }
        Err(e) => {
            tracing::error!("{}", e);
            None
        }
    };

    let detector: Box<dyn HandDetector> = match MediaPipeDetector::spawn(&config.detector) {
        Ok(detector) => Box::new(detector),
        Err(e) => {
            tracing::warn!("Hand detector unavailable ({:#}), no landmarks will be found", e);
            Box::new(NoDetector)
        }
    };

    let shared = SharedFrame::default();
    let (predict, status) = match setup_camera(&config, detector, shared.clone()) {
        Ok(handle) => (Some(handle), "Show a gesture and press Classify".to_string()),
        Err(e) => {
            tracing::error!("{}", e);
            (None, format!("{}; use the buttons to play", e))
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 720.0])
            .with_min_inner_size([900.0, 600.0]),
        centered: true,
        ..Default::default()
    };

    let handle = runtime.handle().clone();
    eframe::run_native(
        "Rock Paper Scissors",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(create_visuals());
            Box::new(app::RpsApp::new(cc, config, handle, shared, predict, classifier, status))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Error running application: {}", e))
}

fn setup_camera(
    config: &GameConfig,
    detector: Box<dyn HandDetector>,
    shared: SharedFrame,
) -> Result<PredictLoopHandle, GameError> {
    let cameras = video::probe_webcam()?;
    tracing::info!("Found {} camera(s):", cameras.len());
    for (i, name) in cameras.iter().enumerate() {
        tracing::info!("  [{}] {}", i, name);
    }

    let request = CameraRequest {
        index: config.camera_index,
        width: config.video_width,
        height: config.video_height,
    };
    predict_loop::start(
        move || CameraSource::open(request),
        detector,
        shared,
        config.refresh_interval(),
        None,
    )
}

fn create_visuals() -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();

    visuals.widgets.noninteractive.bg_fill = egui::Color32::from_rgb(30, 30, 35);
    visuals.widgets.inactive.bg_fill = egui::Color32::from_rgb(45, 45, 52);
    visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(55, 55, 65);
    visuals.widgets.active.bg_fill = egui::Color32::from_rgb(70, 130, 240);

    visuals.widgets.noninteractive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.inactive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.hovered.rounding = egui::Rounding::same(8.0);
    visuals.widgets.active.rounding = egui::Rounding::same(8.0);

    visuals.window_rounding = egui::Rounding::same(12.0);
    visuals.menu_rounding = egui::Rounding::same(8.0);

    visuals
}
