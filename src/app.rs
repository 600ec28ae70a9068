// src/app.rs
use crate::classifier::KnnClassifier;
use crate::config::GameConfig;
use crate::controller::GameController;
use crate::game::{Action, GameSession, RoundPhase, RoundPolicy};
use crate::gesture::GestureBridge;
use crate::overlay;
use crate::predict_loop::{PredictLoopHandle, SharedFrame};
use crate::ui::{self, CharacterArt, Side, Theme, VideoWidget};

use eframe::egui;
use egui_extras::{Column, TableBuilder};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Instant;

pub struct RpsApp {
    config: GameConfig,
    runtime: tokio::runtime::Handle,

    // Game state
    controller: GameController,
    rng: SmallRng,

    // Capture and classification
    shared: SharedFrame,
    predict: Option<PredictLoopHandle>,
    classifier: Option<Arc<KnnClassifier>>,

    // UI State
    video: VideoWidget,
    art: CharacterArt,
    theme: Theme,
    show_settings: bool,
}

impl RpsApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: GameConfig,
        runtime: tokio::runtime::Handle,
        shared: SharedFrame,
        predict: Option<PredictLoopHandle>,
        classifier: Option<Arc<KnnClassifier>>,
        status: String,
    ) -> Self {
        let session = GameSession::new(config.shake_duration(), config.round_policy);
        let art = CharacterArt::load(&cc.egui_ctx, &config.images_dir);

        Self {
            config,
            runtime,
            controller: GameController::new(session, status),
            rng: SmallRng::from_os_rng(),
            shared,
            predict,
            classifier,
            video: VideoWidget::default(),
            art,
            theme: Theme::default(),
            show_settings: false,
        }
    }

    fn classify(&mut self) {
        let Some(classifier) = self.classifier.clone() else {
            self.controller.set_status("No classifier model loaded");
            return;
        };

        let hands = match self.shared.lock() {
            Ok(latest) => latest.hands.clone(),
            Err(_) => {
                tracing::error!("Latest frame lock poisoned");
                return;
            }
        };
        if hands.is_empty() {
            tracing::warn!("Classify requested with no hand in view");
            self.controller.set_status("No hand detected");
            return;
        }

        let bridge = GestureBridge::new(classifier, self.config.neighbor_count);
        let tx = self.controller.begin_classification();
        self.runtime.spawn(async move {
            let result = bridge.classify(hands).await;
            let _ = tx.send(result);
        });
    }

    fn load_model(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("KNN model", &["json"])
            .pick_file()
        else {
            return;
        };
        match KnnClassifier::load(&path) {
            Ok(classifier) => {
                self.controller.set_status(format!("Loaded model {}", path.display()));
                self.classifier = Some(Arc::new(classifier));
                self.config.model_path = path;
            }
            Err(e) => {
                tracing::error!("{}", e);
                self.controller.set_status("Could not load model");
            }
        }
    }

    fn refresh_video(&mut self, ctx: &egui::Context) -> Vec<overlay::Shape> {
        let Ok(latest) = self.shared.lock() else {
            return Vec::new();
        };
        if let Some(frame) = latest.frame.as_ref() {
            self.video.update_frame(ctx, frame, latest.iteration);
        }
        // only the first hand is drawn
        latest
            .hands
            .first()
            .map(|hand| overlay::hand_shapes(hand, Some(self.video.frame_width())))
            .unwrap_or_default()
    }

    fn render_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(8.0);
            egui::menu::bar(ui, |ui| {
                ui.heading("Rock Paper Scissors");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("⚙ Settings").clicked() {
                        self.show_settings = !self.show_settings;
                    }
                    if ui.button("📁 Load model…").clicked() {
                        self.load_model();
                    }
                });
            });
            ui.add_space(8.0);
        });
    }

    fn render_status(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let camera = match self.predict.as_ref() {
                    Some(handle) if handle.is_running() => ("● camera", self.theme.success),
                    _ => ("● no camera", self.theme.error),
                };
                ui.colored_label(camera.1, camera.0);
                ui.separator();
                ui.label(self.controller.status());
            });
        });
    }

    fn render_video_panel(&mut self, ui: &mut egui::Ui, shapes: &[overlay::Shape]) {
        ui.group(|ui| {
            ui.heading("Camera");
            let [r, g, b] = self.config.overlay_color;
            self.video.show(ui, shapes, egui::Color32::from_rgb(r, g, b));

            ui.add_space(10.0);
            let classify = ui.add_enabled(
                !self.controller.is_classifying() && self.classifier.is_some(),
                egui::Button::new("✋ Classify").min_size(egui::vec2(140.0, 36.0)),
            );
            if classify.clicked() {
                self.classify();
            }

            if let Some(last) = self.controller.last_classification() {
                ui.add_space(6.0);
                for (label, share) in &last.confidences {
                    let name = crate::gesture::action_for_label(label)
                        .map(|a| a.as_str().to_string())
                        .unwrap_or_else(|| label.clone());
                    ui::draw_confidence_bar(ui, &self.theme, &name, *share as f32);
                }
            }
        });
    }

    fn render_game_panel(&mut self, ui: &mut egui::Ui) {
        let now = Instant::now();
        let (player_offset, computer_offset) = match self.controller.session().phase(now) {
            RoundPhase::Shaking { progress, .. } => (
                ui::shake_offset(progress, Side::Player),
                ui::shake_offset(progress, Side::Computer),
            ),
            RoundPhase::Idle => (0.0, 0.0),
        };
        let score = self.controller.session().score();

        ui.group(|ui| {
            ui.columns(2, |columns| {
                columns[0].vertical_centered(|ui| {
                    ui.heading("Player");
                    ui.label(egui::RichText::new(score.player.to_string()).size(32.0).color(self.theme.primary));
                    self.art.show(ui, &self.theme, Side::Player, self.controller.session().player_hand(), player_offset);
                });
                columns[1].vertical_centered(|ui| {
                    ui.heading("Computer");
                    ui.label(egui::RichText::new(score.computer.to_string()).size(32.0).color(self.theme.warning));
                    self.art.show(ui, &self.theme, Side::Computer, self.controller.session().computer_hand(), computer_offset);
                });
            });

            ui.add_space(16.0);
            ui.horizontal(|ui| {
                for action in Action::ALL {
                    let button = egui::Button::new(action.as_str()).min_size(egui::vec2(110.0, 40.0));
                    if ui.add(button).clicked() {
                        self.controller.press(action, Instant::now());
                    }
                }
            });
        });

        ui.add_space(12.0);
        ui.group(|ui| {
            ui.heading("Rounds");
            self.render_history(ui);
        });
    }

    fn render_history(&self, ui: &mut egui::Ui) {
        TableBuilder::new(ui)
            .striped(true)
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::auto())
            .column(Column::remainder())
            .max_scroll_height(220.0)
            .header(20.0, |mut header| {
                for title in ["Time", "You", "Computer", "Result", "Score"] {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for record in self.controller.session().history().iter().rev() {
                    body.row(18.0, |mut row| {
                        row.col(|ui| {
                            ui.label(record.resolved_at.format("%H:%M:%S").to_string());
                        });
                        row.col(|ui| {
                            ui.label(record.chosen.as_str());
                        });
                        row.col(|ui| {
                            ui.label(record.opposing.as_str());
                        });
                        row.col(|ui| {
                            ui.label(format!("{:?}", record.outcome));
                        });
                        row.col(|ui| {
                            ui.label(format!("{} - {}", record.score.player, record.score.computer));
                        });
                    });
                }
            });
    }

    fn render_settings_window(&mut self, ctx: &egui::Context) {
        let mut policy = self.controller.session().policy();
        egui::Window::new("Settings")
            .open(&mut self.show_settings)
            .resizable(false)
            .default_size([320.0, 200.0])
            .show(ctx, |ui| {
                ui.heading("Classifier");
                ui.label("Neighbours (k):");
                ui.add(egui::Slider::new(&mut self.config.neighbor_count, 1..=50));
                ui.label(format!("Model: {}", self.config.model_path.display()));

                ui.separator();
                ui.heading("Rounds");
                ui.radio_value(&mut policy, RoundPolicy::Serialize, "One round at a time");
                ui.radio_value(&mut policy, RoundPolicy::Overlap, "Allow overlapping rounds");
            });
        self.controller.set_policy(policy);
    }
}

impl eframe::App for RpsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.controller.advance(now, &mut self.rng);
        self.controller.poll_classifications(now);
        let shapes = self.refresh_video(ctx);

        self.render_header(ctx);
        self.render_status(ctx);

        if self.show_settings {
            self.render_settings_window(ctx);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.columns(2, |columns| {
                self.render_video_panel(&mut columns[0], &shapes);
                self.render_game_panel(&mut columns[1]);
            });
        });

        // Request repaint for continuous updates
        ctx.request_repaint();
    }
}
