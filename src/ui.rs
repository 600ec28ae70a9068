// src/ui.rs - painting helpers for the video panel and the two characters
use crate::game::Action;
use crate::overlay::Shape;
use eframe::egui::{self, Color32, Pos2, Rect, Stroke, Vec2};
use image::DynamicImage;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color32,
    pub surface: Color32,
    pub error: Color32,
    pub warning: Color32,
    pub success: Color32,
    pub text_primary: Color32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color32::from_rgb(70, 130, 240),
            surface: Color32::from_rgb(30, 30, 35),
            error: Color32::from_rgb(244, 67, 54),
            warning: Color32::from_rgb(255, 152, 0),
            success: Color32::from_rgb(76, 175, 80),
            text_primary: Color32::WHITE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Player,
    Computer,
}

impl Side {
    fn suffix(&self) -> &'static str {
        match self {
            Side::Player => "Player",
            Side::Computer => "Computer",
        }
    }
}

/// Vertical offset of a shaking character at `progress` through the shake.
pub fn shake_offset(progress: f32, side: Side) -> f32 {
    const SWINGS: f32 = 3.0;
    const AMPLITUDE: f32 = 18.0;
    let phase = match side {
        Side::Player => 0.0,
        Side::Computer => std::f32::consts::PI,
    };
    -(progress * SWINGS * std::f32::consts::TAU + phase).sin().abs() * AMPLITUDE
}

/// Character pictures, `<images>/<ACTION><Side>.png`. Missing files fall
/// back to a text label.
pub struct CharacterArt {
    textures: HashMap<(Side, Action), egui::TextureHandle>,
}

impl CharacterArt {
    pub fn load(ctx: &egui::Context, images_dir: &Path) -> Self {
        let mut textures = HashMap::new();
        for side in [Side::Player, Side::Computer] {
            for action in Action::ALL {
                let path = images_dir.join(format!("{}{}.png", action.as_str(), side.suffix()));
                match image::open(&path) {
                    Ok(img) => {
                        let texture = ctx.load_texture(
                            format!("{}{}", action.as_str(), side.suffix()),
                            to_color_image(&img),
                            Default::default(),
                        );
                        textures.insert((side, action), texture);
                    }
                    Err(e) => tracing::debug!("No character image {}: {}", path.display(), e),
                }
            }
        }
        tracing::info!("Loaded {} character image(s)", textures.len());
        Self { textures }
    }

    pub fn show(&self, ui: &mut egui::Ui, theme: &Theme, side: Side, hand: Option<Action>, offset: f32) {
        let size = Vec2::new(160.0, 160.0);
        let (rect, _response) = ui.allocate_exact_size(size, egui::Sense::hover());
        let rect = rect.translate(Vec2::new(0.0, offset));
        let painter = ui.painter();

        // before the first round both sides hold a fist
        let action = hand.unwrap_or(Action::Stone);
        match self.textures.get(&(side, action)) {
            Some(texture) => {
                painter.image(
                    texture.id(),
                    rect,
                    Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                    Color32::WHITE,
                );
            }
            None => {
                painter.rect_filled(rect, egui::Rounding::same(8.0), theme.surface);
                painter.text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    action.as_str(),
                    egui::FontId::proportional(22.0),
                    theme.text_primary,
                );
            }
        }
    }
}

pub fn draw_confidence_bar(ui: &mut egui::Ui, theme: &Theme, label: &str, value: f32) {
    ui.horizontal(|ui| {
        ui.label(label);

        let bar_width = 160.0;
        let bar_height = 16.0;
        let rect = ui.allocate_space(Vec2::new(bar_width, bar_height)).1;
        let painter = ui.painter();

        painter.rect_filled(rect, egui::Rounding::same(4.0), theme.surface);

        let fill_rect = Rect::from_min_size(rect.min, Vec2::new(bar_width * value.clamp(0.0, 1.0), bar_height));
        let color = if value > 0.7 {
            theme.success
        } else if value > 0.4 {
            theme.warning
        } else {
            theme.error
        };
        painter.rect_filled(fill_rect, egui::Rounding::same(4.0), color);

        painter.text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            format!("{:.0}%", value * 100.0),
            egui::FontId::proportional(12.0),
            theme.text_primary,
        );
    });
}

fn to_color_image(frame: &DynamicImage) -> egui::ColorImage {
    let size = [frame.width() as usize, frame.height() as usize];
    let rgba = frame.to_rgba8();
    egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_flat_samples().as_slice())
}

/// Mirrored webcam view with the landmark overlay painted on top.
pub struct VideoWidget {
    texture: Option<egui::TextureHandle>,
    frame_size: Vec2,
    iteration: u64,
}

impl Default for VideoWidget {
    fn default() -> Self {
        Self {
            texture: None,
            frame_size: Vec2::new(360.0, 200.0),
            iteration: 0,
        }
    }
}

impl VideoWidget {

    /// Uploads `frame` unless this iteration is already on screen.
    pub fn update_frame(&mut self, ctx: &egui::Context, frame: &DynamicImage, iteration: u64) {
        if iteration == self.iteration && self.texture.is_some() {
            return;
        }
        let image = to_color_image(frame);
        self.frame_size = Vec2::new(frame.width() as f32, frame.height() as f32);
        match self.texture.as_mut() {
            Some(texture) => texture.set(image, Default::default()),
            None => self.texture = Some(ctx.load_texture("video_frame", image, Default::default())),
        }
        self.iteration = iteration;
    }

    pub fn frame_width(&self) -> f32 {
        self.frame_size.x
    }

    pub fn show(&self, ui: &mut egui::Ui, shapes: &[Shape], color: Color32) {
        let widget_width = ui.available_width().min(self.frame_size.x * 2.0);
        let aspect_ratio = self.frame_size.x / self.frame_size.y.max(1.0);
        let size = Vec2::new(widget_width, widget_width / aspect_ratio);
        let (rect, _response) = ui.allocate_exact_size(size, egui::Sense::hover());
        let painter = ui.painter_at(rect);

        let Some(texture) = self.texture.as_ref() else {
            painter.rect_filled(rect, egui::Rounding::same(4.0), Color32::from_rgb(50, 50, 55));
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "No Video Signal",
                egui::FontId::proportional(16.0),
                Color32::from_rgb(150, 150, 155),
            );
            return;
        };

        // uv x runs 1 -> 0: the webcam is shown as a mirror
        painter.image(
            texture.id(),
            rect,
            Rect::from_min_max(Pos2::new(1.0, 0.0), Pos2::new(0.0, 1.0)),
            Color32::WHITE,
        );

        let scale = Vec2::new(rect.width() / self.frame_size.x, rect.height() / self.frame_size.y);
        let to_screen = |p: &[f32; 2]| Pos2::new(rect.left() + p[0] * scale.x, rect.top() + p[1] * scale.y);
        for shape in shapes {
            match shape {
                Shape::Dot { center, radius } => {
                    painter.circle_filled(to_screen(center), radius * scale.x, color);
                }
                Shape::Path { points, closed } => {
                    let points: Vec<Pos2> = points.iter().map(to_screen).collect();
                    let stroke = Stroke::new(1.5, color);
                    if *closed {
                        painter.add(egui::Shape::closed_line(points, stroke));
                    } else {
                        painter.add(egui::Shape::line(points, stroke));
                    }
                }
            }
        }
    }
}
