// src/overlay.rs - landmark overlay geometry, independent of the painter
use crate::tracking::{Hand, Region};

pub const POINT_RADIUS: f32 = 3.0;
const POINT_OFFSET: f32 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Dot { center: [f32; 2], radius: f32 },
    Path { points: Vec<[f32; 2]>, closed: bool },
}

/// Dots on every landmark, then one open path per finger starting at the
/// palm base. With `mirror_width` set, x is flipped to match a mirrored video.
pub fn hand_shapes(hand: &Hand, mirror_width: Option<f32>) -> Vec<Shape> {
    let place = |x: f64, y: f64| -> [f32; 2] {
        let (x, y) = (x as f32, y as f32);
        match mirror_width {
            Some(width) => [width - x, y],
            None => [x, y],
        }
    };

    let mut shapes: Vec<Shape> = hand
        .landmarks
        .iter()
        .map(|point| Shape::Dot {
            center: place(point.x - POINT_OFFSET as f64, point.y - POINT_OFFSET as f64),
            radius: POINT_RADIUS,
        })
        .collect();

    let Some(palm) = hand.annotations.palm_base() else {
        return shapes;
    };

    for (region, points) in hand.annotations.iter() {
        if region == Region::PalmBase || points.is_empty() {
            continue;
        }
        let path = std::iter::once(&palm)
            .chain(points.iter())
            .map(|point| place(point.x, point.y))
            .collect();
        shapes.push(Shape::Path { points: path, closed: false });
    }

    shapes
}
