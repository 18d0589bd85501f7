//! Synthetic geometry drawn on top of each marker.

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::draw::draw_line;
use crate::{Frame, Rgb};

/// Which template is drawn per marker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Three axes from the marker center: x red, y green, z blue.
    #[default]
    Axis,
    /// A cube standing on the marker: blue pillars, red top face.
    Cube,
}

/// Marker-frame points plus the colored edges joining them.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayTemplate {
    pub points: Vec<Point3<f64>>,
    pub edges: Vec<(usize, usize, Rgb)>,
}

impl OverlayTemplate {
    /// Origin and the tips of three axes of length `axis_length`.
    pub fn axis(axis_length: f64) -> Self {
        let a = axis_length;
        Self {
            points: vec![
                Point3::origin(),
                Point3::new(a, 0.0, 0.0),
                Point3::new(0.0, a, 0.0),
                Point3::new(0.0, 0.0, a),
            ],
            edges: vec![(0, 1, Rgb::RED), (0, 2, Rgb::GREEN), (0, 3, Rgb::BLUE)],
        }
    }

    /// Cube of side `side` on the marker plane, extruded towards the camera.
    pub fn cube(side: f64) -> Self {
        let h = 0.5 * side;
        let base = [(-h, -h), (-h, h), (h, h), (h, -h)];
        let points = [0.0, side]
            .iter()
            .flat_map(|&z| base.iter().map(move |&(x, y)| Point3::new(x, y, z)))
            .collect();
        let pillars = (0..4).map(|i| (i, i + 4, Rgb::BLUE));
        let top = (0..4).map(|i| (4 + i, 4 + (i + 1) % 4, Rgb::RED));
        Self {
            points,
            edges: pillars.chain(top).collect(),
        }
    }

    pub fn for_mode(mode: RenderMode, marker_length: f64, axis_length: f64) -> Self {
        match mode {
            RenderMode::Axis => Self::axis(axis_length),
            RenderMode::Cube => Self::cube(marker_length),
        }
    }

    /// Draw the edges given the projected `points` (same order as `self.points`).
    pub fn draw(&self, frame: &mut Frame, projected: &[Point2<f64>], thickness: u32) {
        for &(i, j, color) in &self.edges {
            if let (Some(&a), Some(&b)) = (projected.get(i), projected.get(j)) {
                draw_line(frame, a, b, color, thickness);
            }
        }
    }
}
