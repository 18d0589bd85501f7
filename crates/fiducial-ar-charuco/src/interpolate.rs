//! Board-corner interpolation from detected markers.

use fiducial_ar_core::{
    BoardCornerSet, BoardGeometry, BoardKind, GrayImageView, Homography, MarkerDetection,
};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::board_fit::{board_markers, fit_board_homography, inside};
use crate::subpix::corner_subpix;

/// Parameters for chessboard-corner interpolation and refinement.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationParams {
    /// Refinement half-window as a fraction of the local square size in pixels.
    pub window_frac: f64,
    pub min_window_px: i32,
    pub max_window_px: i32,
    pub max_iters: usize,
    /// Stop when the corner moves less than this (pixels).
    pub epsilon: f64,
}

impl Default for InterpolationParams {
    fn default() -> Self {
        Self {
            window_frac: 0.2,
            min_window_px: 2,
            max_window_px: 12,
            max_iters: 20,
            epsilon: 0.01,
        }
    }
}

/// Board corners visible through the detected markers, sorted by id.
///
/// For ChArUco boards each inner corner adjacent to at least one detected
/// marker is predicted through a homography fitted to the neighbouring
/// markers (or all markers as fallback) and refined on the image. Grid
/// boards report the marker corners directly.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(markers, gray, board, params), fields(markers = markers.len()))
)]
pub fn interpolate_corners(
    markers: &MarkerDetection,
    gray: &GrayImageView<'_>,
    board: &BoardGeometry,
    params: &InterpolationParams,
) -> BoardCornerSet {
    let known = board_markers(markers, board);
    let mut out = BoardCornerSet::default();
    if known.is_empty() {
        return out;
    }

    if board.kind() == BoardKind::Grid {
        for (&id, quad) in &known {
            for (k, p) in quad.iter().enumerate() {
                out.ids.push(4 * id + k as u32);
                out.corners.push(*p);
            }
        }
        return out;
    }

    let Some(global) = fit_board_homography(board, known.iter().map(|(&id, q)| (id, q))) else {
        log::debug!("no board homography from {} markers", known.len());
        return out;
    };

    let s = board.square_length();
    for id in 0..board.corner_count() as u32 {
        let adjacent: Vec<u32> = board
            .corner_adjacent_markers(id)
            .into_iter()
            .filter(|m| known.contains_key(m))
            .collect();
        if adjacent.is_empty() {
            continue;
        }
        let Some(obj) = board.corner_object_point(id) else {
            continue;
        };

        let local = if adjacent.len() >= 2 {
            fit_board_homography(board, adjacent.iter().filter_map(|m| known.get(m).map(|q| (*m, q))))
        } else {
            None
        };
        let h = local.as_ref().unwrap_or(&global);

        let predicted = h.apply(obj);
        if !inside(predicted, gray.width, gray.height) {
            continue;
        }

        let half = window_half(h, obj, s, params);
        let refined = corner_subpix(gray, predicted, half, params.max_iters, params.epsilon)
            .unwrap_or(predicted);

        out.ids.push(id);
        out.corners.push(Point2::new(refined.x as f32, refined.y as f32));
    }

    log::trace!("interpolated {} corners", out.count());
    out
}

fn window_half(h: &Homography, obj: Point2<f64>, square: f64, params: &InterpolationParams) -> i32 {
    let p = h.apply(obj);
    let px = h.apply(obj + Vector2::new(square, 0.0));
    let py = h.apply(obj + Vector2::new(0.0, square));
    let square_px = 0.5 * ((px - p).norm() + (py - p).norm());
    let half = (params.window_frac * square_px).round();
    if !half.is_finite() {
        return params.min_window_px;
    }
    (half as i32).clamp(params.min_window_px, params.max_window_px.max(params.min_window_px))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiducial_ar_core::{BoardSpec, DictionaryId, Quad};

    fn grid_board() -> BoardGeometry {
        BoardGeometry::new(BoardSpec {
            rows: 1,
            cols: 2,
            square_length: 0.1,
            marker_length: 0.08,
            dictionary: DictionaryId::Dict4x4_50,
            kind: BoardKind::Grid,
        })
        .expect("board")
    }

    fn quad(x: f32, y: f32, side: f32) -> Quad {
        [
            Point2::new(x, y),
            Point2::new(x + side, y),
            Point2::new(x + side, y + side),
            Point2::new(x, y + side),
        ]
    }

    #[test]
    fn grid_board_reports_marker_corners_sorted() {
        let board = grid_board();
        let mut markers = MarkerDetection::default();
        markers.push(1, quad(200.0, 50.0, 80.0));
        markers.push(0, quad(100.0, 50.0, 80.0));
        markers.push(9, quad(10.0, 10.0, 20.0));

        let img = fiducial_ar_core::GrayImage::filled(400, 200, 255);
        let set = interpolate_corners(&markers, &img.view(), &board, &Default::default());
        assert_eq!(set.ids, vec![0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(set.corners[0], Point2::new(100.0, 50.0));
        assert_eq!(set.corners[6], Point2::new(280.0, 130.0));
    }

    #[test]
    fn no_markers_no_corners() {
        let board = BoardGeometry::new(BoardSpec::default()).expect("board");
        let img = fiducial_ar_core::GrayImage::filled(100, 100, 255);
        let set = interpolate_corners(&MarkerDetection::default(), &img.view(), &board, &Default::default());
        assert!(set.is_empty());
    }
}
