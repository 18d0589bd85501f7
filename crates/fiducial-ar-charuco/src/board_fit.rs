use std::collections::BTreeMap;

use fiducial_ar_core::{estimate_homography, BoardGeometry, Homography, MarkerDetection, Quad};
use nalgebra::Point2;

/// Detected markers that belong to `board`, keyed by id (first occurrence wins).
pub(crate) fn board_markers(markers: &MarkerDetection, board: &BoardGeometry) -> BTreeMap<u32, Quad> {
    let mut out = BTreeMap::new();
    for (id, quad) in markers.iter() {
        if board.contains_marker(id) {
            out.entry(id).or_insert(*quad);
        }
    }
    out
}

/// Board-plane -> image homography from the corners of the given markers.
pub(crate) fn fit_board_homography<'a>(
    board: &BoardGeometry,
    markers: impl IntoIterator<Item = (u32, &'a Quad)>,
) -> Option<Homography> {
    let mut obj = Vec::new();
    let mut img = Vec::new();
    for (id, quad) in markers {
        let Some(corners) = board.marker_object_corners(id) else {
            continue;
        };
        obj.extend(corners);
        img.extend(quad.iter().map(|p| Point2::new(p.x as f64, p.y as f64)));
    }
    estimate_homography(&obj, &img)
}

pub(crate) fn mean_side(quad: &Quad) -> f64 {
    (0..4)
        .map(|k| (quad[k] - quad[(k + 1) % 4]).norm() as f64)
        .sum::<f64>()
        / 4.0
}

#[inline]
pub(crate) fn inside(p: Point2<f64>, width: usize, height: usize) -> bool {
    p.x >= 0.0 && p.y >= 0.0 && p.x <= width as f64 - 1.0 && p.y <= height as f64 - 1.0
}
