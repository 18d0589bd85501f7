//! Board-aware detection refinement.
//!
//! Markers that disagree with the board layout are dropped, and missing
//! board markers are recovered from rejected candidates that sit where the
//! board homography predicts them.

use std::collections::BTreeMap;

use fiducial_ar_core::{
    BoardGeometry, GrayImageView, Homography, MarkerDetection, Quad, RefinedDetection,
};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::board_fit::{board_markers, fit_board_homography, inside, mean_side};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    /// Maximum corner deviation from the board fit, relative to the marker side.
    pub max_inconsistency: f64,
    /// Maximum mean corner distance (pixels) for a rejected candidate to be
    /// taken as a missing marker.
    pub min_rep_distance: f64,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            max_inconsistency: 0.25,
            min_rep_distance: 10.0,
        }
    }
}

/// Refine a marker detection against the board layout. Never fails; with
/// too little information the board markers are returned as detected.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(markers = detection.len(), rejected = detection.rejected.len()))
)]
pub fn refine_detection(
    gray: &GrayImageView<'_>,
    board: &BoardGeometry,
    detection: MarkerDetection,
    params: &RefineParams,
) -> RefinedDetection {
    let mut known = board_markers(&detection, board);
    let mut rejected = detection.rejected;

    if known.len() >= 2 {
        let before = known.len();
        let inliers = consistent_markers(board, &known, params.max_inconsistency);
        known.retain(|id, _| inliers.contains(id));
        if known.len() < before {
            log::debug!("dropped {} inconsistent markers", before - known.len());
        }
    }

    let mut recovered_ids = Vec::new();
    let homography = if known.is_empty() {
        None
    } else {
        fit_board_homography(board, known.iter().map(|(&id, q)| (id, q)))
    };

    if let Some(h) = homography {
        for id in 0..board.marker_count() as u32 {
            if known.contains_key(&id) || rejected.is_empty() {
                continue;
            }
            let Some(obj) = board.marker_object_corners(id) else {
                continue;
            };
            let predicted = obj.map(|o| h.apply(o));
            if !predicted.iter().all(|p| inside(*p, gray.width, gray.height)) {
                continue;
            }

            let best = rejected
                .iter()
                .enumerate()
                .flat_map(|(i, cand)| (0..4).map(move |r| (i, r, rotated(cand, r))))
                .map(|(i, r, quad)| (i, r, mean_distance(&predicted, &quad)))
                .min_by(|a, b| a.2.total_cmp(&b.2));

            if let Some((i, r, dist)) = best {
                if dist < params.min_rep_distance {
                    let cand = rejected.remove(i);
                    known.insert(id, rotated(&cand, r));
                    recovered_ids.push(id);
                    log::trace!("recovered marker {id} at {dist:.2} px");
                }
            }
        }
    }

    let mut markers = MarkerDetection {
        rejected,
        ..MarkerDetection::default()
    };
    for (id, quad) in known {
        markers.push(id, quad);
    }
    RefinedDetection {
        markers,
        recovered_ids,
    }
}

/// Markers that agree with the board layout.
///
/// Every marker proposes a board homography from its own corners; the
/// proposal agreed with by the most markers wins (lowest id on ties). The
/// homography is then refitted on that consensus and every marker is
/// checked against it once more.
fn consistent_markers(
    board: &BoardGeometry,
    known: &BTreeMap<u32, Quad>,
    max_inconsistency: f64,
) -> Vec<u32> {
    let agrees = |h: &Homography, id: u32, quad: &Quad| {
        let Some(obj) = board.marker_object_corners(id) else {
            return false;
        };
        let limit = max_inconsistency * mean_side(quad);
        obj.iter().zip(quad.iter()).all(|(o, p)| {
            (h.apply(*o) - Point2::new(p.x as f64, p.y as f64)).norm() <= limit
        })
    };
    let voters = |h: &Homography| -> Vec<u32> {
        known
            .iter()
            .filter(|(id, quad)| agrees(h, **id, *quad))
            .map(|(&id, _)| id)
            .collect()
    };

    let mut consensus: Vec<u32> = Vec::new();
    for (&id, quad) in known {
        let Some(h) = fit_board_homography(board, [(id, quad)]) else {
            continue;
        };
        let votes = voters(&h);
        if votes.len() > consensus.len() {
            consensus = votes;
        }
    }
    if consensus.len() < 2 {
        return known.keys().copied().collect();
    }

    match fit_board_homography(
        board,
        consensus.iter().filter_map(|id| known.get(id).map(|q| (*id, q))),
    ) {
        Some(h) => voters(&h),
        None => consensus,
    }
}

fn rotated(quad: &Quad, r: usize) -> Quad {
    std::array::from_fn(|k| quad[(k + r) % 4])
}

fn mean_distance(predicted: &[Point2<f64>; 4], quad: &Quad) -> f64 {
    predicted
        .iter()
        .zip(quad)
        .map(|(p, q)| (p - Point2::new(q.x as f64, q.y as f64)).norm())
        .sum::<f64>()
        / 4.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiducial_ar_core::{BoardKind, BoardSpec, DictionaryId, GrayImage};

    /// 2x2 grid board, 100 px per cell, markers 80 px, 50 px offset.
    fn setup() -> (BoardGeometry, GrayImage) {
        let board = BoardGeometry::new(BoardSpec {
            rows: 2,
            cols: 2,
            square_length: 0.1,
            marker_length: 0.08,
            dictionary: DictionaryId::Dict4x4_50,
            kind: BoardKind::Grid,
        })
        .expect("board");
        (board, GrayImage::filled(400, 400, 255))
    }

    fn marker_quad(board: &BoardGeometry, id: u32) -> Quad {
        let obj = board.marker_object_corners(id).expect("marker");
        obj.map(|o| Point2::new((50.0 + o.x * 1000.0) as f32, (50.0 + o.y * 1000.0) as f32))
    }

    #[test]
    fn recovers_missing_marker_from_rejected() {
        let (board, img) = setup();
        let mut det = MarkerDetection::default();
        for id in [0, 1, 2] {
            det.push(id, marker_quad(&board, id));
        }
        let truth = marker_quad(&board, 3);
        // Found rotated and slightly off.
        let cand = rotated(&truth, 3).map(|p| p + nalgebra::Vector2::new(1.5, -1.0));
        det.rejected.push(cand);

        let out = refine_detection(&img.view(), &board, det, &RefineParams::default());
        assert_eq!(out.recovered_ids, vec![3]);
        assert_eq!(out.markers.ids, vec![0, 1, 2, 3]);
        assert!(out.markers.rejected.is_empty());
        let q = out.markers.corners[3];
        assert!((q[0] - truth[0]).norm() < 2.0);
    }

    #[test]
    fn drops_inconsistent_marker() {
        let (board, img) = setup();
        let mut det = MarkerDetection::default();
        for id in [0, 1, 2] {
            det.push(id, marker_quad(&board, id));
        }
        // Marker 3 reported far from its board position.
        det.push(3, marker_quad(&board, 0).map(|p| p + nalgebra::Vector2::new(0.0, 300.0)));

        let out = refine_detection(&img.view(), &board, det, &RefineParams::default());
        assert_eq!(out.markers.ids, vec![0, 1, 2]);
        assert!(out.recovered_ids.is_empty());
    }

    #[test]
    fn far_candidates_are_ignored_and_foreign_ids_dropped() {
        let (board, img) = setup();
        let mut det = MarkerDetection::default();
        det.push(0, marker_quad(&board, 0));
        det.push(42, marker_quad(&board, 1));
        det.rejected.push(marker_quad(&board, 3).map(|p| p + nalgebra::Vector2::new(40.0, 0.0)));

        let out = refine_detection(&img.view(), &board, det, &RefineParams::default());
        assert_eq!(out.markers.ids, vec![0]);
        assert_eq!(out.markers.rejected.len(), 1);
        assert!(out.recovered_ids.is_empty());
    }
}
