use fiducial_ar_core::{GrayImageView, MarkerDetection, Quad};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::candidates::{find_quads, CandidateParams};
use crate::decode::read_code;
use crate::threshold::adaptive_threshold;
use crate::Matcher;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Marker detector parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Side of the local-mean window for adaptive thresholding, in pixels.
    pub adaptive_window: usize,
    /// A pixel is dark when it is this much below its local mean.
    pub adaptive_offset: f32,
    pub min_marker_side_px: f64,
    /// Upper bound on marker side relative to the larger image dimension.
    pub max_marker_side_frac: f64,
    /// Fraction of border cells that must read black.
    pub min_border_score: f32,
    /// Hamming budget; `None` uses the dictionary's correction capability.
    pub max_hamming: Option<u8>,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            adaptive_window: 31,
            adaptive_offset: 7.0,
            min_marker_side_px: 12.0,
            max_marker_side_frac: 0.95,
            min_border_score: 0.85,
            max_hamming: None,
        }
    }
}

/// Detect and decode markers of one dictionary.
///
/// Quads that look like markers but fail decoding are returned in
/// `rejected`, in the orientation they were found.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(gray, matcher, params), fields(width = gray.width, height = gray.height))
)]
pub fn detect_markers(
    gray: &GrayImageView<'_>,
    matcher: &Matcher,
    params: &DetectorParams,
) -> MarkerDetection {
    let mut out = MarkerDetection::default();
    if gray.width < 3 || gray.height < 3 {
        return out;
    }

    let mask = adaptive_threshold(gray, params.adaptive_window, params.adaptive_offset);
    let candidate_params = CandidateParams {
        min_side_px: params.min_marker_side_px,
        max_side_px: params.max_marker_side_frac * gray.width.max(gray.height) as f64,
    };
    let quads = find_quads(&mask, gray.width, gray.height, candidate_params);

    for quad in quads {
        let decoded = read_code(gray, &quad, matcher.marker_size(), params.min_border_score)
            .and_then(|code| matcher.match_code(code));
        match decoded {
            Some(m) => {
                let r = m.rotation as usize;
                let corners: Quad = std::array::from_fn(|k| to_f32(quad[(k + r) % 4]));
                out.push(m.id, corners);
            }
            None => out.rejected.push(quad.map(to_f32)),
        }
    }

    log::debug!(
        "detected {} markers, {} rejected candidates",
        out.ids.len(),
        out.rejected.len()
    );
    out
}

#[inline]
fn to_f32(p: Point2<f64>) -> Point2<f32> {
    Point2::new(p.x as f32, p.y as f32)
}
