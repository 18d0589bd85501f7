//! Bit-grid sampling of a candidate quad.

use fiducial_ar_core::{homography_from_4pt, sample_bilinear, GrayImageView};
use nalgebra::Point2;

use crate::candidates::QuadF64;
use crate::threshold::otsu_threshold;

/// Minimum intensity spread across a marker's cells.
const MIN_CONTRAST: f32 = 20.0;

/// Sample offsets inside a cell, in cell units.
const SUB: [f64; 3] = [-0.25, 0.0, 0.25];

/// Read the inner code of a marker with `bits x bits` payload and a one-cell
/// black border. Cell `(0, 0)` sits at `quad[0]`, `x` runs towards `quad[1]`.
pub(crate) fn read_code(
    gray: &GrayImageView<'_>,
    quad: &QuadF64,
    bits: usize,
    min_border_score: f32,
) -> Option<u64> {
    let cells = bits + 2;
    let c = cells as f64;
    let src = [
        Point2::new(0.0, 0.0),
        Point2::new(c, 0.0),
        Point2::new(c, c),
        Point2::new(0.0, c),
    ];
    let h = homography_from_4pt(&src, quad)?;

    let mut samples = Vec::with_capacity(cells * cells);
    for cy in 0..cells {
        for cx in 0..cells {
            let mut acc = 0.0f32;
            for dy in SUB {
                for dx in SUB {
                    let p = h.apply(Point2::new(cx as f64 + 0.5 + dx, cy as f64 + 0.5 + dy));
                    acc += sample_bilinear(gray, p.x as f32, p.y as f32);
                }
            }
            samples.push(acc / (SUB.len() * SUB.len()) as f32);
        }
    }

    let (lo, hi) = samples
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if hi - lo < MIN_CONTRAST {
        return None;
    }
    let thr = otsu_threshold(&samples);

    let mut border_black = 0usize;
    let mut border_total = 0usize;
    let mut code = 0u64;
    for cy in 0..cells {
        for cx in 0..cells {
            let black = samples[cy * cells + cx] < thr;
            if cx == 0 || cy == 0 || cx + 1 == cells || cy + 1 == cells {
                border_total += 1;
                border_black += black as usize;
            } else if black {
                code |= 1u64 << ((cy - 1) * bits + (cx - 1));
            }
        }
    }

    let border_score = border_black as f32 / border_total.max(1) as f32;
    (border_score >= min_border_score).then_some(code)
}
