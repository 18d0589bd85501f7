//! Quadrilateral candidates from a binary mask.

use std::collections::VecDeque;

use nalgebra::Point2;

/// Image-space quad, clockwise with y pointing down.
pub(crate) type QuadF64 = [Point2<f64>; 4];

#[derive(Clone, Copy, Debug)]
pub(crate) struct CandidateParams {
    pub min_side_px: f64,
    pub max_side_px: f64,
}

/// Find dark 4-connected components that look like convex quadrilaterals.
pub(crate) fn find_quads(mask: &[bool], w: usize, h: usize, params: CandidateParams) -> Vec<QuadF64> {
    let mut labels = vec![u32::MAX; w * h];
    let mut out = Vec::new();
    let mut queue = VecDeque::new();
    let mut pixels = Vec::new();
    let mut next_label = 0u32;

    for start in 0..w * h {
        if !mask[start] || labels[start] != u32::MAX {
            continue;
        }
        let label = next_label;
        next_label += 1;

        pixels.clear();
        labels[start] = label;
        queue.push_back(start);
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (w, h, 0usize, 0usize);
        while let Some(idx) = queue.pop_front() {
            pixels.push(idx);
            let (x, y) = (idx % w, idx / w);
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);

            let neighbors = [
                (x > 0).then(|| idx - 1),
                (x + 1 < w).then(|| idx + 1),
                (y > 0).then(|| idx - w),
                (y + 1 < h).then(|| idx + w),
            ];
            for n in neighbors.into_iter().flatten() {
                if mask[n] && labels[n] == u32::MAX {
                    labels[n] = label;
                    queue.push_back(n);
                }
            }
        }

        let bw = (max_x - min_x + 1) as f64;
        let bh = (max_y - min_y + 1) as f64;
        if bw.max(bh) < params.min_side_px || bw.max(bh) > params.max_side_px {
            continue;
        }
        // Markers need a quiet zone, so components touching the border are skipped.
        if min_x == 0 || min_y == 0 || max_x + 1 == w || max_y + 1 == h {
            continue;
        }

        let boundary = boundary_points(&pixels, &labels, label, w);
        let hull = convex_hull(boundary);
        if let Some(quad) = fit_quad(&hull, params.min_side_px) {
            out.push(quad);
        }
    }
    out
}

/// Pixel-corner points of every component pixel with a 4-neighbor outside it.
fn boundary_points(pixels: &[usize], labels: &[u32], label: u32, w: usize) -> Vec<Point2<f64>> {
    let mut pts = Vec::new();
    for &idx in pixels {
        let (x, y) = (idx % w, idx / w);
        // Components never touch the border here, so all neighbors exist.
        let inner = [idx - 1, idx + 1, idx - w, idx + w]
            .iter()
            .all(|&n| labels[n] == label);
        if inner {
            continue;
        }
        let (fx, fy) = (x as f64, y as f64);
        pts.extend([
            Point2::new(fx - 0.5, fy - 0.5),
            Point2::new(fx + 0.5, fy - 0.5),
            Point2::new(fx + 0.5, fy + 0.5),
            Point2::new(fx - 0.5, fy + 0.5),
        ]);
    }
    pts
}

#[inline]
fn cross(o: Point2<f64>, a: Point2<f64>, b: Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Andrew's monotone chain.
pub(crate) fn convex_hull(mut pts: Vec<Point2<f64>>) -> Vec<Point2<f64>> {
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point2<f64>> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point2<f64>> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

pub(crate) fn polygon_area(poly: &[Point2<f64>]) -> f64 {
    let n = poly.len();
    let mut s = 0.0;
    for i in 0..n {
        let (a, b) = (poly[i], poly[(i + 1) % n]);
        s += a.x * b.y - b.x * a.y;
    }
    0.5 * s
}

/// Fit a quad to a convex hull: the farthest vertex pair is one diagonal,
/// the farthest vertices on either side of it close the quad.
pub(crate) fn fit_quad(hull: &[Point2<f64>], min_side: f64) -> Option<QuadF64> {
    if hull.len() < 4 {
        return None;
    }

    let (mut ia, mut ic, mut best) = (0, 0, 0.0);
    for i in 0..hull.len() {
        for j in i + 1..hull.len() {
            let d = (hull[i] - hull[j]).norm_squared();
            if d > best {
                (ia, ic, best) = (i, j, d);
            }
        }
    }
    let (a, c) = (hull[ia], hull[ic]);

    let (mut b, mut d) = (a, a);
    let (mut max_pos, mut max_neg) = (0.0, 0.0);
    for &p in hull {
        let s = cross(a, c, p);
        if s > max_pos {
            max_pos = s;
            b = p;
        }
        if s < max_neg {
            max_neg = s;
            d = p;
        }
    }
    if max_pos <= 1e-9 || max_neg >= -1e-9 {
        return None;
    }

    let mut quad = [a, b, c, d];
    if polygon_area(&quad) < 0.0 {
        quad = [a, d, c, b];
    }

    for k in 0..4 {
        if (quad[k] - quad[(k + 1) % 4]).norm() < min_side {
            return None;
        }
    }
    let quad_area = polygon_area(&quad);
    let hull_area = polygon_area(hull).abs();
    if hull_area <= 0.0 || (1.0 - quad_area / hull_area).abs() > 0.1 {
        return None;
    }
    Some(quad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hull_of_square_grid_is_four_corners() {
        let mut pts = Vec::new();
        for y in 0..5 {
            for x in 0..5 {
                pts.push(Point2::new(x as f64, y as f64));
            }
        }
        let hull = convex_hull(pts);
        assert_eq!(hull.len(), 4);
    }

    #[test]
    fn fitted_quad_is_clockwise_in_image_coordinates() {
        let hull = convex_hull(vec![
            Point2::new(10.0, 10.0),
            Point2::new(40.0, 12.0),
            Point2::new(42.0, 44.0),
            Point2::new(8.0, 40.0),
            Point2::new(25.0, 25.0),
        ]);
        let quad = fit_quad(&hull, 5.0).expect("quad");
        assert!(polygon_area(&quad) > 0.0);
    }

    #[test]
    fn solid_square_component_becomes_quad() {
        let (w, h) = (30, 30);
        let mut mask = vec![false; w * h];
        for y in 5..20 {
            for x in 8..23 {
                mask[y * w + x] = true;
            }
        }
        let quads = find_quads(
            &mask,
            w,
            h,
            CandidateParams {
                min_side_px: 8.0,
                max_side_px: 30.0,
            },
        );
        assert_eq!(quads.len(), 1);
        let xs: Vec<f64> = quads[0].iter().map(|p| p.x).collect();
        assert!(xs.contains(&7.5) && xs.contains(&22.5));
    }
}
