use fiducial_ar_core::{sample_gradient, GrayImageView};
use nalgebra::{Matrix2, Point2, Vector2};

/// Gradient-based saddle/corner refinement.
///
/// Solves `sum(g g^T) q = sum(g g^T p)` over a `(2 * half + 1)^2` pixel
/// window around the current estimate, where `g` is the intensity gradient
/// at pixel `p`. Edge pixels constrain the corner to lie on their edge line.
/// Returns `None` if the system is singular or the estimate leaves the
/// starting window.
pub fn corner_subpix(
    gray: &GrayImageView<'_>,
    start: Point2<f64>,
    half: i32,
    max_iters: usize,
    epsilon: f64,
) -> Option<Point2<f64>> {
    let (w, h) = (gray.width as i32, gray.height as i32);
    let mut q = start;
    for _ in 0..max_iters {
        let cx = q.x.round() as i32;
        let cy = q.y.round() as i32;
        let mut a = Matrix2::<f64>::zeros();
        let mut b = Vector2::<f64>::zeros();
        for y in (cy - half)..=(cy + half) {
            if y < 1 || y >= h - 1 {
                continue;
            }
            for x in (cx - half)..=(cx + half) {
                if x < 1 || x >= w - 1 {
                    continue;
                }
                let (gx, gy) = sample_gradient(gray, x as f32, y as f32);
                let g = Vector2::new(gx as f64, gy as f64);
                let ggt = g * g.transpose();
                a += ggt;
                b += ggt * Vector2::new(x as f64, y as f64);
            }
        }

        let next = a.try_inverse().map(|inv| inv * b)?;
        let next = Point2::new(next.x, next.y);
        if !next.x.is_finite() || !next.y.is_finite() {
            return None;
        }
        let shift = (next - q).norm();
        q = next;
        if shift < epsilon {
            break;
        }
    }

    if (q - start).norm() > half as f64 {
        return None;
    }
    Some(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiducial_ar_core::GrayImage;

    fn checker_corner(cx: usize, cy: usize, size: usize) -> GrayImage {
        let mut img = GrayImage::filled(size, size, 255);
        for y in 0..size {
            for x in 0..size {
                if (x < cx) == (y < cy) {
                    img.set(x, y, 0);
                }
            }
        }
        img
    }

    #[test]
    fn converges_to_pixel_edge_intersection() {
        let img = checker_corner(30, 28, 60);
        let q = corner_subpix(&img.view(), Point2::new(31.7, 26.4), 6, 20, 1e-3).expect("refine");
        assert!((q.x - 29.5).abs() < 0.05, "x = {}", q.x);
        assert!((q.y - 27.5).abs() < 0.05, "y = {}", q.y);
    }

    #[test]
    fn flat_region_is_singular() {
        let img = GrayImage::filled(40, 40, 128);
        assert!(corner_subpix(&img.view(), Point2::new(20.0, 20.0), 5, 10, 1e-3).is_none());
    }
}
