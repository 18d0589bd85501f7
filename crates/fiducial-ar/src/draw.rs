//! Raster drawing of detections and overlays onto frames.

use fiducial_ar_core::{BoardCornerSet, MarkerDetection};
use nalgebra::Point2;

use crate::{Frame, Rgb};

/// Thick line segment, clipped to the frame. Non-finite endpoints draw nothing.
pub fn draw_line(frame: &mut Frame, a: Point2<f64>, b: Point2<f64>, color: Rgb, thickness: u32) {
    let pad = thickness as f64;
    let bounds = (
        -pad,
        -pad,
        frame.width() as f64 - 1.0 + pad,
        frame.height() as f64 - 1.0 + pad,
    );
    let Some((a, b)) = clip_segment(a, b, bounds) else {
        return;
    };

    let r = (thickness.max(1) as i64 - 1) / 2;
    let (mut x0, mut y0) = (a.x.round() as i64, a.y.round() as i64);
    let (x1, y1) = (b.x.round() as i64, b.y.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        stamp(frame, x0, y0, r, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Closed polygon outline.
pub fn draw_polygon(frame: &mut Frame, points: &[Point2<f64>], color: Rgb, thickness: u32) {
    for (i, &p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        draw_line(frame, p, q, color, thickness);
    }
}

/// Axis-aligned square outline of half-size `r` around `c`.
pub fn draw_box(frame: &mut Frame, c: Point2<f64>, r: f64, color: Rgb) {
    let pts = [
        Point2::new(c.x - r, c.y - r),
        Point2::new(c.x + r, c.y - r),
        Point2::new(c.x + r, c.y + r),
        Point2::new(c.x - r, c.y + r),
    ];
    draw_polygon(frame, &pts, color, 1);
}

/// Marker outlines, with a small box on each marker's first (top-left) corner.
pub fn draw_marker_outlines(frame: &mut Frame, markers: &MarkerDetection, color: Rgb) {
    for (_, quad) in markers.iter() {
        let pts = quad.map(|p| Point2::new(p.x as f64, p.y as f64));
        draw_polygon(frame, &pts, color, 1);
        draw_box(frame, pts[0], 3.0, color);
    }
}

/// Small boxes on interpolated board corners.
pub fn draw_board_corners(frame: &mut Frame, corners: &BoardCornerSet, color: Rgb) {
    for p in &corners.corners {
        draw_box(frame, Point2::new(p.x as f64, p.y as f64), 3.0, color);
    }
}

#[inline]
fn stamp(frame: &mut Frame, x: i64, y: i64, r: i64, color: Rgb) {
    for yy in y - r..=y + r {
        for xx in x - r..=x + r {
            frame.set_pixel(xx, yy, color);
        }
    }
}

/// Liang-Barsky clip of segment `a-b` to `(xmin, ymin, xmax, ymax)`.
fn clip_segment(
    a: Point2<f64>,
    b: Point2<f64>,
    (xmin, ymin, xmax, ymax): (f64, f64, f64, f64),
) -> Option<(Point2<f64>, Point2<f64>)> {
    if ![a.x, a.y, b.x, b.y].iter().all(|v| v.is_finite()) {
        return None;
    }
    let d = b - a;
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (p, q) in [
        (-d.x, a.x - xmin),
        (d.x, xmax - a.x),
        (-d.y, a.y - ymin),
        (d.y, ymax - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((a + d * t0, a + d * t1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColorSpace;

    #[test]
    fn horizontal_line_covers_its_pixels() {
        let mut f = Frame::filled(10, 5, ColorSpace::Rgb8, Rgb::BLACK);
        draw_line(&mut f, Point2::new(1.0, 2.0), Point2::new(8.0, 2.0), Rgb::GREEN, 1);
        assert!((1..=8).all(|x| f.pixel(x, 2) == Some(Rgb::GREEN)));
        assert_eq!(f.pixel(0, 2), Some(Rgb::BLACK));
        assert_eq!(f.pixel(4, 1), Some(Rgb::BLACK));
    }

    #[test]
    fn far_away_segments_are_clipped() {
        let mut f = Frame::filled(20, 20, ColorSpace::Gray8, Rgb::BLACK);
        draw_line(&mut f, Point2::new(-1e12, 10.0), Point2::new(1e12, 10.0), Rgb::WHITE, 1);
        assert_eq!(f.pixel(0, 10), Some(Rgb::WHITE));
        assert_eq!(f.pixel(19, 10), Some(Rgb::WHITE));

        let before = f.clone();
        draw_line(&mut f, Point2::new(100.0, 100.0), Point2::new(200.0, 50.0), Rgb::WHITE, 3);
        draw_line(&mut f, Point2::new(f64::NAN, 1.0), Point2::new(5.0, 5.0), Rgb::WHITE, 1);
        assert_eq!(f, before);
    }

    #[test]
    fn thick_line_is_wider() {
        let mut f = Frame::filled(10, 10, ColorSpace::Gray8, Rgb::BLACK);
        draw_line(&mut f, Point2::new(2.0, 5.0), Point2::new(7.0, 5.0), Rgb::WHITE, 3);
        assert_eq!(f.pixel(4, 4), Some(Rgb::WHITE));
        assert_eq!(f.pixel(4, 6), Some(Rgb::WHITE));
        assert_eq!(f.pixel(4, 7), Some(Rgb::BLACK));
    }
}
