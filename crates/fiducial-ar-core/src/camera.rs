//! Pinhole camera with Brown-Conrady distortion.

use nalgebra::{Matrix3, Point2, Point3, Rotation3};
use serde::{Deserialize, Serialize};

use crate::{PoseEstimate, ProjectionError};

/// Brown-Conrady coefficients in OpenCV order `[k1, k2, p1, p2, k3]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub fn from_array(c: [f64; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    /// Apply distortion to a normalized image point.
    pub fn distort(&self, n: Point2<f64>) -> Point2<f64> {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        Point2::new(x * radial + dx, y * radial + dy)
    }

    /// Invert [`Distortion::distort`] by fixed-point iteration.
    pub fn undistort(&self, d: Point2<f64>) -> Point2<f64> {
        let mut x = d.x;
        let mut y = d.y;
        for _ in 0..20 {
            let r2 = x * x + y * y;
            let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
            let dx = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
            if radial.abs() < 1e-12 {
                break;
            }
            x = (d.x - dx) / radial;
            y = (d.y - dy) / radial;
        }
        Point2::new(x, y)
    }
}

/// Camera matrix plus distortion, as used for pose estimation and projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraIntrinsics {
    pub matrix: Matrix3<f64>,
    pub distortion: Distortion,
}

impl CameraIntrinsics {
    pub fn new(matrix: Matrix3<f64>, distortion: Distortion) -> Self {
        Self { matrix, distortion }
    }

    pub fn from_arrays(matrix: [[f64; 3]; 3], distortion: [f64; 5]) -> Self {
        let m = Matrix3::from_fn(|r, c| matrix[r][c]);
        Self::new(m, Distortion::from_array(distortion))
    }

    /// Ideal pinhole camera with principal point `(cx, cy)`.
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self::new(
            Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0),
            Distortion::default(),
        )
    }

    fn check(&self) -> Result<(), ProjectionError> {
        let m = &self.matrix;
        if !m.iter().all(|v| v.is_finite()) || m[(0, 0)].abs() < 1e-12 || m[(1, 1)].abs() < 1e-12
        {
            return Err(ProjectionError::DegenerateIntrinsics);
        }
        Ok(())
    }

    /// Pixel to undistorted normalized coordinates.
    pub fn normalize(&self, px: Point2<f64>) -> Result<Point2<f64>, ProjectionError> {
        self.check()?;
        let m = &self.matrix;
        let y = (px.y - m[(1, 2)]) / m[(1, 1)];
        let x = (px.x - m[(0, 2)] - m[(0, 1)] * y) / m[(0, 0)];
        Ok(self.distortion.undistort(Point2::new(x, y)))
    }

    /// Normalized (undistorted) coordinates to pixels.
    pub fn denormalize(&self, n: Point2<f64>) -> Point2<f64> {
        let d = self.distortion.distort(n);
        let m = &self.matrix;
        Point2::new(
            m[(0, 0)] * d.x + m[(0, 1)] * d.y + m[(0, 2)],
            m[(1, 1)] * d.y + m[(1, 2)],
        )
    }

    /// Project a camera-frame point; `index` labels the error.
    pub fn project_camera_point(
        &self,
        p: Point3<f64>,
        index: usize,
    ) -> Result<Point2<f64>, ProjectionError> {
        if p.z <= 1e-9 {
            return Err(ProjectionError::BehindCamera { index });
        }
        let px = self.denormalize(Point2::new(p.x / p.z, p.y / p.z));
        if !px.x.is_finite() || !px.y.is_finite() {
            return Err(ProjectionError::NonFinite { index });
        }
        Ok(px)
    }

    /// Project object points through a marker pose.
    pub fn project_points(
        &self,
        object: &[Point3<f64>],
        pose: &PoseEstimate,
    ) -> Result<Vec<Point2<f64>>, ProjectionError> {
        self.check()?;
        let r = Rotation3::from_scaled_axis(pose.rotation_vector);
        object
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let pc = r * *p + pose.translation_vector;
                self.project_camera_point(pc, i)
            })
            .collect()
    }
}
