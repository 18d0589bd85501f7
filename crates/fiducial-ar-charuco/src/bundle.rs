//! Joint Levenberg-Marquardt refinement of intrinsics, distortion and view
//! poses over all board-corner reprojection residuals.
//!
//! Parameter blocks: `cam = [fx, fy, cx, cy, k1, k2, p1, p2, k3]` and one
//! `pose/<i> = [rx, ry, rz, tx, ty, tz]` (axis-angle, board -> camera) per
//! view.

use std::collections::HashMap;

use nalgebra::{Matrix3, Point2, Rotation3, Vector3};
use tiny_solver::factors::na as ts_na;
use tiny_solver::factors::Factor;
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;
use tiny_solver::LevenbergMarquardtOptimizer;

use ts_na::{DVector, RealField};

use fiducial_ar_core::Distortion;

const CAM: &str = "cam";
const CAM_FX: usize = 0;
const CAM_FY: usize = 1;
const CAM_CX: usize = 2;
const CAM_CY: usize = 3;
const CAM_K1: usize = 4;
const CAM_P1: usize = 6;
const CAM_P2: usize = 7;
const CAM_K3: usize = 8;

/// Which camera parameters stay at their seed value.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct FixedParams {
    pub principal_point: bool,
    /// `p1`, `p2`, `k3`.
    pub higher_order: bool,
    /// All five distortion terms.
    pub distortion: bool,
}

pub(crate) struct Refined {
    pub k: Matrix3<f64>,
    pub distortion: Distortion,
    pub poses: Vec<(Rotation3<f64>, Vector3<f64>)>,
}

/// One observed board corner.
#[derive(Debug, Clone)]
struct CornerReprojection {
    object: Point2<f64>,
    pixel: Point2<f64>,
}

impl CornerReprojection {
    fn residual<T: RealField>(&self, cam: &DVector<T>, pose: &DVector<T>) -> DVector<T> {
        let c = |v: f64| -> T { ts_na::convert(v) };

        let rv = ts_na::Vector3::new(pose[0].clone(), pose[1].clone(), pose[2].clone());
        let t = ts_na::Vector3::new(pose[3].clone(), pose[4].clone(), pose[5].clone());
        let pw = ts_na::Vector3::new(c(self.object.x), c(self.object.y), T::zero());
        let pc = rotate(&rv, &pw) + t;

        let x = pc.x.clone() / pc.z.clone();
        let y = pc.y.clone() / pc.z.clone();
        let (fx, fy, cx, cy) = (cam[0].clone(), cam[1].clone(), cam[2].clone(), cam[3].clone());
        let (k1, k2, p1, p2, k3) = (
            cam[4].clone(),
            cam[5].clone(),
            cam[6].clone(),
            cam[7].clone(),
            cam[8].clone(),
        );

        let two = c(2.0);
        let xy = x.clone() * y.clone();
        let xx = x.clone() * x.clone();
        let yy = y.clone() * y.clone();
        let r2 = xx.clone() + yy.clone();
        let radial = T::one() + r2.clone() * (k1 + r2.clone() * (k2 + r2.clone() * k3));
        let xd = x * radial.clone()
            + two.clone() * p1.clone() * xy.clone()
            + p2.clone() * (r2.clone() + two.clone() * xx);
        let yd = y * radial + p1 * (r2 + two.clone() * yy) + two * p2 * xy;

        let u = fx * xd + cx;
        let v = fy * yd + cy;
        DVector::from_vec(vec![u - c(self.pixel.x), v - c(self.pixel.y)])
    }
}

impl<T: RealField> Factor<T> for CornerReprojection {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        self.residual(&params[0], &params[1])
    }
}

/// Rodrigues rotation of `p` by the axis-angle vector `rv`.
fn rotate<T: RealField>(rv: &ts_na::Vector3<T>, p: &ts_na::Vector3<T>) -> ts_na::Vector3<T> {
    let theta2 = rv.norm_squared();
    if theta2 > ts_na::convert(1e-16) {
        let theta = theta2.sqrt();
        let axis = rv / theta.clone();
        let (s, co) = theta.sin_cos();
        let along = axis.dot(p) * (T::one() - co.clone());
        p * co + axis.cross(p) * s + axis * along
    } else {
        p + rv.cross(p)
    }
}

/// Refine a linear seed. `views` holds `(object, pixels)` per view, parallel
/// to `poses`. Returns `None` if the optimizer does not produce a solution.
pub(crate) fn refine(
    views: &[(&[Point2<f64>], &[Point2<f64>])],
    k: &Matrix3<f64>,
    distortion: Distortion,
    poses: &[(Rotation3<f64>, Vector3<f64>)],
    fixed: FixedParams,
    max_iterations: usize,
) -> Option<Refined> {
    let mut problem = Problem::new();
    let mut initial: HashMap<String, DVector<f64>> = HashMap::new();

    let d = distortion;
    initial.insert(
        CAM.to_string(),
        DVector::from_vec(vec![
            k[(0, 0)],
            k[(1, 1)],
            k[(0, 2)],
            k[(1, 2)],
            d.k1,
            d.k2,
            d.p1,
            d.p2,
            d.k3,
        ]),
    );

    let mut fixed_idx = Vec::new();
    if fixed.principal_point {
        fixed_idx.extend([CAM_CX, CAM_CY]);
    }
    if fixed.distortion {
        fixed_idx.extend(CAM_K1..=CAM_K3);
    } else if fixed.higher_order {
        fixed_idx.extend([CAM_P1, CAM_P2, CAM_K3]);
    }
    for idx in fixed_idx {
        problem.fix_variable(CAM, idx);
    }

    for (i, ((object, pixels), (r, t))) in views.iter().zip(poses).enumerate() {
        let key = format!("pose/{i}");
        let rv = r.scaled_axis();
        initial.insert(
            key.clone(),
            DVector::from_vec(vec![rv.x, rv.y, rv.z, t.x, t.y, t.z]),
        );
        for (o, px) in object.iter().zip(pixels.iter()) {
            let factor = CornerReprojection {
                object: *o,
                pixel: *px,
            };
            problem.add_residual_block(2, &[CAM, key.as_str()], Box::new(factor), None);
        }
    }

    let options = OptimizerOptions {
        max_iteration: max_iterations.max(1),
        verbosity_level: 0,
        ..Default::default()
    };
    let solution =
        LevenbergMarquardtOptimizer::default().optimize(&problem, &initial, Some(options))?;

    let cam = solution.get(CAM)?;
    if cam.len() != 9 || cam.iter().any(|v| !v.is_finite()) || cam[CAM_FX] <= 0.0 || cam[CAM_FY] <= 0.0
    {
        return None;
    }
    let refined_poses = (0..views.len())
        .map(|i| {
            let p = solution.get(&format!("pose/{i}"))?;
            (p.len() == 6).then(|| {
                (
                    Rotation3::from_scaled_axis(Vector3::new(p[0], p[1], p[2])),
                    Vector3::new(p[3], p[4], p[5]),
                )
            })
        })
        .collect::<Option<Vec<_>>>()?;

    Some(Refined {
        k: Matrix3::new(cam[0], 0.0, cam[2], 0.0, cam[1], cam[3], 0.0, 0.0, 1.0),
        distortion: Distortion::from_array([cam[4], cam[5], cam[6], cam[7], cam[8]]),
        poses: refined_poses,
    })
}
