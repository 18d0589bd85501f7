//! Planar intrinsic calibration from board-corner observations.
//!
//! Linear seed: per-view homographies, closed-form intrinsics (Zhang) with a
//! principal-point-at-center fallback, planar pose per view, and a linear
//! radial distortion fit, alternated a few times.
//!
//! The best linear solution then seeds a joint Levenberg-Marquardt
//! refinement of `fx, fy, cx, cy, k1, k2, p1, p2, k3` and every view pose.
//! The refined solution is kept only if it lowers the reprojection RMS.

use fiducial_ar_core::{
    estimate_homography, BoardCornerSet, BoardGeometry, CalibrationResult, CameraIntrinsics,
    Distortion, ImageSize, PoseEstimate, ToolkitError,
};
use nalgebra::{DMatrix, Matrix2, Matrix3, Point2, Point3, Rotation3, SVector, Vector2, Vector3};

use crate::bundle::{self, FixedParams};
use crate::pose::pose_from_homography;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Copy, Debug)]
pub struct CalibrationOptions {
    /// Estimate distortion. The linear seed only fits `k1`, `k2`; refinement
    /// adds `p1`, `p2`, `k3`.
    pub fit_distortion: bool,
    /// Undistort / re-estimate rounds of the linear seed.
    pub distortion_iterations: usize,
    /// Run the nonlinear refinement after the linear seed.
    pub refine: bool,
    /// Levenberg-Marquardt iteration cap.
    pub max_iterations: usize,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            fit_distortion: true,
            distortion_iterations: 5,
            refine: true,
            max_iterations: 100,
        }
    }
}

struct View {
    object: Vec<Point2<f64>>,
    pixels: Vec<Point2<f64>>,
}

struct Solution {
    k: Matrix3<f64>,
    distortion: Distortion,
    poses: Vec<(Rotation3<f64>, Vector3<f64>)>,
    rms: f64,
}

/// Calibrate a camera from several views of a planar board.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(observations, board), fields(views = observations.len()))
)]
pub fn calibrate_planar(
    observations: &[BoardCornerSet],
    board: &BoardGeometry,
    image_size: ImageSize,
    opts: CalibrationOptions,
) -> Result<CalibrationResult, ToolkitError> {
    if observations.is_empty() {
        return Err(ToolkitError::NoUsableViews);
    }
    if image_size.width == 0 || image_size.height == 0 {
        return Err(ToolkitError::Degenerate("image size is zero".into()));
    }

    let mut views = Vec::with_capacity(observations.len());
    for (i, obs) in observations.iter().enumerate() {
        let mut view = View {
            object: Vec::with_capacity(obs.count()),
            pixels: Vec::with_capacity(obs.count()),
        };
        for (&id, p) in obs.ids.iter().zip(&obs.corners) {
            if let Some(o) = board.corner_object_point(id) {
                view.object.push(o);
                view.pixels.push(Point2::new(p.x as f64, p.y as f64));
            }
        }
        if view.object.len() < 4 {
            return Err(ToolkitError::Degenerate(format!(
                "view {i} has only {} board corners",
                view.object.len()
            )));
        }
        views.push(view);
    }

    let mut best = solve_linear(&views, image_size, Distortion::default())?;
    log::debug!("linear intrinsics, rms {:.4} px", best.rms);

    if opts.fit_distortion {
        let mut current = best.distortion;
        for round in 0..opts.distortion_iterations {
            let Some(last) = solve_linear(&views, image_size, current).ok() else {
                break;
            };
            let Some(fitted) = fit_radial_distortion(&views, &last.k, &last.poses) else {
                break;
            };
            current = fitted;
            let Ok(next) = solve_linear(&views, image_size, current) else {
                break;
            };
            log::debug!(
                "distortion round {round}: k1 {:.5} k2 {:.5}, rms {:.4} px",
                current.k1,
                current.k2,
                next.rms
            );
            if next.rms < best.rms {
                best = next;
            }
        }
    }

    if opts.refine {
        best = refine_solution(&views, best, opts);
    }

    let k = best.k;
    Ok(CalibrationResult {
        camera_matrix: [
            [k[(0, 0)], k[(0, 1)], k[(0, 2)]],
            [k[(1, 0)], k[(1, 1)], k[(1, 2)]],
            [k[(2, 0)], k[(2, 1)], k[(2, 2)]],
        ],
        distortion_coefficients: best.distortion.to_array(),
        rotation_vectors: best.poses.iter().map(|(r, _)| r.scaled_axis().into()).collect(),
        translation_vectors: best.poses.iter().map(|(_, t)| (*t).into()).collect(),
        image_size,
        rms_reprojection_error: best.rms,
    })
}

/// Joint refinement seeded by `seed`; falls back to the seed if the
/// optimizer fails or does not improve the RMS.
fn refine_solution(views: &[View], seed: Solution, opts: CalibrationOptions) -> Solution {
    // Fewer than three views cannot separate the principal point or the
    // higher-order terms from the poses.
    let fixed = FixedParams {
        principal_point: views.len() < 3,
        higher_order: views.len() < 3,
        distortion: !opts.fit_distortion,
    };
    let pairs: Vec<(&[Point2<f64>], &[Point2<f64>])> = views
        .iter()
        .map(|v| (v.object.as_slice(), v.pixels.as_slice()))
        .collect();

    let Some(refined) = bundle::refine(
        &pairs,
        &seed.k,
        seed.distortion,
        &seed.poses,
        fixed,
        opts.max_iterations,
    ) else {
        log::debug!("refinement produced no solution; keeping linear seed");
        return seed;
    };

    let rms = reprojection_rms(views, &refined.k, refined.distortion, &refined.poses);
    log::debug!("refined rms {rms:.4} px (linear {:.4} px)", seed.rms);
    if rms.is_finite() && rms < seed.rms {
        Solution {
            k: refined.k,
            distortion: refined.distortion,
            poses: refined.poses,
            rms,
        }
    } else {
        seed
    }
}

/// Intrinsics and poses for fixed distortion, plus the resulting RMS.
fn solve_linear(
    views: &[View],
    size: ImageSize,
    distortion: Distortion,
) -> Result<Solution, ToolkitError> {
    // Distortion is removed using the previous focal estimate, so the first
    // pass always runs on raw pixels.
    let undistort = |k: &Matrix3<f64>, p: Point2<f64>| -> Point2<f64> {
        if distortion == Distortion::default() {
            return p;
        }
        let cam = CameraIntrinsics::new(*k, distortion);
        match cam.normalize(p) {
            Ok(n) => {
                let v = k * Vector3::new(n.x, n.y, 1.0);
                Point2::new(v.x / v.z, v.y / v.z)
            }
            Err(_) => p,
        }
    };

    let raw_homographies = homographies(views, |p| p)?;
    let mut k = estimate_intrinsics(&raw_homographies, size)?;
    let homs = if distortion == Distortion::default() {
        raw_homographies
    } else {
        let k0 = k;
        let homs = homographies(views, |p| undistort(&k0, p))?;
        k = estimate_intrinsics(&homs, size)?;
        homs
    };

    let k_inv = k
        .try_inverse()
        .ok_or_else(|| ToolkitError::Degenerate("camera matrix is singular".into()))?;
    let poses = homs
        .iter()
        .enumerate()
        .map(|(i, h)| {
            pose_from_homography(&k_inv, h)
                .ok_or_else(|| ToolkitError::Degenerate(format!("no pose for view {i}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let rms = reprojection_rms(views, &k, distortion, &poses);
    if !rms.is_finite() {
        return Err(ToolkitError::Degenerate("reprojection error is not finite".into()));
    }
    Ok(Solution {
        k,
        distortion,
        poses,
        rms,
    })
}

fn homographies(
    views: &[View],
    map: impl Fn(Point2<f64>) -> Point2<f64>,
) -> Result<Vec<Matrix3<f64>>, ToolkitError> {
    views
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let px: Vec<_> = v.pixels.iter().map(|&p| map(p)).collect();
            estimate_homography(&v.object, &px)
                .map(|h| h.h)
                .ok_or_else(|| ToolkitError::Degenerate(format!("no homography for view {i}")))
        })
        .collect()
}

/// Maps pixels to roughly `[-0.5, 0.5]` around the image center.
fn pixel_normalization(size: ImageSize) -> Matrix3<f64> {
    let s = size.width.max(size.height) as f64;
    let cx = 0.5 * size.width as f64;
    let cy = 0.5 * size.height as f64;
    Matrix3::new(1.0 / s, 0.0, -cx / s, 0.0, 1.0 / s, -cy / s, 0.0, 0.0, 1.0)
}

fn estimate_intrinsics(homs: &[Matrix3<f64>], size: ImageSize) -> Result<Matrix3<f64>, ToolkitError> {
    let t = pixel_normalization(size);
    let t_inv = t
        .try_inverse()
        .ok_or_else(|| ToolkitError::Degenerate("image size is zero".into()))?;
    let normalized: Vec<Matrix3<f64>> = homs.iter().map(|h| t * h).collect();

    let plausible = |k: &Matrix3<f64>| {
        k.iter().all(|v| v.is_finite())
            && k[(0, 0)] > 0.0
            && k[(1, 1)] > 0.0
            && (0.0..=size.width as f64).contains(&k[(0, 2)])
            && (0.0..=size.height as f64).contains(&k[(1, 2)])
    };

    if normalized.len() >= 3 {
        if let Some(kn) = zhang_intrinsics(&normalized) {
            let k = t_inv * kn;
            if plausible(&k) {
                return Ok(k);
            }
        }
        log::debug!("closed-form intrinsics degenerate, fixing principal point at center");
    }

    let kn = focal_only_intrinsics(&normalized).ok_or_else(|| {
        ToolkitError::Degenerate("focal length is unobservable from these views".into())
    })?;
    Ok(t_inv * kn)
}

fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> SVector<f64, 6> {
    let hi = h.column(i);
    let hj = h.column(j);
    SVector::<f64, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Zhang's closed form on `>= 3` homographies; skew is dropped.
fn zhang_intrinsics(homs: &[Matrix3<f64>]) -> Option<Matrix3<f64>> {
    let m = homs.len();
    let mut v = DMatrix::<f64>::zeros(2 * m, 6);
    for (k, h) in homs.iter().enumerate() {
        let v11 = v_ij(h, 0, 0);
        let v22 = v_ij(h, 1, 1);
        let v12 = v_ij(h, 0, 1);
        v.row_mut(2 * k).copy_from(&v12.transpose());
        v.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }

    let svd = v.svd(false, true);
    let v_t = svd.v_t?;
    let mut b: Vec<f64> = v_t.row(v_t.nrows().checked_sub(1)?).iter().copied().collect();
    if b[0] < 0.0 {
        b.iter_mut().for_each(|x| *x = -*x);
    }
    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    let denom_norm = b11 * b11 + b22 * b22;
    if denom_norm <= 0.0 || denom.abs() / denom_norm < 1e-6 {
        return None;
    }

    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    if lambda / b11 <= 0.0 || lambda * b11 / denom <= 0.0 {
        return None;
    }
    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    Some(Matrix3::new(alpha, 0.0, u0, 0.0, beta, v0, 0.0, 0.0, 1.0))
}

/// Focal lengths only, principal point at the normalized origin.
///
/// With `B = diag(u, v, 1)`, `u = 1/fx^2`, `v = 1/fy^2`, each view gives
/// `h1' B h2 = 0` and `h1' B h1 = h2' B h2`. Falls back to `fx == fy` when
/// the two-parameter solve is ill-posed.
fn focal_only_intrinsics(homs: &[Matrix3<f64>]) -> Option<Matrix3<f64>> {
    let mut rows: Vec<([f64; 2], f64)> = Vec::with_capacity(2 * homs.len());
    for h in homs {
        let a = h.column(0);
        let b = h.column(1);
        rows.push(([a[0] * b[0], a[1] * b[1]], -a[2] * b[2]));
        rows.push((
            [a[0] * a[0] - b[0] * b[0], a[1] * a[1] - b[1] * b[1]],
            -(a[2] * a[2] - b[2] * b[2]),
        ));
    }

    let mut ata = Matrix2::<f64>::zeros();
    let mut atb = Vector2::<f64>::zeros();
    for (r, y) in &rows {
        let r = Vector2::new(r[0], r[1]);
        ata += r * r.transpose();
        atb += r * *y;
    }
    let scale = ata.norm();
    if scale > 0.0 && ata.determinant().abs() > 1e-10 * scale * scale {
        if let Some(sol) = ata.try_inverse().map(|inv| inv * atb) {
            if sol.x > 0.0 && sol.y > 0.0 {
                let (fx, fy) = (1.0 / sol.x.sqrt(), 1.0 / sol.y.sqrt());
                return Some(Matrix3::new(fx, 0.0, 0.0, 0.0, fy, 0.0, 0.0, 0.0, 1.0));
            }
        }
    }

    let (num, den) = rows.iter().fold((0.0, 0.0), |(n, d), (r, y)| {
        let c = r[0] + r[1];
        (n + c * y, d + c * c)
    });
    if den <= 1e-300 {
        return None;
    }
    let u = num / den;
    if !(u > 0.0) {
        return None;
    }
    let f = 1.0 / u.sqrt();
    Some(Matrix3::new(f, 0.0, 0.0, 0.0, f, 0.0, 0.0, 0.0, 1.0))
}

/// Linear least squares for `k1`, `k2` from normalized residuals.
fn fit_radial_distortion(
    views: &[View],
    k: &Matrix3<f64>,
    poses: &[(Rotation3<f64>, Vector3<f64>)],
) -> Option<Distortion> {
    let k_inv = k.try_inverse()?;
    let mut ata = Matrix2::<f64>::zeros();
    let mut atb = Vector2::<f64>::zeros();
    for (view, (r, t)) in views.iter().zip(poses) {
        for (o, px) in view.object.iter().zip(&view.pixels) {
            let pc = r * Point3::new(o.x, o.y, 0.0) + t;
            if pc.z <= 0.0 {
                continue;
            }
            let (x, y) = (pc.x / pc.z, pc.y / pc.z);
            let obs = k_inv * Vector3::new(px.x, px.y, 1.0);
            let (ox, oy) = (obs.x / obs.z, obs.y / obs.z);
            let r2 = x * x + y * y;
            for (c, res) in [(x, ox - x), (y, oy - y)] {
                let row = Vector2::new(c * r2, c * r2 * r2);
                ata += row * row.transpose();
                atb += row * res;
            }
        }
    }
    let sol = ata.try_inverse()? * atb;
    if !sol.x.is_finite() || !sol.y.is_finite() {
        return None;
    }
    Some(Distortion {
        k1: sol.x,
        k2: sol.y,
        ..Distortion::default()
    })
}

fn reprojection_rms(
    views: &[View],
    k: &Matrix3<f64>,
    distortion: Distortion,
    poses: &[(Rotation3<f64>, Vector3<f64>)],
) -> f64 {
    let cam = CameraIntrinsics::new(*k, distortion);
    let mut sum = 0.0;
    let mut n = 0usize;
    for (view, (r, t)) in views.iter().zip(poses) {
        let pose = PoseEstimate {
            rotation_vector: r.scaled_axis(),
            translation_vector: *t,
        };
        let object: Vec<Point3<f64>> = view.object.iter().map(|o| Point3::new(o.x, o.y, 0.0)).collect();
        let Ok(projected) = cam.project_points(&object, &pose) else {
            return f64::INFINITY;
        };
        for (p, q) in projected.iter().zip(&view.pixels) {
            sum += (p - q).norm_squared();
            n += 1;
        }
    }
    (sum / n.max(1) as f64).sqrt()
}
