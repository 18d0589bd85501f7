use fiducial_ar_core::{homography_from_4pt, CameraIntrinsics, PoseEstimate, ProjectionError, Quad};
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};

/// Plane pose from `H ~ K [r1 r2 t]`, with `k_inv = K^-1`.
///
/// The scale sign is chosen so the plane lies in front of the camera, and
/// the rotation is projected onto SO(3).
pub(crate) fn pose_from_homography(
    k_inv: &Matrix3<f64>,
    h: &Matrix3<f64>,
) -> Option<(Rotation3<f64>, Vector3<f64>)> {
    let h1 = k_inv * h.column(0);
    let h2 = k_inv * h.column(1);
    let h3 = k_inv * h.column(2);

    let norm = 0.5 * (h1.norm() + h2.norm());
    if norm < 1e-12 {
        return None;
    }
    let lambda = if h3.z < 0.0 { -1.0 / norm } else { 1.0 / norm };

    let r1 = h1 * lambda;
    let r2 = h2 * lambda;
    let r3 = r1.cross(&r2);
    let m = Matrix3::from_columns(&[r1, r2, r3]);

    let svd = m.svd(true, true);
    let (mut u, v_t) = (svd.u?, svd.v_t?);
    if (u * v_t).determinant() < 0.0 {
        u.column_mut(2).neg_mut();
    }
    let r = u * v_t;
    let t = h3 * lambda;
    if !r.iter().chain(t.iter()).all(|v| v.is_finite()) {
        return None;
    }
    Some((Rotation3::from_matrix_unchecked(r), t))
}

/// Marker corners in the marker frame, TL, TR, BR, BL: centered, x right,
/// y up, z towards the camera.
pub fn marker_object_points(marker_length: f64) -> [Point3<f64>; 4] {
    let s = 0.5 * marker_length;
    [
        Point3::new(-s, s, 0.0),
        Point3::new(s, s, 0.0),
        Point3::new(s, -s, 0.0),
        Point3::new(-s, -s, 0.0),
    ]
}

/// Pose of one square marker from its four image corners.
pub fn estimate_marker_pose(
    quad: &Quad,
    marker_length: f64,
    camera: &CameraIntrinsics,
) -> Result<PoseEstimate, ProjectionError> {
    if !marker_length.is_finite() || marker_length <= 0.0 {
        return Err(ProjectionError::DegenerateQuad);
    }

    let mut normalized = [Point2::origin(); 4];
    for (n, p) in normalized.iter_mut().zip(quad) {
        *n = camera.normalize(Point2::new(p.x as f64, p.y as f64))?;
    }
    let object = marker_object_points(marker_length).map(|p| Point2::new(p.x, p.y));

    let h = homography_from_4pt(&object, &normalized).ok_or(ProjectionError::DegenerateQuad)?;
    let (r, t) =
        pose_from_homography(&Matrix3::identity(), &h.h).ok_or(ProjectionError::DegenerateQuad)?;
    if t.z <= 0.0 {
        return Err(ProjectionError::DegenerateQuad);
    }

    Ok(PoseEstimate {
        rotation_vector: r.scaled_axis(),
        translation_vector: t,
    })
}
