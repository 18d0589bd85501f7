use serde::{Deserialize, Serialize};

use crate::{CameraIntrinsics, ImageSize};

/// Output of a planar intrinsic calibration.
///
/// `rotation_vectors`/`translation_vectors` hold one board pose per
/// observation, in observation order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub camera_matrix: [[f64; 3]; 3],
    /// `[k1, k2, p1, p2, k3]`.
    pub distortion_coefficients: [f64; 5],
    pub rotation_vectors: Vec<[f64; 3]>,
    pub translation_vectors: Vec<[f64; 3]>,
    pub image_size: ImageSize,
    /// Pixels.
    pub rms_reprojection_error: f64,
}

impl CalibrationResult {
    pub fn intrinsics(&self) -> CameraIntrinsics {
        CameraIntrinsics::from_arrays(self.camera_matrix, self.distortion_coefficients)
    }
}
