//! The persisted calibration artifact.

use std::io::Write;
use std::path::{Path, PathBuf};

use fiducial_ar_core::{CalibrationResult, ImageSize};
use serde::{Deserialize, Serialize};

use crate::CalibrationError;

pub const DEFAULT_CALIBRATION_FILE: &str = "CameraCalibration.json";

/// On-disk form of a [`CalibrationResult`].
///
/// Intrinsics are optional here so that an incomplete file is reported as
/// such instead of as a parse error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredCalibration {
    #[serde(default)]
    pub camera_matrix: Option<[[f64; 3]; 3]>,
    #[serde(default)]
    pub distortion_coefficients: Option<[f64; 5]>,
    #[serde(default)]
    pub rotation_vectors: Vec<[f64; 3]>,
    #[serde(default)]
    pub translation_vectors: Vec<[f64; 3]>,
    #[serde(default)]
    pub image_size: Option<ImageSize>,
    #[serde(default)]
    pub rms_reprojection_error: Option<f64>,
}

impl From<&CalibrationResult> for StoredCalibration {
    fn from(r: &CalibrationResult) -> Self {
        Self {
            camera_matrix: Some(r.camera_matrix),
            distortion_coefficients: Some(r.distortion_coefficients),
            rotation_vectors: r.rotation_vectors.clone(),
            translation_vectors: r.translation_vectors.clone(),
            image_size: Some(r.image_size),
            rms_reprojection_error: Some(r.rms_reprojection_error),
        }
    }
}

/// Saves and loads one calibration JSON file.
#[derive(Clone, Debug)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new(DEFAULT_CALIBRATION_FILE)
    }
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file atomically: write a temporary file next to it, then
    /// rename it over the target.
    pub fn save(&self, result: &CalibrationResult) -> Result<(), CalibrationError> {
        let io_err = |source| CalibrationError::Io {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        let json = serde_json::to_string_pretty(&StoredCalibration::from(result)).map_err(
            |source| CalibrationError::Json {
                path: self.path.clone(),
                source,
            },
        )?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        log::info!("calibration written to {}", self.path.display());
        Ok(())
    }

    pub fn load(&self) -> Result<CalibrationResult, CalibrationError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                CalibrationError::NotFound {
                    path: self.path.clone(),
                }
            } else {
                CalibrationError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        let stored: StoredCalibration =
            serde_json::from_str(&raw).map_err(|source| CalibrationError::Json {
                path: self.path.clone(),
                source,
            })?;

        let (camera_matrix, distortion_coefficients) =
            match (stored.camera_matrix, stored.distortion_coefficients) {
                (Some(k), Some(d)) => (k, d),
                (k, d) => {
                    let mut missing = Vec::new();
                    if k.is_none() {
                        missing.push("camera_matrix");
                    }
                    if d.is_none() {
                        missing.push("distortion_coefficients");
                    }
                    return Err(CalibrationError::Incomplete {
                        path: self.path.clone(),
                        missing,
                    });
                }
            };

        Ok(CalibrationResult {
            camera_matrix,
            distortion_coefficients,
            rotation_vectors: stored.rotation_vectors,
            translation_vectors: stored.translation_vectors,
            image_size: stored.image_size.unwrap_or(ImageSize::new(0, 0)),
            rms_reprojection_error: stored.rms_reprojection_error.unwrap_or(0.0),
        })
    }
}
