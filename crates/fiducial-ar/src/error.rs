use std::path::PathBuf;

use fiducial_ar_aruco::DictionaryError;
use fiducial_ar_core::{BoardGeometryError, ToolkitError};

use crate::{ConfigError, FrameSourceError, SinkError};

/// Session-fatal calibration and calibration-artifact errors.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("only {captured} valid captures, {required} required")]
    InsufficientCaptures { captured: usize, required: usize },

    #[error("no board observations were captured")]
    NoObservations,

    #[error("calibration file {path} not found")]
    NotFound { path: PathBuf },

    #[error("calibration file {path} is missing {}", missing.join(" and "))]
    Incomplete {
        path: PathBuf,
        missing: Vec<&'static str>,
    },

    #[error("calibration solver failed: {0}")]
    Solver(#[from] ToolkitError),

    #[error("calibration file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("calibration file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl CalibrationError {
    /// What the operator should do about it.
    pub fn guidance(&self) -> &'static str {
        match self {
            CalibrationError::InsufficientCaptures { .. } => {
                "Calibration was unsuccessful: not enough boards were detected in the video. \
                 Perform a better capture or reduce the number of captures required."
            }
            CalibrationError::NoObservations => {
                "Calibration was unsuccessful: no boards were detected in the video. \
                 Make sure the printed board matches the configured board and dictionary."
            }
            CalibrationError::NotFound { .. } => {
                "Calibrate the camera first with `fiducial-ar calibrate`."
            }
            CalibrationError::Incomplete { .. } => {
                "Remove the calibration file and recalibrate with `fiducial-ar calibrate`."
            }
            CalibrationError::Solver(_) => {
                "Capture the board from more varied angles and distances, then retry."
            }
            CalibrationError::Io { .. } | CalibrationError::Json { .. } => {
                "Check the calibration file path and permissions, or recalibrate."
            }
        }
    }
}

/// Anything that stops a session before or during its loop.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Board(#[from] BoardGeometryError),
    #[error(transparent)]
    Dictionary(#[from] DictionaryError),
    #[error(transparent)]
    Source(#[from] FrameSourceError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
