//! JSON session configuration.

use std::fs;
use std::path::{Path, PathBuf};

use fiducial_ar_aruco::DetectorParams;
use fiducial_ar_core::{BoardGeometry, BoardGeometryError, BoardSpec};
use serde::{Deserialize, Serialize};

use crate::accumulator::DEFAULT_MIN_CORNERS;
use crate::store::DEFAULT_CALIBRATION_FILE;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Settings shared by the calibration and pose sessions. Every field has a
/// default, so a config file only needs the values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Calibration board.
    pub board: BoardSpec,
    /// Directory holding `<NAME>_CODES.json` dictionary files.
    pub dictionary_dir: PathBuf,
    pub calibration_path: PathBuf,
    /// A capture needs more than this many board corners.
    pub min_corners: usize,
    /// Accepted captures are shown with their larger side at most this long.
    pub display_max_side: u32,
    /// Board the pose session refines detections against.
    pub pose_board: BoardSpec,
    /// Physical marker side used for pose estimation.
    pub marker_length: f64,
    pub axis_length: f64,
    pub poll_timeout_ms: u64,
    pub detector: DetectorParams,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let pose_board = BoardSpec::single_marker();
        Self {
            board: BoardSpec::default(),
            dictionary_dir: PathBuf::from("dictionaries"),
            calibration_path: PathBuf::from(DEFAULT_CALIBRATION_FILE),
            min_corners: DEFAULT_MIN_CORNERS,
            display_max_side: 1000,
            marker_length: pose_board.marker_length,
            axis_length: pose_board.marker_length,
            pose_board,
            poll_timeout_ms: 1,
            detector: DetectorParams::default(),
        }
    }
}

impl SessionConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn calibration_board(&self) -> Result<BoardGeometry, BoardGeometryError> {
        BoardGeometry::new(self.board)
    }

    pub fn pose_board(&self) -> Result<BoardGeometry, BoardGeometryError> {
        BoardGeometry::new(self.pose_board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiducial_ar_core::{BoardKind, DictionaryId};

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: SessionConfig =
            serde_json::from_str(r#"{ "min_corners": 12, "board": { "rows": 5, "cols": 4,
                "square_length": 0.03, "marker_length": 0.02, "dictionary": "DICT_4X4_50" } }"#)
                .expect("parse");
        assert_eq!(cfg.min_corners, 12);
        assert_eq!(cfg.board.kind, BoardKind::Charuco);
        assert_eq!(cfg.board.dictionary, DictionaryId::Dict4x4_50);
        assert_eq!(cfg.display_max_side, 1000);
        assert_eq!(cfg.pose_board, BoardSpec::single_marker());
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        let mut cfg = SessionConfig::default();
        cfg.detector.max_hamming = Some(1);
        cfg.write_json(&path).expect("write");
        assert_eq!(SessionConfig::load_json(&path).expect("load"), cfg);
    }

    #[test]
    fn load_errors_name_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");

        let missing = dir.path().join("absent.json");
        let err = SessionConfig::load_json(&missing).unwrap_err();
        assert!(matches!(&err, ConfigError::Io { path, .. } if path == &missing));
        assert!(err.to_string().contains("absent.json"), "{err}");

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ \"min_corners\": ").expect("write");
        let err = SessionConfig::load_json(&broken).unwrap_err();
        assert!(matches!(&err, ConfigError::Json { path, .. } if path == &broken));
        assert!(err.to_string().contains("broken.json"), "{err}");
    }
}
