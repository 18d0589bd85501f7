//! Core types and utilities for fiducial marker calibration and pose overlay.
//!
//! This crate is intentionally small and purely geometric. It holds the data
//! model shared by the toolkit crates and the session facade, the camera
//! math (projection, distortion, axis-angle poses) and the
//! [`VisionToolkit`] seam. It does *not* implement marker detection or
//! calibration itself.

mod board;
mod calibration;
mod camera;
mod detection;
mod homography;
mod image;
mod logger;
mod toolkit;

pub use board::{BoardGeometry, BoardGeometryError, BoardKind, BoardSpec, DictionaryId};
pub use calibration::CalibrationResult;
pub use camera::{CameraIntrinsics, Distortion};
pub use detection::{BoardCornerSet, ImageSize, MarkerDetection, PoseEstimate, Quad, RefinedDetection};
pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::{sample_bilinear, sample_gradient, GrayImage, GrayImageView};
pub use toolkit::{ProjectionError, ToolkitError, VisionToolkit};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
