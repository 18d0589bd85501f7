//! The vision capability consumed by capture sessions and the overlay pipeline.

use nalgebra::{Point2, Point3};

use crate::{
    BoardCornerSet, BoardGeometry, CalibrationResult, CameraIntrinsics, DictionaryId,
    GrayImageView, ImageSize, MarkerDetection, PoseEstimate, Quad, RefinedDetection,
};

/// Failure of a single pose or projection.
///
/// These are per-marker values: callers filter them out and keep going.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("point {index} lies at or behind the camera plane")]
    BehindCamera { index: usize },
    #[error("projection of point {index} is not finite")]
    NonFinite { index: usize },
    #[error("camera intrinsics are degenerate")]
    DegenerateIntrinsics,
    #[error("marker quad is degenerate")]
    DegenerateQuad,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ToolkitError {
    #[error("no calibration view has enough board corners")]
    NoUsableViews,
    #[error("calibration is numerically degenerate: {0}")]
    Degenerate(String),
}

/// Marker detection, board-corner interpolation, calibration and pose.
///
/// All calls are single-attempt. Detection-side calls never fail: an image
/// without markers yields empty results.
pub trait VisionToolkit {
    fn detect_markers(&self, gray: &GrayImageView<'_>, dictionary: DictionaryId)
        -> MarkerDetection;

    fn interpolate_board_corners(
        &self,
        markers: &MarkerDetection,
        gray: &GrayImageView<'_>,
        board: &BoardGeometry,
    ) -> BoardCornerSet;

    /// Drop markers that do not belong to `board` and recover missing ones
    /// from `markers.rejected`.
    fn refine_detection(
        &self,
        gray: &GrayImageView<'_>,
        board: &BoardGeometry,
        markers: MarkerDetection,
    ) -> RefinedDetection;

    fn calibrate(
        &self,
        observations: &[BoardCornerSet],
        board: &BoardGeometry,
        image_size: ImageSize,
    ) -> Result<CalibrationResult, ToolkitError>;

    /// One result per quad, in input order.
    fn estimate_poses(
        &self,
        corners: &[Quad],
        marker_length: f64,
        camera: &CameraIntrinsics,
    ) -> Vec<Result<PoseEstimate, ProjectionError>>;

    fn project_points(
        &self,
        object_points: &[Point3<f64>],
        pose: &PoseEstimate,
        camera: &CameraIntrinsics,
    ) -> Result<Vec<Point2<f64>>, ProjectionError>;
}
