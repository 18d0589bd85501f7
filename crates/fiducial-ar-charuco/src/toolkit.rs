use std::collections::HashMap;
use std::path::Path;

use fiducial_ar_aruco::{detect_markers, DetectorParams, Dictionary, DictionaryError, DictionarySet, Matcher};
use fiducial_ar_core::{
    BoardCornerSet, BoardGeometry, CalibrationResult, CameraIntrinsics, DictionaryId,
    GrayImageView, ImageSize, MarkerDetection, PoseEstimate, ProjectionError, Quad,
    RefinedDetection, ToolkitError, VisionToolkit,
};
use nalgebra::{Point2, Point3};

use crate::{
    calibrate_planar, estimate_marker_pose, interpolate_corners, refine_detection,
    CalibrationOptions, InterpolationParams, RefineParams,
};

/// [`VisionToolkit`] backed by the detectors and solvers in this workspace.
///
/// Holds one prepared [`Matcher`] per loaded dictionary. Requests for a
/// dictionary that was not loaded detect nothing.
#[derive(Clone, Debug)]
pub struct NativeToolkit {
    matchers: HashMap<DictionaryId, Matcher>,
    detector: DetectorParams,
    interpolation: InterpolationParams,
    refine: RefineParams,
    calibration: CalibrationOptions,
}

impl NativeToolkit {
    /// Load `<dir>/<NAME>_CODES.json` for each dictionary in `ids`.
    pub fn load(
        dir: impl AsRef<Path>,
        ids: &[DictionaryId],
        detector: DetectorParams,
    ) -> Result<Self, DictionaryError> {
        let set = DictionarySet::load(dir, ids)?;
        Ok(Self::from_dictionaries(
            ids.iter().filter_map(|&id| set.get(id)),
            detector,
        ))
    }

    pub fn from_dictionaries<'a>(
        dicts: impl IntoIterator<Item = &'a Dictionary>,
        detector: DetectorParams,
    ) -> Self {
        let matchers = dicts
            .into_iter()
            .map(|d| {
                let budget = detector.max_hamming.unwrap_or(d.max_correction_bits);
                (d.id, Matcher::new(d, budget))
            })
            .collect();
        Self {
            matchers,
            detector,
            interpolation: InterpolationParams::default(),
            refine: RefineParams::default(),
            calibration: CalibrationOptions::default(),
        }
    }

    pub fn with_interpolation(mut self, params: InterpolationParams) -> Self {
        self.interpolation = params;
        self
    }

    pub fn with_refine(mut self, params: RefineParams) -> Self {
        self.refine = params;
        self
    }

    pub fn with_calibration(mut self, opts: CalibrationOptions) -> Self {
        self.calibration = opts;
        self
    }

    pub fn has_dictionary(&self, id: DictionaryId) -> bool {
        self.matchers.contains_key(&id)
    }
}

impl VisionToolkit for NativeToolkit {
    fn detect_markers(&self, gray: &GrayImageView<'_>, dictionary: DictionaryId) -> MarkerDetection {
        match self.matchers.get(&dictionary) {
            Some(matcher) => detect_markers(gray, matcher, &self.detector),
            None => {
                log::warn!("dictionary {} is not loaded", dictionary.name());
                MarkerDetection::default()
            }
        }
    }

    fn interpolate_board_corners(
        &self,
        markers: &MarkerDetection,
        gray: &GrayImageView<'_>,
        board: &BoardGeometry,
    ) -> BoardCornerSet {
        interpolate_corners(markers, gray, board, &self.interpolation)
    }

    fn refine_detection(
        &self,
        gray: &GrayImageView<'_>,
        board: &BoardGeometry,
        markers: MarkerDetection,
    ) -> RefinedDetection {
        refine_detection(gray, board, markers, &self.refine)
    }

    fn calibrate(
        &self,
        observations: &[BoardCornerSet],
        board: &BoardGeometry,
        image_size: ImageSize,
    ) -> Result<CalibrationResult, ToolkitError> {
        calibrate_planar(observations, board, image_size, self.calibration)
    }

    fn estimate_poses(
        &self,
        corners: &[Quad],
        marker_length: f64,
        camera: &CameraIntrinsics,
    ) -> Vec<Result<PoseEstimate, ProjectionError>> {
        corners
            .iter()
            .map(|quad| estimate_marker_pose(quad, marker_length, camera))
            .collect()
    }

    fn project_points(
        &self,
        object_points: &[Point3<f64>],
        pose: &PoseEstimate,
        camera: &CameraIntrinsics,
    ) -> Result<Vec<Point2<f64>>, ProjectionError> {
        camera.project_points(object_points, pose)
    }
}
