#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use fiducial_ar::core::{
    BoardCornerSet, BoardGeometry, BoardSpec, CalibrationResult, CameraIntrinsics, DictionaryId,
    GrayImageView, ImageSize, MarkerDetection, PoseEstimate, ProjectionError, Quad,
    RefinedDetection, ToolkitError, VisionToolkit,
};
use fiducial_ar::{ColorSpace, Frame, Rgb};
use nalgebra::{Point2, Point3, Vector3};

/// Pixels per meter used by [`FakeToolkit::project_points`].
pub const FAKE_SCALE: f64 = 1000.0;

/// Scripted toolkit: each `detect_markers` call pops the next planned
/// detection, and the following `interpolate_board_corners` call returns the
/// corners planned with it. An exhausted script detects nothing.
pub struct FakeToolkit {
    script: RefCell<VecDeque<(MarkerDetection, BoardCornerSet)>>,
    pending_corners: RefCell<BoardCornerSet>,
    calibration: Result<CalibrationResult, ToolkitError>,
    /// Projection fails for poses whose x translation exceeds this.
    fail_projection_beyond_x: Option<f64>,
    pub detect_calls: Cell<usize>,
    pub interpolate_calls: Cell<usize>,
    pub calibrate_calls: Cell<usize>,
    pub estimate_calls: Cell<usize>,
}

impl FakeToolkit {
    pub fn new() -> Self {
        Self {
            script: RefCell::new(VecDeque::new()),
            pending_corners: RefCell::new(BoardCornerSet::default()),
            calibration: Ok(fake_calibration(ImageSize::new(0, 0))),
            fail_projection_beyond_x: None,
            detect_calls: Cell::new(0),
            interpolate_calls: Cell::new(0),
            calibrate_calls: Cell::new(0),
            estimate_calls: Cell::new(0),
        }
    }

    /// One scripted frame per entry: `(marker count, board corner count)`.
    pub fn with_plan(counts: &[(usize, usize)]) -> Self {
        let tk = Self::new();
        for &(markers, corners) in counts {
            tk.push(markers_in_row(markers), corner_set(corners));
        }
        tk
    }

    pub fn push(&self, markers: MarkerDetection, corners: BoardCornerSet) {
        self.script.borrow_mut().push_back((markers, corners));
    }

    pub fn with_calibration(mut self, res: Result<CalibrationResult, ToolkitError>) -> Self {
        self.calibration = res;
        self
    }

    pub fn failing_projection_beyond_x(mut self, x: f64) -> Self {
        self.fail_projection_beyond_x = Some(x);
        self
    }
}

impl VisionToolkit for FakeToolkit {
    fn detect_markers(&self, _gray: &GrayImageView<'_>, _dictionary: DictionaryId) -> MarkerDetection {
        self.detect_calls.set(self.detect_calls.get() + 1);
        match self.script.borrow_mut().pop_front() {
            Some((markers, corners)) => {
                *self.pending_corners.borrow_mut() = corners;
                markers
            }
            None => {
                *self.pending_corners.borrow_mut() = BoardCornerSet::default();
                MarkerDetection::default()
            }
        }
    }

    fn interpolate_board_corners(
        &self,
        _markers: &MarkerDetection,
        _gray: &GrayImageView<'_>,
        _board: &BoardGeometry,
    ) -> BoardCornerSet {
        self.interpolate_calls.set(self.interpolate_calls.get() + 1);
        self.pending_corners.borrow().clone()
    }

    fn refine_detection(
        &self,
        _gray: &GrayImageView<'_>,
        _board: &BoardGeometry,
        markers: MarkerDetection,
    ) -> RefinedDetection {
        RefinedDetection {
            markers,
            recovered_ids: Vec::new(),
        }
    }

    fn calibrate(
        &self,
        _observations: &[BoardCornerSet],
        _board: &BoardGeometry,
        image_size: ImageSize,
    ) -> Result<CalibrationResult, ToolkitError> {
        self.calibrate_calls.set(self.calibrate_calls.get() + 1);
        self.calibration.clone().map(|mut r| {
            r.image_size = image_size;
            r
        })
    }

    /// Pose translation is the quad centroid in pixels; a zero-area quad
    /// has no pose.
    fn estimate_poses(
        &self,
        corners: &[Quad],
        _marker_length: f64,
        _camera: &CameraIntrinsics,
    ) -> Vec<Result<PoseEstimate, ProjectionError>> {
        self.estimate_calls.set(self.estimate_calls.get() + 1);
        corners
            .iter()
            .map(|q| {
                if q.iter().all(|p| *p == q[0]) {
                    return Err(ProjectionError::DegenerateQuad);
                }
                let cx = q.iter().map(|p| p.x as f64).sum::<f64>() / 4.0;
                let cy = q.iter().map(|p| p.y as f64).sum::<f64>() / 4.0;
                Ok(PoseEstimate {
                    rotation_vector: Vector3::zeros(),
                    translation_vector: Vector3::new(cx, cy, 1.0),
                })
            })
            .collect()
    }

    fn project_points(
        &self,
        object_points: &[Point3<f64>],
        pose: &PoseEstimate,
        _camera: &CameraIntrinsics,
    ) -> Result<Vec<Point2<f64>>, ProjectionError> {
        let t = pose.translation_vector;
        if self.fail_projection_beyond_x.is_some_and(|x| t.x > x) {
            return Err(ProjectionError::BehindCamera { index: 0 });
        }
        Ok(object_points
            .iter()
            .map(|p| Point2::new(t.x + p.x * FAKE_SCALE, t.y - p.y * FAKE_SCALE + p.z * FAKE_SCALE))
            .collect())
    }
}

pub fn white_frame(width: u32, height: u32) -> Frame {
    Frame::filled(width, height, ColorSpace::Rgb8, Rgb::WHITE)
}

pub fn board() -> BoardGeometry {
    BoardGeometry::new(BoardSpec::default()).expect("default board")
}

pub fn single_marker_board() -> BoardGeometry {
    BoardGeometry::new(BoardSpec::single_marker()).expect("single marker board")
}

pub fn square_quad(x: f32, y: f32, side: f32) -> Quad {
    [
        Point2::new(x, y),
        Point2::new(x + side, y),
        Point2::new(x + side, y + side),
        Point2::new(x, y + side),
    ]
}

/// `n` 40 px markers with ids `0..n`, 60 px apart, top edge at y = 40.
pub fn markers_in_row(n: usize) -> MarkerDetection {
    let mut det = MarkerDetection::default();
    for i in 0..n {
        det.push(i as u32, square_quad(40.0 + 60.0 * i as f32, 40.0, 40.0));
    }
    det
}

pub fn corner_set(n: usize) -> BoardCornerSet {
    BoardCornerSet {
        ids: (0..n as u32).collect(),
        corners: (0..n).map(|i| Point2::new(10.0 + i as f32, 20.0)).collect(),
    }
}

pub fn fake_calibration(image_size: ImageSize) -> CalibrationResult {
    CalibrationResult {
        camera_matrix: [[812.5, 0.0, 319.5], [0.0, 808.25, 239.5], [0.0, 0.0, 1.0]],
        distortion_coefficients: [-0.125, 0.0625, 0.001, -0.002, 0.0],
        rotation_vectors: vec![[0.1, -0.2, 0.05]],
        translation_vectors: vec![[0.01, 0.02, 0.6]],
        image_size,
        rms_reprojection_error: 0.375,
    }
}
