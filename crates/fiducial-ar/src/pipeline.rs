//! Per-frame marker pose estimation and overlay compositing.

use fiducial_ar_core::{
    BoardGeometry, CameraIntrinsics, MarkerDetection, PoseEstimate, ProjectionError, VisionToolkit,
};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::draw::draw_marker_outlines;
use crate::overlay::{OverlayTemplate, RenderMode};
use crate::{Frame, Rgb};

/// A processed frame and what was found on it.
#[derive(Clone, Debug)]
pub struct CompositedFrame {
    pub frame: Frame,
    /// Markers after board refinement.
    pub markers: MarkerDetection,
    pub recovered_ids: Vec<u32>,
    /// Successful poses, by marker id.
    pub poses: Vec<(u32, PoseEstimate)>,
    pub overlays_drawn: usize,
    pub overlays_skipped: usize,
}

/// Detect, refine, estimate and draw, one frame at a time.
#[derive(Clone, Debug)]
pub struct PoseOverlayPipeline {
    board: BoardGeometry,
    camera: CameraIntrinsics,
    marker_length: f64,
    template: OverlayTemplate,
    line_thickness: u32,
}

impl PoseOverlayPipeline {
    pub fn new(
        board: BoardGeometry,
        camera: CameraIntrinsics,
        mode: RenderMode,
        marker_length: f64,
        axis_length: f64,
    ) -> Self {
        Self {
            board,
            camera,
            marker_length,
            template: OverlayTemplate::for_mode(mode, marker_length, axis_length),
            line_thickness: 3,
        }
    }

    pub fn with_line_thickness(mut self, thickness: u32) -> Self {
        self.line_thickness = thickness;
        self
    }

    pub fn template(&self) -> &OverlayTemplate {
        &self.template
    }

    /// Process one frame. Never fails: a marker whose pose or projection
    /// fails simply gets no overlay, and a frame without markers comes back
    /// untouched.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(width = frame.width(), height = frame.height()))
    )]
    pub fn process<T: VisionToolkit + ?Sized>(&self, toolkit: &T, mut frame: Frame) -> CompositedFrame {
        let gray = frame.to_gray();
        let view = gray.view();
        let detected = toolkit.detect_markers(&view, self.board.dictionary());
        let refined = toolkit.refine_detection(&view, &self.board, detected);
        let markers = refined.markers;

        if markers.is_empty() {
            return CompositedFrame {
                frame,
                markers,
                recovered_ids: refined.recovered_ids,
                poses: Vec::new(),
                overlays_drawn: 0,
                overlays_skipped: 0,
            };
        }

        draw_marker_outlines(&mut frame, &markers, Rgb::RED);

        let estimates = toolkit.estimate_poses(&markers.corners, self.marker_length, &self.camera);
        let projected: Vec<(u32, Result<(PoseEstimate, Vec<Point2<f64>>), ProjectionError>)> =
            markers
                .ids
                .iter()
                .zip(estimates)
                .map(|(&id, pose)| {
                    let res = pose.and_then(|p| {
                        toolkit
                            .project_points(&self.template.points, &p, &self.camera)
                            .map(|pts| (p, pts))
                    });
                    (id, res)
                })
                .collect();

        let mut poses = Vec::with_capacity(projected.len());
        let mut skipped = 0;
        for (id, res) in projected {
            match res {
                Ok((pose, pts)) => {
                    self.template.draw(&mut frame, &pts, self.line_thickness);
                    poses.push((id, pose));
                }
                Err(err) => {
                    log::debug!("marker {id}: overlay skipped ({err})");
                    skipped += 1;
                }
            }
        }

        CompositedFrame {
            frame,
            overlays_drawn: poses.len(),
            overlays_skipped: skipped,
            markers,
            recovered_ids: refined.recovered_ids,
            poses,
        }
    }
}
