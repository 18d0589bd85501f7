//! Calibration capture accumulation.

use fiducial_ar_core::{BoardCornerSet, BoardGeometry, ImageSize, MarkerDetection, VisionToolkit};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::Frame;

/// Board corners a capture needs *more than* to be accepted.
pub const DEFAULT_MIN_CORNERS: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Stored as observation number `index` (0-based).
    Accepted { index: usize },
    /// Markers were found but too few board corners.
    Rejected { corner_count: usize },
    /// No markers at all.
    Skipped,
}

/// Outcome of one [`CalibrationAccumulator::offer`] plus the detections
/// behind it, for drawing.
#[derive(Clone, Debug)]
pub struct CaptureReport {
    pub outcome: CaptureOutcome,
    pub markers: MarkerDetection,
    pub corners: BoardCornerSet,
}

/// Board observations collected over a calibration session.
///
/// Every stored observation has more than `min_corners` corners, and the
/// image size is taken from the first accepted frame only.
#[derive(Clone, Debug)]
pub struct CalibrationAccumulator {
    board: BoardGeometry,
    min_corners: usize,
    observed: Vec<BoardCornerSet>,
    image_size: Option<ImageSize>,
}

impl CalibrationAccumulator {
    pub fn new(board: BoardGeometry, min_corners: usize) -> Self {
        Self {
            board,
            min_corners,
            observed: Vec::new(),
            image_size: None,
        }
    }

    /// Detect the board in `frame` and keep the observation if it carries
    /// enough corners.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(captured = self.observed.len()))
    )]
    pub fn offer<T: VisionToolkit + ?Sized>(&mut self, toolkit: &T, frame: &Frame) -> CaptureReport {
        let gray = frame.to_gray();
        let view = gray.view();
        let markers = toolkit.detect_markers(&view, self.board.dictionary());
        if markers.is_empty() {
            log::debug!("no markers, frame skipped");
            return CaptureReport {
                outcome: CaptureOutcome::Skipped,
                markers,
                corners: BoardCornerSet::default(),
            };
        }

        let corners = toolkit.interpolate_board_corners(&markers, &view, &self.board);
        let corner_count = corners.count();
        if corner_count <= self.min_corners {
            log::debug!(
                "{} markers, {corner_count} corners (need > {}), frame rejected",
                markers.len(),
                self.min_corners
            );
            return CaptureReport {
                outcome: CaptureOutcome::Rejected { corner_count },
                markers,
                corners,
            };
        }

        let index = self.observed.len();
        self.observed.push(corners.clone());
        if self.image_size.is_none() {
            self.image_size = Some(frame.size());
        }
        log::debug!("capture {index} accepted with {corner_count} corners");
        CaptureReport {
            outcome: CaptureOutcome::Accepted { index },
            markers,
            corners,
        }
    }

    #[inline]
    pub fn valid_capture_count(&self) -> usize {
        self.observed.len()
    }

    #[inline]
    pub fn observed(&self) -> &[BoardCornerSet] {
        &self.observed
    }

    #[inline]
    pub fn image_size(&self) -> Option<ImageSize> {
        self.image_size
    }

    #[inline]
    pub fn board(&self) -> &BoardGeometry {
        &self.board
    }

    #[inline]
    pub fn min_corners(&self) -> usize {
        self.min_corners
    }
}
