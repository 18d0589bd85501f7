//! Calibration and pose session loops.
//!
//! A session owns its mutable state; the toolkit, frame source, sink and
//! pacing policy are passed in. Each loop iteration handles exactly one
//! frame and checks for quit once, after the frame is presented.

use fiducial_ar_core::{BoardGeometry, CalibrationResult, VisionToolkit};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::accumulator::{CalibrationAccumulator, CaptureOutcome};
use crate::draw::{draw_board_corners, draw_marker_outlines};
use crate::overlay::RenderMode;
use crate::pacing::{Pace, PacingPolicy};
use crate::pipeline::PoseOverlayPipeline;
use crate::solver::solve_accumulated;
use crate::store::CalibrationStore;
use crate::{CalibrationError, FrameSink, FrameSource, Rgb};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationState {
    Init,
    Capturing,
    TargetReached,
    StreamExhausted,
    OperatorQuit,
    Solving,
    Calibrated,
    Failed,
}

/// Per-outcome frame counts of a calibration run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub skipped: usize,
}

/// Capture boards until the target is reached, the stream ends or the
/// operator quits; then solve once and persist the result.
#[derive(Debug)]
pub struct CalibrationSession {
    accumulator: CalibrationAccumulator,
    store: CalibrationStore,
    target_captures: usize,
    display_max_side: u32,
    stats: CaptureStats,
    transitions: Vec<CalibrationState>,
}

impl CalibrationSession {
    pub fn new(
        accumulator: CalibrationAccumulator,
        store: CalibrationStore,
        target_captures: usize,
    ) -> Self {
        Self {
            accumulator,
            store,
            target_captures,
            display_max_side: 1000,
            stats: CaptureStats::default(),
            transitions: vec![CalibrationState::Init],
        }
    }

    pub fn with_display_max_side(mut self, max_side: u32) -> Self {
        self.display_max_side = max_side;
        self
    }

    pub fn state(&self) -> CalibrationState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(CalibrationState::Init)
    }

    /// Every state entered so far, starting with `Init`.
    pub fn transitions(&self) -> &[CalibrationState] {
        &self.transitions
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    pub fn accumulator(&self) -> &CalibrationAccumulator {
        &self.accumulator
    }

    fn enter(&mut self, state: CalibrationState) {
        log::info!("calibration: {:?} -> {:?}", self.state(), state);
        self.transitions.push(state);
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(target = self.target_captures))
    )]
    pub fn run<T, S, K>(
        &mut self,
        toolkit: &T,
        source: &mut S,
        sink: &mut K,
        pacing: &mut PacingPolicy,
    ) -> Result<CalibrationResult, CalibrationError>
    where
        T: VisionToolkit + ?Sized,
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        self.enter(CalibrationState::Capturing);
        let stop = loop {
            if self.accumulator.valid_capture_count() >= self.target_captures {
                break CalibrationState::TargetReached;
            }
            let Some(frame) = source.next_frame() else {
                break CalibrationState::StreamExhausted;
            };
            self.stats.frames += 1;

            let report = self.accumulator.offer(toolkit, &frame);
            match report.outcome {
                CaptureOutcome::Skipped => self.stats.skipped += 1,
                CaptureOutcome::Rejected { .. } => self.stats.rejected += 1,
                CaptureOutcome::Accepted { index } => {
                    self.stats.accepted += 1;
                    log::info!(
                        "capture {}/{} accepted ({} corners)",
                        index + 1,
                        self.target_captures,
                        report.corners.count()
                    );

                    let mut shown = frame;
                    draw_marker_outlines(&mut shown, &report.markers, Rgb::GREEN);
                    draw_board_corners(&mut shown, &report.corners, Rgb::RED);
                    let shown = shown.scaled_to_max_side(self.display_max_side);
                    if let Err(err) = sink.present(&shown) {
                        log::warn!("display failed: {err}");
                    }
                    if pacing.pace() == Pace::Quit {
                        break CalibrationState::OperatorQuit;
                    }
                }
            }
        };
        self.enter(stop);
        log::info!(
            "{} valid captures from {} frames ({} rejected, {} without markers)",
            self.stats.accepted,
            self.stats.frames,
            self.stats.rejected,
            self.stats.skipped
        );

        self.enter(CalibrationState::Solving);
        let solved = solve_accumulated(toolkit, &self.accumulator, self.target_captures)
            .and_then(|result| self.store.save(&result).map(|()| result));
        match &solved {
            Ok(_) => self.enter(CalibrationState::Calibrated),
            Err(err) => {
                log::error!("calibration failed: {err}");
                self.enter(CalibrationState::Failed);
            }
        }
        solved
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoseState {
    Init,
    Streaming,
    UserQuit,
    StreamExhausted,
}

/// Live overlay loop over a stream.
#[derive(Debug)]
pub struct PoseSession {
    pipeline: PoseOverlayPipeline,
    frames: usize,
    transitions: Vec<PoseState>,
}

impl PoseSession {
    pub fn new(pipeline: PoseOverlayPipeline) -> Self {
        Self {
            pipeline,
            frames: 0,
            transitions: vec![PoseState::Init],
        }
    }

    /// Load the stored calibration and build the pipeline. A missing or
    /// incomplete calibration fails here, before any frame is read.
    pub fn open(
        store: &CalibrationStore,
        board: BoardGeometry,
        mode: RenderMode,
        marker_length: f64,
        axis_length: f64,
    ) -> Result<Self, CalibrationError> {
        let calibration = store.load()?;
        log::info!(
            "loaded calibration from {} (fx {:.1}, fy {:.1})",
            store.path().display(),
            calibration.camera_matrix[0][0],
            calibration.camera_matrix[1][1]
        );
        Ok(Self::new(PoseOverlayPipeline::new(
            board,
            calibration.intrinsics(),
            mode,
            marker_length,
            axis_length,
        )))
    }

    pub fn state(&self) -> PoseState {
        self.transitions.last().copied().unwrap_or(PoseState::Init)
    }

    pub fn transitions(&self) -> &[PoseState] {
        &self.transitions
    }

    pub fn frames_processed(&self) -> usize {
        self.frames
    }

    fn enter(&mut self, state: PoseState) {
        log::info!("pose: {:?} -> {:?}", self.state(), state);
        self.transitions.push(state);
    }

    /// Run until the stream ends or the operator quits; returns which.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    pub fn run<T, S, K>(
        &mut self,
        toolkit: &T,
        source: &mut S,
        sink: &mut K,
        pacing: &mut PacingPolicy,
    ) -> PoseState
    where
        T: VisionToolkit + ?Sized,
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        self.enter(PoseState::Streaming);
        let stop = loop {
            let Some(frame) = source.next_frame() else {
                break PoseState::StreamExhausted;
            };
            let out = self.pipeline.process(toolkit, frame);
            self.frames += 1;
            log::debug!(
                "frame {}: {} markers, {} overlays, {} skipped",
                self.frames,
                out.markers.len(),
                out.overlays_drawn,
                out.overlays_skipped
            );
            if let Err(err) = sink.present(&out.frame) {
                log::warn!("display failed: {err}");
            }
            if pacing.pace() == Pace::Quit {
                break PoseState::UserQuit;
            }
        };
        self.enter(stop);
        stop
    }
}
