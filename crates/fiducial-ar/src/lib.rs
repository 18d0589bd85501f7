//! Camera calibration capture and live marker pose overlay.
//!
//! This crate holds the stateful parts of the system: the calibration
//! [`CalibrationAccumulator`], the [`solve`] adapter, the JSON
//! [`CalibrationStore`], the per-frame [`PoseOverlayPipeline`] and the two
//! session loops. Vision work goes through the
//! [`VisionToolkit`](fiducial_ar_core::VisionToolkit) trait;
//! [`NativeToolkit`](fiducial_ar_charuco::NativeToolkit) is the bundled
//! implementation.
//!
//! ## Quickstart
//!
//! ```no_run
//! use fiducial_ar::{
//!     CalibrationAccumulator, CalibrationSession, CalibrationStore, ImageSequence, NullSink,
//!     PacingPolicy, SessionConfig,
//! };
//! use fiducial_ar_charuco::NativeToolkit;
//!
//! let cfg = SessionConfig::default();
//! let board = cfg.calibration_board().unwrap();
//! let toolkit =
//!     NativeToolkit::load(&cfg.dictionary_dir, &[board.dictionary()], cfg.detector.clone())
//!         .unwrap();
//!
//! let accumulator = CalibrationAccumulator::new(board, cfg.min_corners);
//! let mut session =
//!     CalibrationSession::new(accumulator, CalibrationStore::new(&cfg.calibration_path), 25);
//! let mut frames = ImageSequence::open("capture/").unwrap();
//! let result = session
//!     .run(&toolkit, &mut frames, &mut NullSink, &mut PacingPolicy::AutoContinue)
//!     .unwrap();
//! println!("rms {:.3} px", result.rms_reprojection_error);
//! ```

mod accumulator;
mod config;
mod draw;
mod error;
mod frame;
mod overlay;
mod pacing;
mod pipeline;
mod session;
mod sink;
mod solver;
mod source;
mod store;

pub use accumulator::{CalibrationAccumulator, CaptureOutcome, CaptureReport, DEFAULT_MIN_CORNERS};
pub use config::{ConfigError, SessionConfig};
pub use draw::{draw_board_corners, draw_box, draw_line, draw_marker_outlines, draw_polygon};
pub use error::{CalibrationError, SessionError};
pub use frame::{ColorSpace, Frame, FrameError, Rgb};
pub use overlay::{OverlayTemplate, RenderMode};
pub use pacing::{spawn_stdin_listener, Pace, PacingPolicy};
pub use pipeline::{CompositedFrame, PoseOverlayPipeline};
pub use session::{CalibrationSession, CalibrationState, CaptureStats, PoseSession, PoseState};
pub use sink::{DirectorySink, FrameSink, NullSink, SinkError};
pub use solver::{solve, solve_accumulated};
pub use source::{FrameReplay, FrameSource, FrameSourceError, ImageSequence};
pub use store::{CalibrationStore, StoredCalibration, DEFAULT_CALIBRATION_FILE};

pub use fiducial_ar_aruco as aruco;
pub use fiducial_ar_charuco as charuco;
pub use fiducial_ar_core as core;
