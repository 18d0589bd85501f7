//! Board-level vision: corner interpolation, detection refinement, planar
//! calibration and single-marker pose.
//!
//! [`NativeToolkit`] bundles these with the marker detector from
//! `fiducial-ar-aruco` behind the [`fiducial_ar_core::VisionToolkit`] trait.
//!
//! ## Quickstart
//!
//! ```no_run
//! use fiducial_ar_aruco::DetectorParams;
//! use fiducial_ar_charuco::NativeToolkit;
//! use fiducial_ar_core::{BoardGeometry, BoardSpec, GrayImage, VisionToolkit};
//!
//! let board = BoardGeometry::new(BoardSpec::default()).unwrap();
//! let toolkit =
//!     NativeToolkit::load("dictionaries", &[board.dictionary()], DetectorParams::default())
//!         .unwrap();
//! let img = GrayImage::filled(640, 480, 255);
//! let markers = toolkit.detect_markers(&img.view(), board.dictionary());
//! let corners = toolkit.interpolate_board_corners(&markers, &img.view(), &board);
//! println!("{} corners", corners.count());
//! ```

mod board_fit;
mod bundle;
mod calibrate;
mod interpolate;
mod pose;
mod refine;
mod render;
mod subpix;
mod toolkit;

pub use calibrate::{calibrate_planar, CalibrationOptions};
pub use interpolate::{interpolate_corners, InterpolationParams};
pub use pose::{estimate_marker_pose, marker_object_points};
pub use refine::{refine_detection, RefineParams};
pub use render::render_board;
pub use subpix::corner_subpix;
pub use toolkit::NativeToolkit;
