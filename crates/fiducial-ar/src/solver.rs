//! Single-attempt calibration solve over accumulated observations.

use fiducial_ar_core::{BoardCornerSet, BoardGeometry, CalibrationResult, ImageSize, VisionToolkit};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{CalibrationAccumulator, CalibrationError};

/// Validate the capture set and invoke the toolkit solver once.
///
/// Fewer than `min_captures` observations is `InsufficientCaptures`; an
/// empty set that passes the minimum (or a missing image size) is
/// `NoObservations`. In both cases the solver is not called.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(toolkit, observed, board), fields(captures = observed.len()))
)]
pub fn solve<T: VisionToolkit + ?Sized>(
    toolkit: &T,
    observed: &[BoardCornerSet],
    image_size: Option<ImageSize>,
    board: &BoardGeometry,
    min_captures: usize,
) -> Result<CalibrationResult, CalibrationError> {
    if observed.len() < min_captures {
        return Err(CalibrationError::InsufficientCaptures {
            captured: observed.len(),
            required: min_captures,
        });
    }
    let Some(image_size) = image_size.filter(|_| !observed.is_empty()) else {
        return Err(CalibrationError::NoObservations);
    };

    log::info!(
        "calibrating from {} captures at {}x{}",
        observed.len(),
        image_size.width,
        image_size.height
    );
    let result = toolkit.calibrate(observed, board, image_size)?;
    log::info!(
        "calibration done, reprojection RMS {:.4} px",
        result.rms_reprojection_error
    );
    Ok(result)
}

/// [`solve`] over everything an accumulator has collected.
pub fn solve_accumulated<T: VisionToolkit + ?Sized>(
    toolkit: &T,
    accumulator: &CalibrationAccumulator,
    min_captures: usize,
) -> Result<CalibrationResult, CalibrationError> {
    solve(
        toolkit,
        accumulator.observed(),
        accumulator.image_size(),
        accumulator.board(),
        min_captures,
    )
}
