mod common;

use common::{board, white_frame, FakeToolkit};
use fiducial_ar::core::ImageSize;
use fiducial_ar::{CalibrationAccumulator, CaptureOutcome, DEFAULT_MIN_CORNERS};

#[test]
fn same_empty_frame_is_skipped_twice_without_state_change() {
    let tk = FakeToolkit::new();
    let mut acc = CalibrationAccumulator::new(board(), DEFAULT_MIN_CORNERS);
    let frame = white_frame(640, 480);

    for _ in 0..2 {
        let report = acc.offer(&tk, &frame);
        assert_eq!(report.outcome, CaptureOutcome::Skipped);
        assert!(report.corners.is_empty());
        assert_eq!(acc.valid_capture_count(), 0);
        assert!(acc.observed().is_empty());
        assert_eq!(acc.image_size(), None);
    }
    assert_eq!(tk.interpolate_calls.get(), 0);
}

#[test]
fn corner_threshold_is_exclusive() {
    let tk = FakeToolkit::with_plan(&[(4, 20), (4, 21)]);
    let mut acc = CalibrationAccumulator::new(board(), 20);
    let frame = white_frame(640, 480);

    assert_eq!(
        acc.offer(&tk, &frame).outcome,
        CaptureOutcome::Rejected { corner_count: 20 }
    );
    assert_eq!(acc.valid_capture_count(), 0);
    assert_eq!(acc.image_size(), None);

    assert_eq!(
        acc.offer(&tk, &frame).outcome,
        CaptureOutcome::Accepted { index: 0 }
    );
    assert_eq!(acc.valid_capture_count(), 1);
}

#[test]
fn count_tracks_observations_for_any_sequence() {
    let plan = [
        (0, 0),
        (3, 24),
        (2, 5),
        (0, 0),
        (6, 30),
        (1, 21),
        (5, 20),
        (6, 22),
    ];
    let tk = FakeToolkit::with_plan(&plan);
    let mut acc = CalibrationAccumulator::new(board(), 20);
    let frame = white_frame(320, 240);

    let mut accepted = 0;
    for &(markers, corners) in &plan {
        let report = acc.offer(&tk, &frame);
        let expected = if markers == 0 {
            CaptureOutcome::Skipped
        } else if corners <= 20 {
            CaptureOutcome::Rejected {
                corner_count: corners,
            }
        } else {
            accepted += 1;
            CaptureOutcome::Accepted {
                index: accepted - 1,
            }
        };
        assert_eq!(report.outcome, expected);
        assert_eq!(acc.valid_capture_count(), acc.observed().len());
        assert_eq!(acc.valid_capture_count(), accepted);
    }
    assert_eq!(accepted, 4);
    assert_eq!(acc.observed()[2].count(), 21);
}

#[test]
fn image_size_comes_from_first_accepted_frame_only() {
    let tk = FakeToolkit::with_plan(&[(3, 5), (3, 25), (3, 25), (3, 25)]);
    let mut acc = CalibrationAccumulator::new(board(), 20);

    // Rejected frames never set the size.
    acc.offer(&tk, &white_frame(100, 80));
    assert_eq!(acc.image_size(), None);

    acc.offer(&tk, &white_frame(640, 480));
    assert_eq!(acc.image_size(), Some(ImageSize::new(640, 480)));

    acc.offer(&tk, &white_frame(1280, 720));
    acc.offer(&tk, &white_frame(32, 32));
    assert_eq!(acc.valid_capture_count(), 3);
    assert_eq!(acc.image_size(), Some(ImageSize::new(640, 480)));
}

#[test]
fn five_frames_three_boards_two_empty() {
    let tk = FakeToolkit::with_plan(&[(6, 24), (0, 0), (5, 21), (0, 0), (6, 30)]);
    let mut acc = CalibrationAccumulator::new(board(), DEFAULT_MIN_CORNERS);
    let frame = white_frame(640, 480);

    let outcomes: Vec<CaptureOutcome> = (0..5).map(|_| acc.offer(&tk, &frame).outcome).collect();

    assert_eq!(acc.valid_capture_count(), 3);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == CaptureOutcome::Skipped)
            .count(),
        2
    );
    assert_eq!(tk.detect_calls.get(), 5);
    assert_eq!(tk.interpolate_calls.get(), 3);
}
