mod common;

use approx::assert_relative_eq;
use common::{board, corner_set, fake_calibration, FakeToolkit};
use fiducial_ar::core::{ImageSize, ToolkitError};
use fiducial_ar::{solve, CalibrationError, CalibrationStore, StoredCalibration};

#[test]
fn empty_observations_fail_without_calling_solver() {
    let tk = FakeToolkit::new();
    let size = Some(ImageSize::new(640, 480));

    // The minimum is checked first, so an empty set only reads as "no boards"
    // when no captures were required.
    let err = solve(&tk, &[], size, &board(), 0).unwrap_err();
    assert!(matches!(err, CalibrationError::NoObservations), "{err:?}");
    for min in [1, 5] {
        let err = solve(&tk, &[], size, &board(), min).unwrap_err();
        assert!(
            matches!(
                err,
                CalibrationError::InsufficientCaptures { captured: 0, required } if required == min
            ),
            "{err:?}"
        );
    }
    let err = solve(&tk, &[corner_set(24)], None, &board(), 1).unwrap_err();
    assert!(matches!(err, CalibrationError::NoObservations));
    assert_eq!(tk.calibrate_calls.get(), 0);
}

#[test]
fn too_few_captures_never_reach_solver() {
    let tk = FakeToolkit::new();
    let observed = vec![corner_set(24), corner_set(30)];
    let err = solve(&tk, &observed, Some(ImageSize::new(640, 480)), &board(), 5).unwrap_err();
    match err {
        CalibrationError::InsufficientCaptures { captured, required } => {
            assert_eq!((captured, required), (2, 5));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(tk.calibrate_calls.get(), 0);
}

#[test]
fn solver_is_called_once_and_failures_are_wrapped() {
    let size = ImageSize::new(640, 480);
    let observed = vec![corner_set(24); 3];

    let tk = FakeToolkit::new();
    let res = solve(&tk, &observed, Some(size), &board(), 3).expect("solve");
    assert_eq!(tk.calibrate_calls.get(), 1);
    assert_eq!(res.image_size, size);

    let tk = FakeToolkit::new().with_calibration(Err(ToolkitError::NoUsableViews));
    let err = solve(&tk, &observed, Some(size), &board(), 3).unwrap_err();
    assert!(matches!(
        err,
        CalibrationError::Solver(ToolkitError::NoUsableViews)
    ));
    assert_eq!(tk.calibrate_calls.get(), 1);
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CalibrationStore::new(dir.path().join("nested").join("cam.json"));
    let result = fake_calibration(ImageSize::new(1920, 1080));

    store.save(&result).expect("save");
    let loaded = store.load().expect("load");

    assert_eq!(loaded.camera_matrix, result.camera_matrix);
    assert_eq!(loaded.distortion_coefficients, result.distortion_coefficients);
    assert_eq!(loaded.image_size, result.image_size);
    assert_relative_eq!(loaded.rms_reprojection_error, result.rms_reprojection_error);
    assert_eq!(loaded, result);
}

#[test]
fn missing_distortion_is_incomplete_with_or_without_matrix() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("cam.json");
    let store = CalibrationStore::new(&path);

    std::fs::write(
        &path,
        r#"{ "camera_matrix": [[800.0, 0.0, 320.0], [0.0, 800.0, 240.0], [0.0, 0.0, 1.0]] }"#,
    )
    .expect("write");
    match store.load().unwrap_err() {
        CalibrationError::Incomplete { missing, .. } => {
            assert_eq!(missing, vec!["distortion_coefficients"]);
        }
        other => panic!("unexpected {other:?}"),
    }

    std::fs::write(&path, r#"{ "image_size": { "width": 640, "height": 480 } }"#).expect("write");
    match store.load().unwrap_err() {
        CalibrationError::Incomplete { missing, .. } => {
            assert_eq!(missing, vec!["camera_matrix", "distortion_coefficients"]);
        }
        other => panic!("unexpected {other:?}"),
    }

    std::fs::write(
        &path,
        r#"{ "camera_matrix": null, "distortion_coefficients": [0.0, 0.0, 0.0, 0.0, 0.0] }"#,
    )
    .expect("write");
    assert!(matches!(
        store.load().unwrap_err(),
        CalibrationError::Incomplete { .. }
    ));
}

#[test]
fn missing_and_malformed_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.json");
    let err = CalibrationStore::new(&path).load().unwrap_err();
    assert!(matches!(err, CalibrationError::NotFound { .. }));
    assert!(err.guidance().contains("fiducial-ar calibrate"));

    std::fs::write(&path, "{ not json").expect("write");
    assert!(matches!(
        CalibrationStore::new(&path).load().unwrap_err(),
        CalibrationError::Json { .. }
    ));
}

#[test]
fn save_replaces_previous_file_and_leaves_no_temporaries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("cam.json");
    let store = CalibrationStore::new(&path);

    store.save(&fake_calibration(ImageSize::new(640, 480))).expect("first save");
    let mut second = fake_calibration(ImageSize::new(800, 600));
    second.camera_matrix[0][0] = 1000.0;
    store.save(&second).expect("second save");

    let raw = std::fs::read_to_string(&path).expect("read");
    let stored: StoredCalibration = serde_json::from_str(&raw).expect("parse");
    assert_eq!(stored.camera_matrix.map(|k| k[0][0]), Some(1000.0));
    assert_eq!(store.load().expect("load"), second);

    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read_dir")
        .map(|e| e.expect("entry").file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("cam.json")]);
}
