use fiducial_ar_aruco::{detect_markers, render_marker, DetectorParams, Dictionary, Matcher};
use fiducial_ar_core::{sample_bilinear, GrayImage, Homography};
use nalgebra::{Matrix3, Point2};

fn dictionary() -> Dictionary {
    let path = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../testdata/DICT_5X5_50_CODES.json"
    );
    Dictionary::load(path).expect("load test dictionary")
}

fn matcher(dict: &Dictionary) -> Matcher {
    Matcher::new(dict, dict.max_correction_bits)
}

fn assert_near(p: Point2<f32>, x: f32, y: f32, tol: f32) {
    let d = ((p.x - x).powi(2) + (p.y - y).powi(2)).sqrt();
    assert!(d <= tol, "corner {p:?} is {d} px from ({x}, {y})");
}

fn rotate_cw(img: &GrayImage) -> GrayImage {
    let mut out = GrayImage::filled(img.height, img.width, 255);
    for y in 0..img.height {
        for x in 0..img.width {
            out.set(img.height - 1 - y, x, img.view().get(x, y));
        }
    }
    out
}

/// Inverse-map `src` through `dst_from_src` into a `w x h` canvas.
fn warp(src: &GrayImage, dst_from_src: &Homography, w: usize, h: usize) -> GrayImage {
    let inv = dst_from_src.inverse().expect("invertible");
    let mut out = GrayImage::filled(w, h, 255);
    for y in 0..h {
        for x in 0..w {
            let p = inv.apply(Point2::new(x as f64, y as f64));
            if p.x >= 0.0 && p.y >= 0.0 && p.x < src.width as f64 - 1.0 && p.y < src.height as f64 - 1.0 {
                let v = sample_bilinear(&src.view(), p.x as f32, p.y as f32);
                out.set(x, y, v.round().clamp(0.0, 255.0) as u8);
            }
        }
    }
    out
}

#[test]
fn detects_axis_aligned_marker_with_exact_corners() {
    let dict = dictionary();
    let img = render_marker(&dict, 7, 10, 30).expect("render");
    let det = detect_markers(&img.view(), &matcher(&dict), &DetectorParams::default());

    assert_eq!(det.ids, vec![7]);
    let c = det.corners[0];
    assert_near(c[0], 29.5, 29.5, 0.01);
    assert_near(c[1], 99.5, 29.5, 0.01);
    assert_near(c[2], 99.5, 99.5, 0.01);
    assert_near(c[3], 29.5, 99.5, 0.01);
}

#[test]
fn corner_order_follows_marker_rotation() {
    let dict = dictionary();
    let img = rotate_cw(&render_marker(&dict, 3, 10, 30).expect("render"));
    let det = detect_markers(&img.view(), &matcher(&dict), &DetectorParams::default());

    assert_eq!(det.ids, vec![3]);
    let side = img.width as f32;
    // The marker's top-left corner now sits at the image's top-right.
    assert_near(det.corners[0][0], side - 30.5, 29.5, 0.01);
    assert_near(det.corners[0][1], side - 30.5, 99.5, 0.01);
}

#[test]
fn detects_marker_under_perspective() {
    let dict = dictionary();
    let src = render_marker(&dict, 21, 12, 40).expect("render");
    let h = Homography::new(Matrix3::new(
        0.9, 0.15, 60.0, //
        -0.1, 1.0, 50.0, //
        0.0004, 0.0002, 1.0,
    ));
    let img = warp(&src, &h, 320, 280);
    let det = detect_markers(&img.view(), &matcher(&dict), &DetectorParams::default());

    assert_eq!(det.ids, vec![21]);
    let edge = 40.0 - 0.5;
    let far = 40.0 + 7.0 * 12.0 - 0.5;
    let expected = [(edge, edge), (far, edge), (far, far), (edge, far)];
    for (k, (x, y)) in expected.into_iter().enumerate() {
        let e = h.apply(Point2::new(x, y));
        assert_near(det.corners[0][k], e.x as f32, e.y as f32, 2.0);
    }
}

#[test]
fn blank_and_solid_images_have_no_markers() {
    let dict = dictionary();
    let m = matcher(&dict);
    let blank = GrayImage::filled(120, 120, 255);
    assert!(detect_markers(&blank.view(), &m, &DetectorParams::default()).is_empty());

    let mut solid = GrayImage::filled(120, 120, 255);
    for y in 30..90 {
        for x in 30..90 {
            solid.set(x, y, 0);
        }
    }
    let det = detect_markers(&solid.view(), &m, &DetectorParams::default());
    assert!(det.is_empty());
}

#[test]
fn unknown_code_becomes_rejected_candidate() {
    let dict = dictionary();
    let img = render_marker(&dict, 0, 10, 30).expect("render");
    // A matcher for a dictionary that only knows a different code.
    let other = Dictionary::new(dict.id, 0, vec![dict.codes[1]]).expect("dict");
    let det = detect_markers(&img.view(), &Matcher::new(&other, 0), &DetectorParams::default());
    assert!(det.is_empty());
    assert_eq!(det.rejected.len(), 1);
}
