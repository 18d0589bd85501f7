//! Thresholding for candidate search and bit decoding.

use fiducial_ar_core::GrayImageView;

/// Mark pixels darker than their local mean by more than `offset`.
///
/// The mean is taken over a `window x window` box (clipped at the border)
/// using an integral image.
pub(crate) fn adaptive_threshold(img: &GrayImageView<'_>, window: usize, offset: f32) -> Vec<bool> {
    let (w, h) = (img.width, img.height);
    let stride = w + 1;
    let mut integral = vec![0u64; stride * (h + 1)];
    for y in 0..h {
        let mut row = 0u64;
        for x in 0..w {
            row += img.data[y * w + x] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row;
        }
    }

    let r = (window.max(3) / 2) as isize;
    let mut out = vec![false; w * h];
    for y in 0..h {
        let y0 = (y as isize - r).max(0) as usize;
        let y1 = ((y as isize + r + 1) as usize).min(h);
        for x in 0..w {
            let x0 = (x as isize - r).max(0) as usize;
            let x1 = ((x as isize + r + 1) as usize).min(w);
            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let mean = sum as f32 / ((x1 - x0) * (y1 - y0)) as f32;
            out[y * w + x] = (img.data[y * w + x] as f32) < mean - offset;
        }
    }
    out
}

/// Otsu threshold over a set of intensities.
pub(crate) fn otsu_threshold(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 127.5;
    }
    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v.round().clamp(0.0, 255.0) as usize] += 1;
    }

    let total = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127usize;
    for (t, &c) in hist.iter().enumerate() {
        w_b += c as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }
        sum_b += t as f64 * c as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;
        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t;
        }
    }
    // Values <= t form the dark class.
    best_t as f32 + 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiducial_ar_core::GrayImage;

    #[test]
    fn otsu_splits_two_levels() {
        let mut samples = vec![20.0; 10];
        samples.extend(vec![230.0; 12]);
        let t = otsu_threshold(&samples);
        assert!(t > 20.0 && t < 230.0);
    }

    #[test]
    fn adaptive_marks_dark_square_on_white() {
        let mut img = GrayImage::filled(40, 40, 255);
        for y in 10..20 {
            for x in 10..20 {
                img.set(x, y, 0);
            }
        }
        let mask = adaptive_threshold(&img.view(), 15, 7.0);
        assert!(mask[12 * 40 + 12]);
        assert!(!mask[5 * 40 + 5]);
        assert!(!mask[12 * 40 + 25]);
    }
}
