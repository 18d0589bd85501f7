//! Marker rasterization, for printing boards and for synthetic test images.

use fiducial_ar_core::GrayImage;

use crate::Dictionary;

/// Paint marker `id` into `img` with its top-left at `(x0, y0)`; each bit
/// cell is `cell_px` pixels. The one-cell black border is included.
///
/// Returns `false` if `id` is not in the dictionary.
pub fn draw_marker(
    img: &mut GrayImage,
    dict: &Dictionary,
    id: u32,
    x0: usize,
    y0: usize,
    cell_px: usize,
) -> bool {
    let Some(code) = dict.code(id) else {
        return false;
    };
    let n = dict.marker_size;
    let cells = n + 2;
    for gy in 0..cells {
        for gx in 0..cells {
            let border = gx == 0 || gy == 0 || gx + 1 == cells || gy + 1 == cells;
            let black = border || (code >> ((gy - 1) * n + (gx - 1))) & 1 == 1;
            let v = if black { 0 } else { 255 };
            for y in 0..cell_px {
                for x in 0..cell_px {
                    img.set(x0 + gx * cell_px + x, y0 + gy * cell_px + y, v);
                }
            }
        }
    }
    true
}

/// Render marker `id` on a white quiet zone of `margin_px` pixels.
pub fn render_marker(
    dict: &Dictionary,
    id: u32,
    cell_px: usize,
    margin_px: usize,
) -> Option<GrayImage> {
    let side = (dict.marker_size + 2) * cell_px + 2 * margin_px;
    let mut img = GrayImage::filled(side, side, 255);
    draw_marker(&mut img, dict, id, margin_px, margin_px, cell_px).then_some(img)
}
