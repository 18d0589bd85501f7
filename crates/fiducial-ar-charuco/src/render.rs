use fiducial_ar_aruco::{draw_marker, Dictionary};
use fiducial_ar_core::{BoardGeometry, BoardKind, GrayImage};

/// Rasterize a board at `px_per_square` pixels per square with a white
/// margin of `margin_px` on every side.
///
/// Returns `None` if the dictionary does not match the board or the markers
/// would be smaller than one pixel per bit.
pub fn render_board(
    board: &BoardGeometry,
    dict: &Dictionary,
    px_per_square: usize,
    margin_px: usize,
) -> Option<GrayImage> {
    if dict.id != board.dictionary() || board.marker_count() > dict.codes.len() {
        return None;
    }
    let spec = board.spec();
    let (cols, rows) = (spec.cols as usize, spec.rows as usize);
    let cells = dict.marker_size + 2;
    let marker_px = px_per_square as f64 * board.marker_length() / board.square_length();
    let cell_px = (marker_px / cells as f64).round() as usize;
    if cell_px == 0 || cell_px * cells > px_per_square {
        return None;
    }
    let offset = (px_per_square - cell_px * cells) / 2;

    let mut img = GrayImage::filled(
        cols * px_per_square + 2 * margin_px,
        rows * px_per_square + 2 * margin_px,
        255,
    );

    if board.kind() == BoardKind::Charuco {
        for sy in 0..rows {
            for sx in 0..cols {
                if (sx + sy) % 2 != 0 {
                    continue;
                }
                let x0 = margin_px + sx * px_per_square;
                let y0 = margin_px + sy * px_per_square;
                for y in y0..y0 + px_per_square {
                    for x in x0..x0 + px_per_square {
                        img.set(x, y, 0);
                    }
                }
            }
        }
    }

    for id in 0..board.marker_count() as u32 {
        let (sx, sy) = board.marker_cell(id)?;
        let x0 = margin_px + sx as usize * px_per_square + offset;
        let y0 = margin_px + sy as usize * px_per_square + offset;
        if !draw_marker(&mut img, dict, id, x0, y0, cell_px) {
            return None;
        }
    }
    Some(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiducial_ar_core::{BoardSpec, DictionaryId};

    fn dict() -> Dictionary {
        let codes = (0..50u64).map(|i| i * 7919 % (1 << 25)).collect();
        Dictionary::new(DictionaryId::Dict5x5_50, 2, codes).expect("dictionary")
    }

    #[test]
    fn charuco_layout_has_black_top_left_square() {
        let board = BoardGeometry::new(BoardSpec::default()).expect("board");
        let img = render_board(&board, &dict(), 140, 20).expect("render");
        assert_eq!((img.width, img.height), (5 * 140 + 40, 7 * 140 + 40));

        let v = img.view();
        assert_eq!(v.get(5, 5), 255);
        assert_eq!(v.get(25, 25), 0);
        // White square (1, 0): its marker starts 35 px in, black border first.
        assert_eq!(v.get(20 + 140 + 10, 20 + 10), 255);
        assert_eq!(v.get(20 + 140 + 36, 20 + 36), 0);
    }

    #[test]
    fn mismatched_dictionary_is_rejected() {
        let board = BoardGeometry::new(BoardSpec {
            dictionary: DictionaryId::Dict4x4_50,
            ..BoardSpec::default()
        })
        .expect("board");
        assert!(render_board(&board, &dict(), 140, 0).is_none());
    }
}
