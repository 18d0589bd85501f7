//! Board layouts and the marker dictionaries they are printed with.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Predefined marker vocabularies, named as in OpenCV.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DictionaryId {
    #[serde(rename = "DICT_4X4_50")]
    Dict4x4_50,
    #[serde(rename = "DICT_4X4_100")]
    Dict4x4_100,
    #[serde(rename = "DICT_4X4_250")]
    Dict4x4_250,
    #[serde(rename = "DICT_4X4_1000")]
    Dict4x4_1000,
    #[serde(rename = "DICT_5X5_50")]
    Dict5x5_50,
    #[serde(rename = "DICT_5X5_100")]
    Dict5x5_100,
    #[serde(rename = "DICT_5X5_250")]
    Dict5x5_250,
    #[serde(rename = "DICT_5X5_1000")]
    Dict5x5_1000,
    #[serde(rename = "DICT_6X6_50")]
    Dict6x6_50,
    #[serde(rename = "DICT_6X6_100")]
    Dict6x6_100,
    #[serde(rename = "DICT_6X6_250")]
    Dict6x6_250,
    #[serde(rename = "DICT_6X6_1000")]
    Dict6x6_1000,
    #[serde(rename = "DICT_7X7_50")]
    Dict7x7_50,
    #[serde(rename = "DICT_7X7_100")]
    Dict7x7_100,
    #[serde(rename = "DICT_7X7_250")]
    Dict7x7_250,
    #[serde(rename = "DICT_7X7_1000")]
    Dict7x7_1000,
}

impl DictionaryId {
    pub const ALL: [DictionaryId; 16] = [
        Self::Dict4x4_50,
        Self::Dict4x4_100,
        Self::Dict4x4_250,
        Self::Dict4x4_1000,
        Self::Dict5x5_50,
        Self::Dict5x5_100,
        Self::Dict5x5_250,
        Self::Dict5x5_1000,
        Self::Dict6x6_50,
        Self::Dict6x6_100,
        Self::Dict6x6_250,
        Self::Dict6x6_1000,
        Self::Dict7x7_50,
        Self::Dict7x7_100,
        Self::Dict7x7_250,
        Self::Dict7x7_1000,
    ];

    /// Inner bits per marker side.
    pub fn marker_size(self) -> usize {
        use DictionaryId::*;
        match self {
            Dict4x4_50 | Dict4x4_100 | Dict4x4_250 | Dict4x4_1000 => 4,
            Dict5x5_50 | Dict5x5_100 | Dict5x5_250 | Dict5x5_1000 => 5,
            Dict6x6_50 | Dict6x6_100 | Dict6x6_250 | Dict6x6_1000 => 6,
            Dict7x7_50 | Dict7x7_100 | Dict7x7_250 | Dict7x7_1000 => 7,
        }
    }

    /// Number of distinct marker ids.
    pub fn capacity(self) -> usize {
        use DictionaryId::*;
        match self {
            Dict4x4_50 | Dict5x5_50 | Dict6x6_50 | Dict7x7_50 => 50,
            Dict4x4_100 | Dict5x5_100 | Dict6x6_100 | Dict7x7_100 => 100,
            Dict4x4_250 | Dict5x5_250 | Dict6x6_250 | Dict7x7_250 => 250,
            Dict4x4_1000 | Dict5x5_1000 | Dict6x6_1000 | Dict7x7_1000 => 1000,
        }
    }

    /// OpenCV name, e.g. `DICT_5X5_50`.
    pub fn name(self) -> String {
        format!(
            "DICT_{n}X{n}_{c}",
            n = self.marker_size(),
            c = self.capacity()
        )
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }
}

/// Marker placement scheme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardKind {
    /// Markers on the white squares of a `rows x cols` chessboard whose
    /// top-left square is black; ids row-major over those squares.
    #[default]
    Charuco,
    /// One marker per cell of a `rows x cols` grid with pitch
    /// `square_length`; ids row-major.
    Grid,
}

/// Serializable board description.
///
/// `rows`/`cols` are square (or grid cell) counts, lengths are in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardSpec {
    pub rows: u32,
    pub cols: u32,
    pub square_length: f64,
    pub marker_length: f64,
    pub dictionary: DictionaryId,
    #[serde(default)]
    pub kind: BoardKind,
}

impl Default for BoardSpec {
    fn default() -> Self {
        Self {
            rows: 7,
            cols: 5,
            square_length: 0.04,
            marker_length: 0.02,
            dictionary: DictionaryId::Dict5x5_50,
            kind: BoardKind::Charuco,
        }
    }
}

impl BoardSpec {
    /// Single-marker grid board (90 mm marker, 10 mm separation).
    pub fn single_marker() -> Self {
        Self {
            rows: 1,
            cols: 1,
            square_length: 0.10,
            marker_length: 0.09,
            dictionary: DictionaryId::Dict5x5_50,
            kind: BoardKind::Grid,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BoardGeometryError {
    #[error("board needs at least {min} rows and cols, got {rows}x{cols}")]
    InvalidSize { rows: u32, cols: u32, min: u32 },
    #[error("square_length must be finite and > 0, got {0}")]
    InvalidSquareLength(f64),
    #[error("marker_length must be finite, > 0 and fit inside a square, got {0}")]
    InvalidMarkerLength(f64),
    #[error("board needs {needed} markers, {dictionary} has {available}")]
    NotEnoughMarkers {
        dictionary: String,
        needed: usize,
        available: usize,
    },
}

/// Validated, immutable board geometry.
///
/// Object coordinates lie in the board plane (z = 0) with x to the right,
/// y down and the origin at the board's top-left corner.
#[derive(Clone, Debug, PartialEq)]
pub struct BoardGeometry {
    spec: BoardSpec,
    /// `(sx, sy)` cell of each marker id.
    marker_cells: Vec<(u32, u32)>,
}

impl BoardGeometry {
    pub fn new(spec: BoardSpec) -> Result<Self, BoardGeometryError> {
        let min = match spec.kind {
            BoardKind::Charuco => 2,
            BoardKind::Grid => 1,
        };
        if spec.rows < min || spec.cols < min {
            return Err(BoardGeometryError::InvalidSize {
                rows: spec.rows,
                cols: spec.cols,
                min,
            });
        }
        if !spec.square_length.is_finite() || spec.square_length <= 0.0 {
            return Err(BoardGeometryError::InvalidSquareLength(spec.square_length));
        }
        let fits = match spec.kind {
            BoardKind::Charuco => spec.marker_length < spec.square_length,
            BoardKind::Grid => spec.marker_length <= spec.square_length,
        };
        if !spec.marker_length.is_finite() || spec.marker_length <= 0.0 || !fits {
            return Err(BoardGeometryError::InvalidMarkerLength(spec.marker_length));
        }

        let marker_cells: Vec<(u32, u32)> = match spec.kind {
            BoardKind::Charuco => (0..spec.rows)
                .flat_map(|sy| (0..spec.cols).map(move |sx| (sx, sy)))
                .filter(|(sx, sy)| (sx + sy) % 2 == 1)
                .collect(),
            BoardKind::Grid => (0..spec.rows)
                .flat_map(|sy| (0..spec.cols).map(move |sx| (sx, sy)))
                .collect(),
        };

        let available = spec.dictionary.capacity();
        if marker_cells.len() > available {
            return Err(BoardGeometryError::NotEnoughMarkers {
                dictionary: spec.dictionary.name(),
                needed: marker_cells.len(),
                available,
            });
        }

        Ok(Self { spec, marker_cells })
    }

    #[inline]
    pub fn spec(&self) -> &BoardSpec {
        &self.spec
    }

    #[inline]
    pub fn kind(&self) -> BoardKind {
        self.spec.kind
    }

    #[inline]
    pub fn dictionary(&self) -> DictionaryId {
        self.spec.dictionary
    }

    #[inline]
    pub fn marker_length(&self) -> f64 {
        self.spec.marker_length
    }

    #[inline]
    pub fn square_length(&self) -> f64 {
        self.spec.square_length
    }

    #[inline]
    pub fn marker_count(&self) -> usize {
        self.marker_cells.len()
    }

    #[inline]
    pub fn contains_marker(&self, id: u32) -> bool {
        (id as usize) < self.marker_cells.len()
    }

    /// Square/cell coordinates `(sx, sy)` of a marker.
    pub fn marker_cell(&self, id: u32) -> Option<(u32, u32)> {
        self.marker_cells.get(id as usize).copied()
    }

    /// Marker corners in board coordinates, TL, TR, BR, BL.
    pub fn marker_object_corners(&self, id: u32) -> Option<[Point2<f64>; 4]> {
        let (sx, sy) = self.marker_cell(id)?;
        let s = self.spec.square_length;
        let l = self.spec.marker_length;
        let off = match self.spec.kind {
            BoardKind::Charuco => 0.5 * (s - l),
            BoardKind::Grid => 0.0,
        };
        let x0 = sx as f64 * s + off;
        let y0 = sy as f64 * s + off;
        Some([
            Point2::new(x0, y0),
            Point2::new(x0 + l, y0),
            Point2::new(x0 + l, y0 + l),
            Point2::new(x0, y0 + l),
        ])
    }

    /// Number of board corners: inner chessboard corners for ChArUco,
    /// four per marker for grid boards.
    pub fn corner_count(&self) -> usize {
        match self.spec.kind {
            BoardKind::Charuco => ((self.spec.rows - 1) * (self.spec.cols - 1)) as usize,
            BoardKind::Grid => 4 * self.marker_cells.len(),
        }
    }

    /// Board-plane position of a board corner.
    pub fn corner_object_point(&self, id: u32) -> Option<Point2<f64>> {
        if id as usize >= self.corner_count() {
            return None;
        }
        match self.spec.kind {
            BoardKind::Charuco => {
                let inner_cols = self.spec.cols - 1;
                let i = id % inner_cols + 1;
                let j = id / inner_cols + 1;
                let s = self.spec.square_length;
                Some(Point2::new(i as f64 * s, j as f64 * s))
            }
            BoardKind::Grid => {
                let corners = self.marker_object_corners(id / 4)?;
                Some(corners[(id % 4) as usize])
            }
        }
    }

    /// Marker ids whose squares touch the given board corner.
    pub fn corner_adjacent_markers(&self, id: u32) -> Vec<u32> {
        if id as usize >= self.corner_count() {
            return Vec::new();
        }
        match self.spec.kind {
            BoardKind::Charuco => {
                let inner_cols = self.spec.cols - 1;
                let i = id % inner_cols + 1;
                let j = id / inner_cols + 1;
                [(i - 1, j - 1), (i, j - 1), (i - 1, j), (i, j)]
                    .into_iter()
                    .filter_map(|(sx, sy)| self.marker_at(sx, sy))
                    .collect()
            }
            BoardKind::Grid => vec![id / 4],
        }
    }

    /// Marker id placed on square `(sx, sy)`, if any.
    pub fn marker_at(&self, sx: u32, sy: u32) -> Option<u32> {
        if sx >= self.spec.cols || sy >= self.spec.rows {
            return None;
        }
        match self.spec.kind {
            BoardKind::Charuco => {
                if (sx + sy) % 2 == 0 {
                    return None;
                }
                // White squares before row sy, then white squares left of sx in row sy.
                let before_rows: u32 = (0..sy)
                    .map(|r| (0..self.spec.cols).filter(|c| (c + r) % 2 == 1).count() as u32)
                    .sum();
                let in_row = (0..sx).filter(|c| (c + sy) % 2 == 1).count() as u32;
                Some(before_rows + in_row)
            }
            BoardKind::Grid => Some(sy * self.spec.cols + sx),
        }
    }
}
