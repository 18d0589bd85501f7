use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Four image points of a marker: TL, TR, BR, BL in marker orientation.
pub type Quad = [Point2<f32>; 4];

/// Result of marker detection on one frame.
///
/// `ids` and `corners` are parallel. `rejected` holds candidate quads that
/// looked like markers but could not be decoded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarkerDetection {
    pub ids: Vec<u32>,
    pub corners: Vec<Quad>,
    pub rejected: Vec<Quad>,
}

impl MarkerDetection {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Iterate `(id, quad)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Quad)> + '_ {
        self.ids.iter().copied().zip(self.corners.iter())
    }

    pub fn push(&mut self, id: u32, quad: Quad) {
        self.ids.push(id);
        self.corners.push(quad);
    }
}

/// Detection after board-aware refinement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RefinedDetection {
    pub markers: MarkerDetection,
    /// Ids added back from rejected candidates.
    pub recovered_ids: Vec<u32>,
}

/// Interpolated board corners of one view, sorted by id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardCornerSet {
    pub ids: Vec<u32>,
    pub corners: Vec<Point2<f32>>,
}

impl BoardCornerSet {
    #[inline]
    pub fn count(&self) -> usize {
        self.corners.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.corners.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Marker pose as an axis-angle rotation and a translation (marker -> camera).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseEstimate {
    pub rotation_vector: Vector3<f64>,
    pub translation_vector: Vector3<f64>,
}
