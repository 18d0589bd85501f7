//! ArUco marker dictionaries, detection and decoding.
//!
//! Dictionaries are loaded from `<NAME>_CODES.json` files (see
//! [`Dictionary::load`]); nothing is generated at runtime. Detection finds
//! dark quadrilaterals with an adaptive threshold, samples their bit grid
//! through a homography and matches the code against a dictionary over all
//! four rotations.

mod candidates;
mod decode;
mod detect;
mod dictionary;
mod matcher;
mod render;
mod threshold;

pub use detect::{detect_markers, DetectorParams};
pub use dictionary::{Dictionary, DictionaryError, DictionarySet};
pub use matcher::{rotate_code_u64, Match, Matcher};
pub use render::{draw_marker, render_marker};
