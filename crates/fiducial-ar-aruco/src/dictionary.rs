//! Dictionary metadata, JSON loading and the set of loaded dictionaries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fiducial_ar_core::DictionaryId;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum DictionaryError {
    #[error("failed to read dictionary {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse dictionary {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unknown dictionary name {0:?}")]
    UnknownName(String),
    #[error("{name}: marker_size {found} does not match expected {expected}")]
    SizeMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("{name}: expected 1..={capacity} codes, found {found}")]
    CodeCount {
        name: String,
        capacity: usize,
        found: usize,
    },
    #[error("{name}: code {index} has bits outside the {bits}-bit payload")]
    CodeOutOfRange {
        name: String,
        index: usize,
        bits: usize,
    },
}

/// On-disk layout of a `<NAME>_CODES.json` file.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct DictionaryFile {
    name: String,
    marker_size: usize,
    max_correction_bits: u8,
    codes: Vec<u64>,
}

/// A loaded marker dictionary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dictionary {
    pub id: DictionaryId,
    /// Inner bits per marker side.
    pub marker_size: usize,
    /// Maximum Hamming distance the dictionary can correct.
    pub max_correction_bits: u8,
    /// One code per marker id, inner bits row-major with **black = 1**.
    pub codes: Vec<u64>,
}

impl Dictionary {
    /// Validate codes against the layout `id` implies.
    pub fn new(
        id: DictionaryId,
        max_correction_bits: u8,
        codes: Vec<u64>,
    ) -> Result<Self, DictionaryError> {
        let bits = id.marker_size() * id.marker_size();
        if codes.is_empty() || codes.len() > id.capacity() {
            return Err(DictionaryError::CodeCount {
                name: id.name(),
                capacity: id.capacity(),
                found: codes.len(),
            });
        }
        if let Some(index) = codes.iter().position(|&c| bits < 64 && c >> bits != 0) {
            return Err(DictionaryError::CodeOutOfRange {
                name: id.name(),
                index,
                bits,
            });
        }
        Ok(Self {
            id,
            marker_size: id.marker_size(),
            max_correction_bits,
            codes,
        })
    }

    /// File name a dictionary is stored under, e.g. `DICT_5X5_50_CODES.json`.
    pub fn file_name(id: DictionaryId) -> String {
        format!("{}_CODES.json", id.name())
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        let file: DictionaryFile = serde_json::from_str(s)?;
        Self::from_file(file).map_err(serde::de::Error::custom)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| DictionaryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: DictionaryFile =
            serde_json::from_str(&raw).map_err(|source| DictionaryError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_file(file)
    }

    fn from_file(file: DictionaryFile) -> Result<Self, DictionaryError> {
        let id = DictionaryId::from_name(&file.name)
            .ok_or_else(|| DictionaryError::UnknownName(file.name.clone()))?;
        if file.marker_size != id.marker_size() {
            return Err(DictionaryError::SizeMismatch {
                name: file.name,
                expected: id.marker_size(),
                found: file.marker_size,
            });
        }
        Self::new(id, file.max_correction_bits, file.codes)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), DictionaryError> {
        let path = path.as_ref();
        let file = DictionaryFile {
            name: self.id.name(),
            marker_size: self.marker_size,
            max_correction_bits: self.max_correction_bits,
            codes: self.codes.clone(),
        };
        let raw = serde_json::to_string_pretty(&file).map_err(|source| DictionaryError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, raw).map_err(|source| DictionaryError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Total number of inner bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    #[inline]
    pub fn code(&self, id: u32) -> Option<u64> {
        self.codes.get(id as usize).copied()
    }
}

/// Dictionaries available to a detector, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct DictionarySet {
    dicts: HashMap<DictionaryId, Dictionary>,
}

impl DictionarySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `<dir>/<NAME>_CODES.json` for each requested id.
    pub fn load(dir: impl AsRef<Path>, ids: &[DictionaryId]) -> Result<Self, DictionaryError> {
        let dir = dir.as_ref();
        let mut set = Self::new();
        for &id in ids {
            if set.contains(id) {
                continue;
            }
            let dict = Dictionary::load(dir.join(Dictionary::file_name(id)))?;
            log::debug!("loaded {} ({} codes)", id.name(), dict.codes.len());
            set.insert(dict);
        }
        Ok(set)
    }

    pub fn insert(&mut self, dict: Dictionary) {
        self.dicts.insert(dict.id, dict);
    }

    pub fn get(&self, id: DictionaryId) -> Option<&Dictionary> {
        self.dicts.get(&id)
    }

    pub fn contains(&self, id: DictionaryId) -> bool {
        self.dicts.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "DICT_4X4_50",
        "marker_size": 4,
        "max_correction_bits": 1,
        "codes": [46497, 23121, 4659]
    }"#;

    #[test]
    fn parses_codes_file() {
        let dict = Dictionary::from_json_str(SAMPLE).expect("parse");
        assert_eq!(dict.id, DictionaryId::Dict4x4_50);
        assert_eq!(dict.bit_count(), 16);
        assert_eq!(dict.code(1), Some(23121));
        assert_eq!(dict.code(3), None);
    }

    #[test]
    fn rejects_size_mismatch_and_wide_codes() {
        let bad = SAMPLE.replace("\"marker_size\": 4", "\"marker_size\": 5");
        assert!(Dictionary::from_json_str(&bad).is_err());

        let err = Dictionary::new(DictionaryId::Dict4x4_50, 0, vec![1 << 16]).unwrap_err();
        assert!(matches!(err, DictionaryError::CodeOutOfRange { index: 0, .. }));
    }

    #[test]
    fn set_loads_from_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dict = Dictionary::from_json_str(SAMPLE).expect("parse");
        dict.write_json(dir.path().join(Dictionary::file_name(dict.id)))
            .expect("write");

        let set = DictionarySet::load(dir.path(), &[DictionaryId::Dict4x4_50]).expect("load");
        assert_eq!(set.get(DictionaryId::Dict4x4_50), Some(&dict));

        let missing = DictionarySet::load(dir.path(), &[DictionaryId::Dict5x5_50]);
        assert!(matches!(missing, Err(DictionaryError::Io { .. })));
    }
}
