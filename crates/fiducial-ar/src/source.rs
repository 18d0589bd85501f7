//! Frame sources: an image sequence on disk and an in-memory replay.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "pgm", "ppm"];

#[derive(thiserror::Error, Debug)]
pub enum FrameSourceError {
    #[error("frame source {path} does not exist")]
    NotFound { path: PathBuf },
    #[error("failed to list {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no image files in {path}")]
    Empty { path: PathBuf },
}

/// A stream of frames. `None` means the stream has ended, whether by
/// exhaustion or by a read failure.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Frame>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Option<Frame> {
        (**self).next_frame()
    }
}

/// Frames decoded one at a time from image files.
#[derive(Debug)]
pub struct ImageSequence {
    paths: VecDeque<PathBuf>,
}

impl ImageSequence {
    /// A directory of images (sorted by file name) or a single image file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FrameSourceError> {
        let path = path.as_ref();
        if path.is_file() {
            return Ok(Self::from_paths(vec![path.to_path_buf()]));
        }
        if !path.is_dir() {
            return Err(FrameSourceError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let io_err = |source| FrameSourceError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(path).map_err(io_err)? {
            let p = entry.map_err(io_err)?.path();
            if p.is_file() && is_image(&p) {
                paths.push(p);
            }
        }
        if paths.is_empty() {
            return Err(FrameSourceError::Empty {
                path: path.to_path_buf(),
            });
        }
        paths.sort();
        log::info!("{} frames in {}", paths.len(), path.display());
        Ok(Self::from_paths(paths))
    }

    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: paths.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Option<Frame> {
        let path = self.paths.pop_front()?;
        match image::open(&path) {
            Ok(img) => Some(Frame::from_image(img)),
            Err(err) => {
                log::warn!("failed to decode {}: {err}; ending stream", path.display());
                self.paths.clear();
                None
            }
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Frames held in memory, yielded in order.
#[derive(Clone, Debug, Default)]
pub struct FrameReplay {
    frames: VecDeque<Frame>,
}

impl FrameReplay {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl FrameSource for FrameReplay {
    fn next_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColorSpace, Rgb};

    #[test]
    fn directory_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.png", "a.png"] {
            Frame::filled(4, 3, ColorSpace::Rgb8, Rgb::WHITE)
                .to_rgb_image()
                .save(dir.path().join(name))
                .expect("save");
        }
        std::fs::write(dir.path().join("notes.txt"), "x").expect("write");

        let mut seq = ImageSequence::open(dir.path()).expect("open");
        assert_eq!(seq.remaining(), 2);
        assert_eq!(seq.next_frame().map(|f| f.width()), Some(4));
        assert!(seq.next_frame().is_some());
        assert!(seq.next_frame().is_none());
    }

    #[test]
    fn decode_failure_ends_the_stream() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("0.png"), b"not a png").expect("write");
        Frame::filled(2, 2, ColorSpace::Gray8, Rgb::BLACK)
            .to_rgb_image()
            .save(dir.path().join("1.png"))
            .expect("save");

        let mut seq = ImageSequence::open(dir.path()).expect("open");
        assert!(seq.next_frame().is_none());
        assert!(seq.next_frame().is_none());
    }

    #[test]
    fn missing_and_empty_paths_fail() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            ImageSequence::open(dir.path().join("nope")),
            Err(FrameSourceError::NotFound { .. })
        ));
        assert!(matches!(
            ImageSequence::open(dir.path()),
            Err(FrameSourceError::Empty { .. })
        ));
    }
}
