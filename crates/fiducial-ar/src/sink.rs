//! Frame sinks: where composited frames are presented.

use std::path::{Path, PathBuf};

use crate::Frame;

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Display surface of a session. Failures are logged by the caller and the
/// loop continues.
pub trait FrameSink {
    fn present(&mut self, frame: &Frame) -> Result<(), SinkError>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn present(&mut self, frame: &Frame) -> Result<(), SinkError> {
        (**self).present(frame)
    }
}

/// Writes frames as `<prefix>_<NNNNN>.png` into a directory.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    prefix: String,
    next_index: usize,
}

impl DirectorySink {
    pub fn create(dir: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self, SinkError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| SinkError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            prefix: prefix.into(),
            next_index: 0,
        })
    }

    pub fn written(&self) -> usize {
        self.next_index
    }
}

impl FrameSink for DirectorySink {
    fn present(&mut self, frame: &Frame) -> Result<(), SinkError> {
        let path = self
            .dir
            .join(format!("{}_{:05}.png", self.prefix, self.next_index));
        frame
            .to_rgb_image()
            .save(&path)
            .map_err(|source| SinkError::Write {
                path: path.clone(),
                source,
            })?;
        self.next_index += 1;
        log::trace!("wrote {}", path.display());
        Ok(())
    }
}

/// Discards every frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: &Frame) -> Result<(), SinkError> {
        Ok(())
    }
}
