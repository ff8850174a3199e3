use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReductionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed value: {0}")]
    Format(String),

    #[error("Cannot read FITS file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Cannot write FITS file {path}: {source}")]
    Write {
        path: PathBuf,
        source: fitsio::errors::Error,
    },

    #[error("Science data in {0} has zero variance")]
    DegenerateData(PathBuf),

    #[error("Missing header keyword: {0}")]
    MissingKeyword(String),

    #[error("Header keyword {keyword} is not a {expected}")]
    TypeMismatch {
        keyword: String,
        expected: &'static str,
    },

    #[error("Array shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Empty frame sequence")]
    EmptySequence,

    #[error("Output file already exists: {0}")]
    OutputExists(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReductionError {
    /// Errors that only invalidate the frame being processed.
    ///
    /// The scheduler logs these and moves on to the next file; anything else
    /// (for instance a failing write into the reduced directory) ends the run.
    pub fn is_frame_level(&self) -> bool {
        matches!(
            self,
            Self::Format(_)
                | Self::Read { .. }
                | Self::DegenerateData(_)
                | Self::MissingKeyword(_)
                | Self::TypeMismatch { .. }
                | Self::ShapeMismatch { .. }
        )
    }

    pub(crate) fn read(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn write(path: &std::path::Path, source: fitsio::errors::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReductionError>;
