//! Error types for the exporters and their read-back helpers.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while exporting or re-reading model and sample artifacts.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Open, write, sync or rename failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File the operation was acting on.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A tensor or image does not have the element count the topology requires.
    #[error("shape mismatch for {tensor}: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        /// Name of the offending tensor or sequence.
        tensor: String,
        /// Element count required by the topology.
        expected: usize,
        /// Element count actually supplied.
        actual: usize,
    },

    /// Image and label sequences have different lengths.
    #[error("length mismatch: {images} images but {labels} labels")]
    LengthMismatch {
        /// Number of images.
        images: usize,
        /// Number of labels.
        labels: usize,
    },

    /// A label is not a digit class.
    #[error("label {label} at index {index} is outside 0..=9")]
    InvalidLabel {
        /// Position of the label in the sample.
        index: usize,
        /// Offending value.
        label: u8,
    },

    /// An IDX file starts with an unexpected magic number.
    #[error("bad IDX magic in {}: expected {expected:#010x}, found {found:#010x}", path.display())]
    BadMagic {
        /// File being read.
        path: PathBuf,
        /// Magic the caller asked for.
        expected: u32,
        /// Magic found in the header.
        found: u32,
    },

    /// A file's length disagrees with the size implied by its header or topology.
    #[error("size mismatch in {}: expected {expected} bytes, got {actual}", path.display())]
    SizeMismatch {
        /// File being read.
        path: PathBuf,
        /// Length required.
        expected: u64,
        /// Length found.
        actual: u64,
    },

    /// The upstream checkpoint could not be decoded.
    #[error("invalid checkpoint: {0}")]
    Checkpoint(String),

    /// The export configuration could not be decoded.
    #[error("invalid config: {0}")]
    Config(String),
}

impl ExportError {
    /// Wraps an I/O error with the path it occurred on.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a shape mismatch error.
    #[must_use]
    pub fn shape_mismatch(tensor: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            tensor: tensor.into(),
            expected,
            actual,
        }
    }

    /// Creates a size mismatch error.
    #[must_use]
    pub fn size_mismatch(path: impl AsRef<Path>, expected: u64, actual: u64) -> Self {
        Self::SizeMismatch {
            path: path.as_ref().to_path_buf(),
            expected,
            actual,
        }
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Checkpoint(err.to_string())
    }
}

/// Result type for exporter operations.
pub type Result<T> = std::result::Result<T, ExportError>;
