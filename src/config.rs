//! Export configuration.
//!
//! Every field has a default, so a JSON config file only needs the keys it
//! changes:
//!
//! ```json
//! { "checkpoint": "models/mnist_model.pere", "sample_count": 50 }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::sample::DEFAULT_SAMPLE_COUNT;
use crate::topology::Topology;

/// File name the inference program loads weights from.
pub const WEIGHTS_FILE: &str = "mnist_weights.bin";
/// File name the inference program loads test images from.
pub const IMAGES_FILE: &str = "t10k-images-idx3-ubyte";
/// File name the inference program loads test labels from.
pub const LABELS_FILE: &str = "t10k-labels-idx1-ubyte";

/// Inputs and outputs of one export run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Trainer checkpoint (`.pere`).
    pub checkpoint: PathBuf,
    /// Full evaluation images (raw or gzipped IDX).
    pub test_images: PathBuf,
    /// Full evaluation labels (raw or gzipped IDX).
    pub test_labels: PathBuf,
    /// Directory the three artifacts are written to.
    pub out_dir: PathBuf,
    pub weights_file: String,
    pub images_file: String,
    pub labels_file: String,
    /// Leading evaluation records to export.
    pub sample_count: usize,
    pub topology: Topology,
    /// Re-read every artifact after writing it.
    pub verify: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            checkpoint: PathBuf::from("models/mnist_model.pere"),
            test_images: PathBuf::from("data/t10k-images-idx3-ubyte.gz"),
            test_labels: PathBuf::from("data/t10k-labels-idx1-ubyte.gz"),
            out_dir: PathBuf::from("."),
            weights_file: WEIGHTS_FILE.to_string(),
            images_file: IMAGES_FILE.to_string(),
            labels_file: LABELS_FILE.to_string(),
            sample_count: DEFAULT_SAMPLE_COUNT,
            topology: Topology::mnist_mlp(),
            verify: true,
        }
    }
}

impl ExportConfig {
    /// Reads a JSON config file; missing keys keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ExportError::Config(e.to_string()))
    }

    pub fn weights_path(&self) -> PathBuf {
        self.out_dir.join(&self.weights_file)
    }

    pub fn images_path(&self) -> PathBuf {
        self.out_dir.join(&self.images_file)
    }

    pub fn labels_path(&self) -> PathBuf {
        self.out_dir.join(&self.labels_file)
    }
}
