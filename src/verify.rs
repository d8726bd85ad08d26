//! Re-reads exported artifacts the way the inference program will.
//!
//! The reader has no checksum or header for the weight file, so length is
//! the check. The IDX pair is checked for its headers, its payload lengths
//! and equal record counts.

use std::path::Path;

use log::info;

use crate::binary::file_len;
use crate::error::{ExportError, Result};
use crate::idx::{
    IdxFile, IMAGES_HEADER_LEN, IMAGE_COLS, IMAGE_PIXELS, IMAGE_ROWS, LABELS_HEADER_LEN,
};
use crate::params::ParameterSet;
use crate::topology::Topology;
use crate::weights::load_weights;

/// What a verified images/labels pair declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleReport {
    pub count: usize,
    pub rows: usize,
    pub cols: usize,
}

/// Checks the weight file length and decodes it.
pub fn verify_weights<P: AsRef<Path>>(path: P, topology: &Topology) -> Result<ParameterSet> {
    let params = load_weights(&path, topology)?;
    info!(
        "verified {} ({} bytes)",
        path.as_ref().display(),
        topology.weight_file_len()
    );
    Ok(params)
}

/// Checks an exported images/labels pair.
pub fn verify_sample<P: AsRef<Path>, Q: AsRef<Path>>(
    images_path: P,
    labels_path: Q,
) -> Result<SampleReport> {
    let images_path = images_path.as_ref();
    let labels_path = labels_path.as_ref();
    let images = IdxFile::open(images_path)?;
    let labels = IdxFile::open(labels_path)?;

    // Decoding checks both magics and the 28x28 image shape.
    let decoded = images.images()?;
    labels.labels()?;
    if decoded.len() != labels.len() {
        return Err(ExportError::LengthMismatch {
            images: decoded.len(),
            labels: labels.len(),
        });
    }
    let count = labels.len();

    let images_len = IMAGES_HEADER_LEN + (count * IMAGE_PIXELS) as u64;
    let actual = file_len(images_path)?;
    if actual != images_len {
        return Err(ExportError::size_mismatch(images_path, images_len, actual));
    }
    let labels_len = LABELS_HEADER_LEN + count as u64;
    let actual = file_len(labels_path)?;
    if actual != labels_len {
        return Err(ExportError::size_mismatch(labels_path, labels_len, actual));
    }

    info!(
        "verified {} and {} ({} samples)",
        images_path.display(),
        labels_path.display(),
        count
    );
    Ok(SampleReport {
        count,
        rows: IMAGE_ROWS,
        cols: IMAGE_COLS,
    })
}
