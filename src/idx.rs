//! MNIST IDX container: writers for image/label sample files and a reader.
//!
//! An IDX file is a big-endian header (magic, then one 32-bit size per
//! dimension) followed by the row-major `u8` payload. The magic's low byte
//! is the rank and the byte above it the element type (`0x08` = unsigned
//! byte).
//!
//! ```text
//! images: [0x00000803, N, 28, 28] + N*784 bytes
//! labels: [0x00000801, N]         + N bytes
//! ```

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use log::{debug, info};

use crate::binary::{write_atomic, write_i32s};
use crate::error::{ExportError, Result};
use crate::sample::ImageLabelSample;

pub const IMAGE_ROWS: usize = 28;
pub const IMAGE_COLS: usize = 28;
pub const IMAGE_PIXELS: usize = IMAGE_ROWS * IMAGE_COLS;

/// Magic for a rank-3 unsigned-byte tensor (images).
pub const IMAGES_MAGIC: u32 = 0x0000_0803;
/// Magic for a rank-1 unsigned-byte tensor (labels).
pub const LABELS_MAGIC: u32 = 0x0000_0801;

/// Header bytes of an images file.
pub const IMAGES_HEADER_LEN: u64 = 16;
/// Header bytes of a labels file.
pub const LABELS_HEADER_LEN: u64 = 8;

const UBYTE_TYPE: u32 = 0x08;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One 28×28 image, row-major, intensities in `0..=255`.
pub type Image = [u8; IMAGE_PIXELS];

fn count_field(what: &str, n: usize) -> Result<i32> {
    i32::try_from(n).map_err(|_| ExportError::shape_mismatch(what, i32::MAX as usize, n))
}

/// Writes `images` as an IDX images file.
///
/// Pixels are written as given; the caller has already rescaled them to
/// `0..=255`. Images follow one another in input order.
pub fn export_images<P: AsRef<Path>>(images: &[Image], path: P) -> Result<()> {
    let path = path.as_ref();
    let n = count_field("image count", images.len())?;
    let written = write_atomic(path, |w| {
        write_i32s::<BigEndian, _>(
            w,
            &[IMAGES_MAGIC as i32, n, IMAGE_ROWS as i32, IMAGE_COLS as i32],
        )?;
        for image in images {
            w.write_all(image)?;
        }
        Ok(())
    })?;
    debug!("{} images, {} bytes -> {}", n, written, path.display());
    Ok(())
}

/// Writes `labels` as an IDX labels file.
pub fn export_labels<P: AsRef<Path>>(labels: &[u8], path: P) -> Result<()> {
    let path = path.as_ref();
    let n = count_field("label count", labels.len())?;
    let written = write_atomic(path, |w| {
        write_i32s::<BigEndian, _>(w, &[LABELS_MAGIC as i32, n])?;
        w.write_all(labels)
    })?;
    debug!("{} labels, {} bytes -> {}", n, written, path.display());
    Ok(())
}

/// Writes matching images and labels files.
///
/// Both sequences must have the same length; otherwise nothing is written.
/// Entry `i` of the images file and entry `i` of the labels file describe
/// the same sample.
///
/// Each file is replaced atomically, but the pair is not replaced as a unit:
/// if the labels write fails, the new images file is already in place next to
/// the old (or missing) labels file.
pub fn export_pair<P: AsRef<Path>, Q: AsRef<Path>>(
    images: &[Image],
    labels: &[u8],
    images_path: P,
    labels_path: Q,
) -> Result<()> {
    if images.len() != labels.len() {
        return Err(ExportError::LengthMismatch {
            images: images.len(),
            labels: labels.len(),
        });
    }
    export_images(images, &images_path)?;
    export_labels(labels, &labels_path)?;
    info!(
        "exported {} samples to {} and {}",
        images.len(),
        images_path.as_ref().display(),
        labels_path.as_ref().display()
    );
    Ok(())
}

/// Writes a sample's images and labels files.
pub fn export_sample<P: AsRef<Path>, Q: AsRef<Path>>(
    sample: &ImageLabelSample,
    images_path: P,
    labels_path: Q,
) -> Result<()> {
    export_pair(sample.images(), sample.labels(), images_path, labels_path)
}

/// A parsed IDX file of unsigned bytes.
#[derive(Debug, Clone)]
pub struct IdxFile {
    source: PathBuf,
    magic: u32,
    dims: Vec<usize>,
    data: Vec<u8>,
}

impl IdxFile {
    /// Reads an IDX file, transparently decompressing `.gz` content.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| ExportError::io(path, e))?;
        let mut raw = Vec::new();
        file.read_to_end(&mut raw)
            .map_err(|e| ExportError::io(path, e))?;

        let contents = if raw.starts_with(&GZIP_MAGIC) {
            let mut gz = GzDecoder::new(raw.as_slice());
            let mut contents = Vec::new();
            gz.read_to_end(&mut contents)
                .map_err(|e| ExportError::io(path, e))?;
            contents
        } else {
            raw
        };
        Self::from_bytes(path, &contents)
    }

    /// Parses IDX content; `source` is only used in error messages.
    pub fn from_bytes<P: AsRef<Path>>(source: P, bytes: &[u8]) -> Result<Self> {
        let source = source.as_ref().to_path_buf();
        let actual = bytes.len() as u64;
        let truncated = |expected: u64| ExportError::size_mismatch(&source, expected, actual);

        let mut r = Cursor::new(bytes);
        let magic = r.read_u32::<BigEndian>().map_err(|_| truncated(4))?;
        let rank = magic & 0xff;
        if magic >> 8 != UBYTE_TYPE || rank == 0 {
            return Err(ExportError::BadMagic {
                path: source.clone(),
                expected: (UBYTE_TYPE << 8) | rank.max(1),
                found: magic,
            });
        }

        let header_len = 4 + 4 * u64::from(rank);
        let mut dims = Vec::with_capacity(rank as usize);
        for _ in 0..rank {
            let d = r
                .read_u32::<BigEndian>()
                .map_err(|_| truncated(header_len))?;
            dims.push(d as usize);
        }

        // Dimensions whose product overflows cannot describe a real file.
        let expected = dims
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d as u64))
            .and_then(|payload| payload.checked_add(header_len))
            .ok_or_else(|| ExportError::size_mismatch(&source, u64::MAX, actual))?;
        if actual != expected {
            return Err(ExportError::size_mismatch(&source, expected, actual));
        }
        let data = bytes[header_len as usize..].to_vec();
        Ok(Self {
            source,
            magic,
            dims,
            data,
        })
    }

    pub fn magic(&self) -> u32 {
        self.magic
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of records (first dimension).
    pub fn len(&self) -> usize {
        self.dims.first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn expect_magic(&self, expected: u32) -> Result<()> {
        if self.magic != expected {
            return Err(ExportError::BadMagic {
                path: self.source.clone(),
                expected,
                found: self.magic,
            });
        }
        Ok(())
    }

    /// The payload as 28×28 images.
    pub fn images(&self) -> Result<Vec<Image>> {
        self.expect_magic(IMAGES_MAGIC)?;
        let pixels = self.dims[1] * self.dims[2];
        if pixels != IMAGE_PIXELS {
            return Err(ExportError::shape_mismatch(
                format!("{} image", self.source.display()),
                IMAGE_PIXELS,
                pixels,
            ));
        }
        Ok(self
            .data
            .chunks_exact(IMAGE_PIXELS)
            .map(|chunk| {
                let mut image = [0u8; IMAGE_PIXELS];
                image.copy_from_slice(chunk);
                image
            })
            .collect())
    }

    /// The payload as labels.
    pub fn labels(&self) -> Result<&[u8]> {
        self.expect_magic(LABELS_MAGIC)?;
        Ok(&self.data)
    }
}
