//! The evaluation slice handed to the inference program.
use crate::error::{ExportError, Result};
use crate::idx::{IdxFile, Image, IMAGE_PIXELS};
use log::warn;

/// Number of evaluation records exported by default.
pub const DEFAULT_SAMPLE_COUNT: usize = 100;

/// Highest valid digit class.
pub const MAX_LABEL: u8 = 9;

/// Rescales a pixel from the `[0, 1]` training range to `0..=255`.
///
/// Rounds to nearest, so a byte `k` normalized as `k / 255` comes back as
/// `k`. Out-of-range and NaN inputs saturate.
pub fn rescale_pixel(x: f64) -> u8 {
    (x * 255.0).round().clamp(0.0, 255.0) as u8
}

/// The first N `(image, label)` pairs of an evaluation set, in dataset order.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLabelSample {
    images: Vec<Image>,
    labels: Vec<u8>,
}

impl ImageLabelSample {
    /// Pairs `images[i]` with `labels[i]`.
    pub fn new(images: Vec<Image>, labels: Vec<u8>) -> Result<Self> {
        if images.len() != labels.len() {
            return Err(ExportError::LengthMismatch {
                images: images.len(),
                labels: labels.len(),
            });
        }
        if let Some((index, &label)) = labels.iter().enumerate().find(|&(_, &l)| l > MAX_LABEL) {
            return Err(ExportError::InvalidLabel { index, label });
        }
        Ok(Self { images, labels })
    }

    /// Takes the first `n` records of a normalized dataset, rescaling pixels
    /// back to bytes.
    pub fn from_normalized(images: &[Vec<f64>], labels: &[u8], n: usize) -> Result<Self> {
        if images.len() != labels.len() {
            return Err(ExportError::LengthMismatch {
                images: images.len(),
                labels: labels.len(),
            });
        }
        let n = clamp_count(n, images.len());
        let mut out = Vec::with_capacity(n);
        for (i, pixels) in images[..n].iter().enumerate() {
            if pixels.len() != IMAGE_PIXELS {
                return Err(ExportError::shape_mismatch(
                    format!("image {i}"),
                    IMAGE_PIXELS,
                    pixels.len(),
                ));
            }
            let mut image = [0u8; IMAGE_PIXELS];
            for (dst, &src) in image.iter_mut().zip(pixels) {
                *dst = rescale_pixel(src);
            }
            out.push(image);
        }
        Self::new(out, labels[..n].to_vec())
    }

    /// Takes the first `n` records of an IDX images/labels pair.
    pub fn first_n(images: &IdxFile, labels: &IdxFile, n: usize) -> Result<Self> {
        let mut images = images.images()?;
        let labels = labels.labels()?;
        if images.len() != labels.len() {
            return Err(ExportError::LengthMismatch {
                images: images.len(),
                labels: labels.len(),
            });
        }
        let n = clamp_count(n, images.len());
        images.truncate(n);
        Self::new(images, labels[..n].to_vec())
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Image, u8)> + '_ {
        self.images.iter().zip(self.labels.iter().copied())
    }
}

fn clamp_count(requested: usize, available: usize) -> usize {
    if requested > available {
        warn!("requested {requested} samples but only {available} are available");
        available
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescale_inverts_normalization() {
        for k in 0..=255u8 {
            assert_eq!(rescale_pixel(f64::from(k) / 255.0), k);
        }
    }

    #[test]
    fn rescale_saturates() {
        assert_eq!(rescale_pixel(-0.2), 0);
        assert_eq!(rescale_pixel(1.7), 255);
        assert_eq!(rescale_pixel(f64::NAN), 0);
    }

    #[test]
    fn rejects_bad_label() {
        let err = ImageLabelSample::new(vec![[0; IMAGE_PIXELS]; 2], vec![3, 10]).unwrap_err();
        assert!(matches!(
            err,
            ExportError::InvalidLabel {
                index: 1,
                label: 10
            }
        ));
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = ImageLabelSample::new(vec![[0; IMAGE_PIXELS]; 3], vec![1, 2]).unwrap_err();
        assert!(matches!(err, ExportError::LengthMismatch { .. }));
    }

    #[test]
    fn from_normalized_keeps_first_n_in_order() {
        let images: Vec<Vec<f64>> = (0..5)
            .map(|i| vec![f64::from(i) / 255.0; IMAGE_PIXELS])
            .collect();
        let labels = [4, 3, 2, 1, 0];
        let sample = ImageLabelSample::from_normalized(&images, &labels, 3).unwrap();
        assert_eq!(sample.len(), 3);
        assert_eq!(sample.labels(), &[4, 3, 2]);
        for (i, (image, _)) in sample.iter().enumerate() {
            assert!(image.iter().all(|&p| p == i as u8));
        }
    }

    #[test]
    fn from_normalized_clamps_count() {
        let images = vec![vec![0.0; IMAGE_PIXELS]; 2];
        let sample = ImageLabelSample::from_normalized(&images, &[1, 2], 100).unwrap();
        assert_eq!(sample.len(), 2);
    }

    #[test]
    fn from_normalized_checks_pixel_count() {
        let images = vec![vec![0.0; IMAGE_PIXELS], vec![0.0; 10]];
        let err = ImageLabelSample::from_normalized(&images, &[1, 2], 2).unwrap_err();
        assert!(matches!(
            err,
            ExportError::ShapeMismatch {
                expected: 784,
                actual: 10,
                ..
            }
        ));
    }

    #[test]
    fn first_n_from_idx() {
        let mut image_bytes = vec![0, 0, 8, 3, 0, 0, 0, 3, 0, 0, 0, 28, 0, 0, 0, 28];
        for i in 0..3u8 {
            image_bytes.extend(std::iter::repeat(i * 10).take(IMAGE_PIXELS));
        }
        let images = IdxFile::from_bytes("images", &image_bytes).unwrap();
        let labels = IdxFile::from_bytes("labels", &[0, 0, 8, 1, 0, 0, 0, 3, 7, 8, 9]).unwrap();

        let sample = ImageLabelSample::first_n(&images, &labels, 2).unwrap();
        assert_eq!(sample.labels(), &[7, 8]);
        assert_eq!(sample.images()[1][0], 10);
    }
}
