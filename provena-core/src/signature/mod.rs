//! Per-image signatures.
//!
//! A [`Signature`] bundles everything the comparison rules need about one
//! image so that corpus entries are analysed once and compared many times:
//!
//! - **Metadata**: file size in bytes and header dimensions
//! - **Color histogram**: 8x8x8 bins, unit L2 norm
//! - **Downscaled grayscale**: longer side fixed at 400, used for template matching
//! - **Descriptor set**: up to 4000 oriented FAST / rotated BRIEF features
//!
//! # Usage
//!
//! ```no_run
//! use provena_core::signature::SignatureExtractor;
//!
//! let extractor = SignatureExtractor::default();
//! let signature = extractor.extract("originals/original_00.jpg").unwrap();
//! println!("{} descriptors", signature.descriptors.len());
//! ```

pub mod features;
pub mod histogram;

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageReader, RgbImage};
use tracing::{debug, instrument};

use crate::config::ExtractorConfig;
use crate::error::{ProvenaError, Result};

pub use features::{hamming_distance, Descriptor, DescriptorSet, Feature, FeatureDetector, Keypoint};
pub use histogram::ColorHistogram;

/// Precomputed feature bundle for one image. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// File size from filesystem metadata
    pub file_size_bytes: u64,
    /// Width from the image header
    pub width: u32,
    /// Height from the image header
    pub height: u32,
    pub color_histogram: ColorHistogram,
    /// Grayscale copy with its longer side equal to the configured maximum
    pub downscaled_gray: GrayImage,
    /// Factor that maps original pixel sizes onto `downscaled_gray`
    pub template_scale: f64,
    pub descriptors: DescriptorSet,
}

impl Signature {
    pub fn pixel_area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A decoded probe: its signature plus the full-resolution pixels, which the
/// template rule rescales per target.
#[derive(Debug, Clone)]
pub struct ProbeImage {
    pub signature: Signature,
    pub pixels: RgbImage,
}

/// Converts images into [`Signature`]s.
///
/// Holds only configuration; extraction is a pure function of the input and
/// can run concurrently from many threads.
#[derive(Debug, Clone, Default)]
pub struct SignatureExtractor {
    config: ExtractorConfig,
    detector: FeatureDetector,
}

impl SignatureExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let detector = FeatureDetector::new(&config);
        Self { config, detector }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Decode `path` and compute its signature.
    ///
    /// Fails with [`ProvenaError::InvalidImage`] if the file cannot be decoded.
    pub fn extract(&self, path: impl AsRef<Path>) -> Result<Signature> {
        Ok(self.load_probe(path)?.signature)
    }

    /// Decode `path` into a probe, keeping the pixels for template matching.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load_probe(&self, path: impl AsRef<Path>) -> Result<ProbeImage> {
        let path = path.as_ref();
        let file_size = std::fs::metadata(path)
            .map_err(|e| ProvenaError::invalid_image(path, e))?
            .len();

        // Header dimensions are read separately from the pixel decode.
        let (width, height) =
            image::image_dimensions(path).map_err(|e| ProvenaError::invalid_image(path, e))?;

        let image = ImageReader::open(path)
            .map_err(|e| ProvenaError::invalid_image(path, e))?
            .with_guessed_format()
            .map_err(|e| ProvenaError::invalid_image(path, e))?
            .decode()
            .map_err(|e| ProvenaError::invalid_image(path, e))?;

        let pixels = image.to_rgb8();
        let mut signature = self.extract_rgb(&pixels, file_size)?;
        signature.width = width;
        signature.height = height;

        debug!(
            width,
            height,
            bytes = file_size,
            descriptors = signature.descriptors.len(),
            "Extracted signature"
        );

        Ok(ProbeImage { signature, pixels })
    }

    /// Compute a signature from an already decoded image.
    ///
    /// Width and height are taken from the image itself.
    pub fn extract_image(&self, image: &DynamicImage, file_size: u64) -> Result<Signature> {
        self.extract_rgb(&image.to_rgb8(), file_size)
    }

    /// Wrap an already decoded image as a probe.
    pub fn probe_from_image(&self, image: &DynamicImage, file_size: u64) -> Result<ProbeImage> {
        let pixels = image.to_rgb8();
        let signature = self.extract_rgb(&pixels, file_size)?;
        Ok(ProbeImage { signature, pixels })
    }

    fn extract_rgb(&self, pixels: &RgbImage, file_size: u64) -> Result<Signature> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(ProvenaError::InvalidImage {
                path: Default::default(),
                reason: "image has no pixels".into(),
            });
        }

        let color_histogram = ColorHistogram::from_rgb(pixels);
        let (downscaled_gray, template_scale) =
            downscale_gray(pixels, self.config.max_dimension);

        let gray = DynamicImage::ImageRgb8(pixels.clone()).to_luma8();
        let descriptors = self.detector.detect(&gray);

        Ok(Signature {
            file_size_bytes: file_size,
            width,
            height,
            color_histogram,
            downscaled_gray,
            template_scale,
            descriptors,
        })
    }
}

/// Resize so the longer side equals `max_dimension` (upsampling small
/// images), then convert to grayscale. Returns the buffer and scale factor.
pub fn downscale_gray(pixels: &RgbImage, max_dimension: u32) -> (GrayImage, f64) {
    let (width, height) = pixels.dimensions();
    let scale = max_dimension as f64 / width.max(height) as f64;
    let (new_width, new_height) = if width >= height {
        (max_dimension, scaled_length(height, scale))
    } else {
        (scaled_length(width, scale), max_dimension)
    };

    let resized = imageops::resize(pixels, new_width, new_height, FilterType::Triangle);
    (DynamicImage::ImageRgb8(resized).to_luma8(), scale)
}

/// `round(length * scale)`, never below one pixel.
pub fn scaled_length(length: u32, scale: f64) -> u32 {
    ((length as f64 * scale).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_downscale_landscape() {
        let (gray, scale) = downscale_gray(&gradient(800, 600), 400);
        assert_eq!(gray.dimensions(), (400, 300));
        assert!((scale - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_downscale_portrait() {
        let (gray, _) = downscale_gray(&gradient(300, 1200), 400);
        assert_eq!(gray.dimensions(), (100, 400));
    }

    #[test]
    fn test_small_images_are_upsampled() {
        let (gray, scale) = downscale_gray(&gradient(100, 50), 400);
        assert_eq!(gray.dimensions(), (400, 200));
        assert!((scale - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_scaled_length_never_zero() {
        assert_eq!(scaled_length(1, 0.01), 1);
        assert_eq!(scaled_length(333, 0.5), 167);
    }

    #[test]
    fn test_extract_image_populates_signature() {
        let extractor = SignatureExtractor::default();
        let image = DynamicImage::ImageRgb8(gradient(640, 480));
        let signature = extractor.extract_image(&image, 12_345).unwrap();

        assert_eq!(signature.file_size_bytes, 12_345);
        assert_eq!((signature.width, signature.height), (640, 480));
        assert_eq!(signature.pixel_area(), 640 * 480);
        assert_eq!(signature.downscaled_gray.width(), 400);
        assert_eq!(signature.color_histogram.bins().len(), 512);
    }

    #[test]
    fn test_extract_is_deterministic() {
        let extractor = SignatureExtractor::default();
        let image = DynamicImage::ImageRgb8(gradient(320, 240));
        let a = extractor.extract_image(&image, 1).unwrap();
        let b = extractor.extract_image(&image, 1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_extract_rejects_undecodable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        let err = SignatureExtractor::default().extract(&path).unwrap_err();
        assert!(matches!(err, ProvenaError::InvalidImage { .. }));
    }

    #[test]
    fn test_extract_from_disk_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradient.png");
        gradient(120, 80).save(&path).unwrap();
        let expected_size = std::fs::metadata(&path).unwrap().len();

        let signature = SignatureExtractor::default().extract(&path).unwrap();
        assert_eq!(signature.file_size_bytes, expected_size);
        assert_eq!((signature.width, signature.height), (120, 80));
        assert_eq!(signature.downscaled_gray.dimensions(), (400, 267));
    }
}
