//! Oriented FAST keypoints with rotated BRIEF descriptors.
//!
//! Corners are detected with FAST-9 on every level of a downscaled image
//! pyramid, thinned with 3x3 non-maximum suppression, oriented by their
//! intensity centroid and described by 256 binary intensity comparisons
//! sampled from a fixed pattern rotated by the keypoint angle. The detector is
//! stateless; concurrent calls never interfere.

use std::cmp::Ordering;
use std::sync::OnceLock;

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::corners::corners_fast9;
use imageproc::filter::gaussian_blur_f32;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ExtractorConfig;
use crate::constants::MAX_DESCRIPTORS;

/// 256-bit binary descriptor.
pub type Descriptor = [u8; 32];

/// Radius of the disc used for the intensity-centroid orientation.
const HALF_PATCH: i32 = 15;

/// Keypoints closer than this to a level border are discarded so every
/// rotated sample stays inside the image.
const BORDER: u32 = 20;

/// Extent of the sampling pattern around the keypoint.
const PATTERN_RADIUS: i8 = 13;

const PATTERN_SEED: u64 = 0x0b1e_f5ee_d000_0256;

/// Smoothing applied to each level before descriptor sampling.
const DESCRIPTOR_BLUR_SIGMA: f32 = 2.0;

/// Detected corner in level-0 image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Orientation in radians
    pub angle: f32,
    /// FAST corner score
    pub response: f32,
    /// Pyramid level the corner was found on
    pub octave: u8,
}

/// A keypoint together with its descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub keypoint: Keypoint,
    pub descriptor: Descriptor,
}

/// Variable-length, capped set of local features for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptorSet {
    features: Vec<Feature>,
}

impl DescriptorSet {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }
}

/// Stateless ORB-style feature detector.
#[derive(Debug, Clone)]
pub struct FeatureDetector {
    fast_threshold: u8,
    pyramid_levels: usize,
    pyramid_scale: f32,
    max_features: usize,
}

impl Default for FeatureDetector {
    fn default() -> Self {
        Self::new(&ExtractorConfig::default())
    }
}

impl FeatureDetector {
    /// The descriptor cap is clamped to [`MAX_DESCRIPTORS`].
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            fast_threshold: config.fast_threshold,
            pyramid_levels: config.pyramid_levels.max(1),
            pyramid_scale: config.pyramid_scale.max(1.0),
            max_features: config.max_features.min(MAX_DESCRIPTORS),
        }
    }

    /// Detect and describe up to `max_features` keypoints.
    ///
    /// Candidates from all pyramid levels are ranked by response; ties are
    /// broken by level then raster position so the output is reproducible.
    pub fn detect(&self, gray: &GrayImage) -> DescriptorSet {
        let pyramid = self.build_pyramid(gray);

        let per_level: Vec<Vec<Feature>> = pyramid
            .par_iter()
            .enumerate()
            .map(|(octave, (level, scale))| self.detect_level(level, octave as u8, *scale))
            .collect();

        let mut features: Vec<Feature> = per_level.into_iter().flatten().collect();
        features.sort_by(|a, b| {
            b.keypoint
                .response
                .partial_cmp(&a.keypoint.response)
                .unwrap_or(Ordering::Equal)
                .then(a.keypoint.octave.cmp(&b.keypoint.octave))
                .then(a.keypoint.y.total_cmp(&b.keypoint.y))
                .then(a.keypoint.x.total_cmp(&b.keypoint.x))
        });
        features.truncate(self.max_features);

        DescriptorSet::new(features)
    }

    fn build_pyramid(&self, gray: &GrayImage) -> Vec<(GrayImage, f32)> {
        let min_side = 2 * BORDER + 1;
        let mut pyramid = Vec::with_capacity(self.pyramid_levels);
        if gray.width() < min_side || gray.height() < min_side {
            return pyramid;
        }
        pyramid.push((gray.clone(), 1.0));

        let mut scale = 1.0f32;
        for _ in 1..self.pyramid_levels {
            scale *= self.pyramid_scale;
            let width = (gray.width() as f32 / scale).round() as u32;
            let height = (gray.height() as f32 / scale).round() as u32;
            if width < min_side || height < min_side {
                break;
            }
            pyramid.push((
                imageops::resize(gray, width, height, FilterType::Triangle),
                scale,
            ));
        }

        pyramid
    }

    fn detect_level(&self, level: &GrayImage, octave: u8, scale: f32) -> Vec<Feature> {
        let (width, height) = level.dimensions();
        let corners = corners_fast9(level, self.fast_threshold);
        if corners.is_empty() {
            return Vec::new();
        }

        let mut scores = vec![0f32; (width * height) as usize];
        for corner in &corners {
            scores[(corner.y * width + corner.x) as usize] = corner.score;
        }

        let smoothed = gaussian_blur_f32(level, DESCRIPTOR_BLUR_SIGMA);

        corners
            .iter()
            .filter(|c| {
                c.x >= BORDER && c.y >= BORDER && c.x < width - BORDER && c.y < height - BORDER
            })
            .filter(|c| is_local_maximum(&scores, width, c.x, c.y))
            .map(|c| {
                let angle = intensity_centroid_angle(level, c.x, c.y);
                let descriptor = rotated_brief(&smoothed, c.x, c.y, angle);
                Feature {
                    keypoint: Keypoint {
                        x: c.x as f32 * scale,
                        y: c.y as f32 * scale,
                        angle,
                        response: c.score,
                        octave,
                    },
                    descriptor,
                }
            })
            .collect()
    }
}

/// Hamming distance between two descriptors.
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// A corner survives if no 8-neighbour scores higher, and no earlier
/// (raster order) neighbour scores the same.
fn is_local_maximum(scores: &[f32], width: u32, x: u32, y: u32) -> bool {
    let own = scores[(y * width + x) as usize];
    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = (x as i32 + dx) as u32;
            let ny = (y as i32 + dy) as u32;
            let other = scores[(ny * width + nx) as usize];
            let earlier = dy < 0 || (dy == 0 && dx < 0);
            if other > own || (earlier && other == own) {
                return false;
            }
        }
    }
    true
}

fn intensity_centroid_angle(image: &GrayImage, x: u32, y: u32) -> f32 {
    let mut m01 = 0.0f32;
    let mut m10 = 0.0f32;
    for dy in -HALF_PATCH..=HALF_PATCH {
        for dx in -HALF_PATCH..=HALF_PATCH {
            if dx * dx + dy * dy > HALF_PATCH * HALF_PATCH {
                continue;
            }
            let px = (x as i32 + dx) as u32;
            let py = (y as i32 + dy) as u32;
            let intensity = image.get_pixel(px, py)[0] as f32;
            m10 += intensity * dx as f32;
            m01 += intensity * dy as f32;
        }
    }
    m01.atan2(m10)
}

fn rotated_brief(image: &GrayImage, x: u32, y: u32, angle: f32) -> Descriptor {
    let (cos_a, sin_a) = (angle.cos(), angle.sin());
    let max_x = image.width() as i32 - 1;
    let max_y = image.height() as i32 - 1;
    let sample = |dx: i8, dy: i8| -> u8 {
        let rx = (dx as f32 * cos_a - dy as f32 * sin_a).round() as i32;
        let ry = (dx as f32 * sin_a + dy as f32 * cos_a).round() as i32;
        let px = (x as i32 + rx).clamp(0, max_x) as u32;
        let py = (y as i32 + ry).clamp(0, max_y) as u32;
        image.get_pixel(px, py)[0]
    };

    let mut descriptor = [0u8; 32];
    for (byte_idx, tests) in sampling_pattern().chunks(8).enumerate() {
        let mut byte = 0u8;
        for (bit_idx, &[x1, y1, x2, y2]) in tests.iter().enumerate() {
            if sample(x1, y1) < sample(x2, y2) {
                byte |= 1 << bit_idx;
            }
        }
        descriptor[byte_idx] = byte;
    }
    descriptor
}

/// The 256 point-pair comparisons shared by every descriptor.
fn sampling_pattern() -> &'static [[i8; 4]; 256] {
    static PATTERN: OnceLock<[[i8; 4]; 256]> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let mut pattern = [[0i8; 4]; 256];
        for pair in pattern.iter_mut() {
            loop {
                let candidate = [
                    rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS),
                    rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS),
                    rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS),
                    rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS),
                ];
                if candidate[..2] != candidate[2..] {
                    *pair = candidate;
                    break;
                }
            }
        }
        pattern
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Blocky pseudo-random texture: many distinct corners, no repetition.
    fn textured(width: u32, height: u32, seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        let cols = width.div_ceil(8);
        let rows = height.div_ceil(8);
        let blocks: Vec<u8> = (0..cols * rows).map(|_| rng.gen()).collect();
        GrayImage::from_fn(width, height, |x, y| {
            Luma([blocks[((y / 8) * cols + x / 8) as usize]])
        })
    }

    #[test]
    fn test_hamming_distance() {
        let zeros = [0u8; 32];
        let mut one_bit = [0u8; 32];
        one_bit[5] = 0b0001_0000;
        assert_eq!(hamming_distance(&zeros, &zeros), 0);
        assert_eq!(hamming_distance(&zeros, &one_bit), 1);
        assert_eq!(hamming_distance(&zeros, &[0xFF; 32]), 256);
    }

    #[test]
    fn test_pattern_is_stable_and_in_range() {
        let first = sampling_pattern();
        let second = sampling_pattern();
        assert_eq!(first, second);
        for pair in first.iter() {
            assert!(pair.iter().all(|v| v.abs() <= PATTERN_RADIUS));
            assert_ne!(pair[..2], pair[2..]);
        }
    }

    #[test]
    fn test_flat_image_has_no_features() {
        let flat = GrayImage::from_pixel(120, 90, Luma([128]));
        assert!(FeatureDetector::default().detect(&flat).is_empty());
    }

    #[test]
    fn test_tiny_image_has_no_features() {
        let tiny = textured(30, 30, 1);
        assert!(FeatureDetector::default().detect(&tiny).is_empty());
    }

    #[test]
    fn test_textured_image_yields_features_within_bounds() {
        let image = textured(240, 180, 7);
        let set = FeatureDetector::default().detect(&image);
        assert!(set.len() > 50, "expected many corners, got {}", set.len());
        for feature in set.iter() {
            assert!(feature.keypoint.x >= 0.0 && feature.keypoint.x < 240.0);
            assert!(feature.keypoint.y >= 0.0 && feature.keypoint.y < 180.0);
        }
    }

    #[test]
    fn test_detection_is_deterministic() {
        let image = textured(200, 160, 11);
        let detector = FeatureDetector::default();
        assert_eq!(detector.detect(&image), detector.detect(&image));
    }

    #[test]
    fn test_feature_cap_is_respected() {
        let config = ExtractorConfig {
            max_features: 25,
            ..ExtractorConfig::default()
        };
        let set = FeatureDetector::new(&config).detect(&textured(240, 180, 3));
        assert_eq!(set.len(), 25);
        let responses: Vec<f32> = set.iter().map(|f| f.keypoint.response).collect();
        assert!(responses.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_feature_cap_never_exceeds_descriptor_limit() {
        let config = ExtractorConfig {
            max_features: 100_000,
            fast_threshold: 1,
            ..ExtractorConfig::default()
        };
        let detector = FeatureDetector::new(&config);
        assert_eq!(detector.max_features, MAX_DESCRIPTORS);

        let set = detector.detect(&textured(1600, 1200, 5));
        assert!(set.len() <= MAX_DESCRIPTORS, "cap exceeded: {}", set.len());
    }
}
