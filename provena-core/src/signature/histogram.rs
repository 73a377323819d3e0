//! Normalized 3D color histogram.
//!
//! Each of the three 8-bit channels is quantized into 8 bins, giving 512
//! joint bins. Counts are scaled to unit L2 norm so that histograms of images
//! with different pixel counts are directly comparable.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::constants::{HISTOGRAM_BINS, HISTOGRAM_BINS_PER_CHANNEL};

const BIN_WIDTH: usize = 256 / HISTOGRAM_BINS_PER_CHANNEL;

/// 512-bin color distribution with unit L2 norm (all zeros for an empty image).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorHistogram {
    bins: Vec<f32>,
}

impl ColorHistogram {
    /// Compute the normalized histogram of an RGB buffer.
    pub fn from_rgb(image: &RgbImage) -> Self {
        let mut counts = vec![0u64; HISTOGRAM_BINS];
        for pixel in image.pixels() {
            let [r, g, b] = pixel.0;
            counts[bin_index(r, g, b)] += 1;
        }

        let norm = counts
            .iter()
            .map(|&c| (c as f64) * (c as f64))
            .sum::<f64>()
            .sqrt();

        let bins = if norm > 0.0 {
            counts.iter().map(|&c| (c as f64 / norm) as f32).collect()
        } else {
            vec![0.0; HISTOGRAM_BINS]
        };

        Self { bins }
    }

    /// Build from precomputed bin values (used by tests and deserialization).
    pub fn from_bins(bins: Vec<f32>) -> Option<Self> {
        (bins.len() == HISTOGRAM_BINS).then_some(Self { bins })
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    /// Pearson correlation between two histograms, in `[-1, 1]`.
    ///
    /// A zero denominator (either histogram constant across all bins) yields
    /// 1.0, matching the usual convention for histogram correlation.
    pub fn correlation(&self, other: &Self) -> f64 {
        let n = self.bins.len().min(other.bins.len());
        if n == 0 {
            return 1.0;
        }

        let mean_a = self.bins[..n].iter().map(|&v| v as f64).sum::<f64>() / n as f64;
        let mean_b = other.bins[..n].iter().map(|&v| v as f64).sum::<f64>() / n as f64;

        let mut num = 0.0;
        let mut var_a = 0.0;
        let mut var_b = 0.0;
        for (&a, &b) in self.bins[..n].iter().zip(&other.bins[..n]) {
            let da = a as f64 - mean_a;
            let db = b as f64 - mean_b;
            num += da * db;
            var_a += da * da;
            var_b += db * db;
        }

        let denom = var_a * var_b;
        if denom.abs() > f64::EPSILON {
            (num / denom.sqrt()).clamp(-1.0, 1.0)
        } else {
            1.0
        }
    }
}

fn bin_index(r: u8, g: u8, b: u8) -> usize {
    let r = r as usize / BIN_WIDTH;
    let g = g as usize / BIN_WIDTH;
    let b = b as usize / BIN_WIDTH;
    (r * HISTOGRAM_BINS_PER_CHANNEL + g) * HISTOGRAM_BINS_PER_CHANNEL + b
}
