//! Zero-mean normalized cross-correlation template matching.
//!
//! The template slides over every offset of the image; each position scores
//!
//! ```text
//!            Σ (T - mean T)(I - mean I)
//! r = ---------------------------------------
//!     sqrt(Σ (T - mean T)^2 · Σ (I - mean I)^2)
//! ```
//!
//! Window sums come from integral images and the cross term is accumulated in
//! exact integer arithmetic, so an identical template/window pair scores
//! exactly 1.0.

use image::GrayImage;
use rayon::prelude::*;

/// Best correlation over all offsets and where it occurred.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplatePeak {
    /// Correlation in `[-1, 1]`
    pub score: f64,
    pub x: u32,
    pub y: u32,
}

/// Summed-area tables of values and squared values, one row/column padded.
struct IntegralImage {
    width: usize,
    sum: Vec<u64>,
    sum_sq: Vec<u64>,
}

impl IntegralImage {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sum_sq = vec![0u64; stride * (h + 1)];
        let raw = image.as_raw();

        for y in 0..h {
            let mut row = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w {
                let v = raw[y * w + x] as u64;
                row += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row;
                sum_sq[(y + 1) * stride + x + 1] = sum_sq[y * stride + x + 1] + row_sq;
            }
        }

        Self { width: stride, sum, sum_sq }
    }

    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (u64, u64) {
        let s = self.width;
        let at = |table: &[u64], xx: usize, yy: usize| table[yy * s + xx];
        let area = |table: &[u64]| {
            at(table, x + w, y + h) + at(table, x, y) - at(table, x + w, y) - at(table, x, y + h)
        };
        (area(&self.sum), area(&self.sum_sq))
    }
}

/// Slide `template` over `image` and return the global maximum correlation.
///
/// Returns `None` if the template is empty or larger than the image in
/// either dimension. Positions where either side has zero variance score 0.
/// Ties keep the first position in raster order.
pub fn match_template(image: &GrayImage, template: &GrayImage) -> Option<TemplatePeak> {
    let (iw, ih) = (image.width() as usize, image.height() as usize);
    let (tw, th) = (template.width() as usize, template.height() as usize);
    if tw == 0 || th == 0 || tw > iw || th > ih {
        return None;
    }

    let n = (tw * th) as f64;
    let t_raw = template.as_raw();
    let t_sum: u64 = t_raw.iter().map(|&v| v as u64).sum();
    let t_sum_sq: u64 = t_raw.iter().map(|&v| (v as u64) * (v as u64)).sum();
    let t_var = n * t_sum_sq as f64 - (t_sum as f64) * (t_sum as f64);

    let integral = IntegralImage::new(image);
    let i_raw = image.as_raw();

    let rows: Vec<TemplatePeak> = (0..=ih - th)
        .into_par_iter()
        .map(|y| {
            let mut best = TemplatePeak { score: f64::NEG_INFINITY, x: 0, y: y as u32 };
            for x in 0..=iw - tw {
                let mut cross = 0u64;
                for ty in 0..th {
                    let t_row = &t_raw[ty * tw..(ty + 1) * tw];
                    let i_row = &i_raw[(y + ty) * iw + x..(y + ty) * iw + x + tw];
                    cross += t_row
                        .iter()
                        .zip(i_row)
                        .map(|(&a, &b)| a as u64 * b as u64)
                        .sum::<u64>();
                }

                let (w_sum, w_sum_sq) = integral.window(x, y, tw, th);
                let w_var = n * w_sum_sq as f64 - (w_sum as f64) * (w_sum as f64);
                let num = n * cross as f64 - (t_sum as f64) * (w_sum as f64);
                let denom = t_var * w_var;
                let score = if t_var > 0.0 && w_var > 0.0 && denom > 0.0 {
                    (num / denom.sqrt()).clamp(-1.0, 1.0)
                } else {
                    0.0
                };

                if score > best.score {
                    best = TemplatePeak { score, x: x as u32, y: y as u32 };
                }
            }
            best
        })
        .collect();

    rows.into_iter()
        .reduce(|best, row| if row.score > best.score { row } else { best })
}
