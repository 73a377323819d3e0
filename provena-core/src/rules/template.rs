use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, RgbImage};

use super::{scaled_points, ComparisonRule, Measurement, RuleOutcome};
use crate::constants::TEMPLATE_MAX_POINTS;
use crate::signature::{scaled_length, ProbeImage, Signature};
use crate::template::match_template;

/// Slides the rescaled probe over the target's downscaled grayscale buffer
/// and scores the best normalized cross-correlation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRule;

impl TemplateRule {
    /// Resize the probe by the target's scale factor, shrinking further so it
    /// fits inside the target buffer.
    fn prepare_probe(pixels: &RgbImage, target: &Signature) -> GrayImage {
        let (target_w, target_h) = target.downscaled_gray.dimensions();
        let (w, h) = pixels.dimensions();
        let mut size = (
            scaled_length(w, target.template_scale),
            scaled_length(h, target.template_scale),
        );

        if size.0 > target_w || size.1 > target_h {
            let fit = (target_w as f64 / size.0 as f64).min(target_h as f64 / size.1 as f64);
            size = (
                scaled_length(size.0, fit).min(target_w),
                scaled_length(size.1, fit).min(target_h),
            );
        }

        let resized = imageops::resize(pixels, size.0, size.1, FilterType::Triangle);
        DynamicImage::ImageRgb8(resized).to_luma8()
    }
}

impl ComparisonRule for TemplateRule {
    fn name(&self) -> &'static str {
        "Template"
    }

    fn max_points(&self) -> u32 {
        TEMPLATE_MAX_POINTS
    }

    fn evaluate(&self, target: &Signature, probe: &ProbeImage) -> RuleOutcome {
        let template = Self::prepare_probe(&probe.pixels, target);
        let max_value = match_template(&target.downscaled_gray, &template)
            .map(|peak| peak.score)
            .unwrap_or(0.0);

        RuleOutcome::new(
            self,
            scaled_points(max_value, self.max_points()),
            format!("Match score {max_value:.2}"),
            Measurement::TemplatePeak { max_value },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SignatureExtractor;
    use image::Rgb;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn blocks(width: u32, height: u32, seed: u64) -> RgbImage {
        let mut rng = StdRng::seed_from_u64(seed);
        let cols = width.div_ceil(8);
        let rows = height.div_ceil(8);
        let palette: Vec<[u8; 3]> = (0..cols * rows).map(|_| rng.gen()).collect();
        RgbImage::from_fn(width, height, |x, y| Rgb(palette[((y / 8) * cols + x / 8) as usize]))
    }

    fn probe(image: RgbImage) -> ProbeImage {
        SignatureExtractor::default()
            .probe_from_image(&DynamicImage::ImageRgb8(image), 1)
            .unwrap()
    }

    #[test]
    fn test_self_comparison_scores_full_points() {
        let p = probe(blocks(240, 180, 11));
        let outcome = TemplateRule.evaluate(&p.signature, &p);
        assert_eq!(outcome.measurement, Measurement::TemplatePeak { max_value: 1.0 });
        assert_eq!(outcome.points(), 40);
        assert_eq!(outcome.record.explanation, "Match score 1.00");
    }

    #[test]
    fn test_probe_is_rescaled_by_target_scale() {
        let target = probe(blocks(800, 400, 12));
        // 800x400 maps to 400x200; a 200x100 crop maps to 100x50
        let crop = imageops::crop_imm(&target.pixels, 0, 0, 200, 100).to_image();
        let template = TemplateRule::prepare_probe(&crop, &target.signature);
        assert_eq!(template.dimensions(), (100, 50));
    }

    #[test]
    fn test_oversized_probe_is_shrunk_to_fit() {
        let target = probe(blocks(400, 200, 13));
        // Same longer side but taller aspect: 400x400 would not fit 400x200
        let tall = blocks(400, 400, 14);
        let template = TemplateRule::prepare_probe(&tall, &target.signature);
        let (w, h) = template.dimensions();
        assert!(w <= 400 && h <= 200);
        assert_eq!((w, h), (200, 200));
    }

    #[test]
    fn test_unrelated_images_score_low() {
        let target = probe(blocks(240, 180, 15));
        let other = probe(blocks(240, 180, 16));
        let outcome = TemplateRule.evaluate(&target.signature, &other);
        assert!(outcome.points() < 20);
    }
}
