use super::{scaled_points, ComparisonRule, Measurement, RuleOutcome};
use crate::constants::METADATA_MAX_POINTS;
use crate::signature::{ProbeImage, Signature};

/// Scores how close the probe's file size is to the target's.
///
/// The pixel-area ratio is reported in the explanation but never scored.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataRule;

impl ComparisonRule for MetadataRule {
    fn name(&self) -> &'static str {
        "Metadata"
    }

    fn max_points(&self) -> u32 {
        METADATA_MAX_POINTS
    }

    fn evaluate(&self, target: &Signature, probe: &ProbeImage) -> RuleOutcome {
        let probe = &probe.signature;
        let size_ratio = ratio(probe.file_size_bytes, target.file_size_bytes);
        let area_ratio = ratio(probe.pixel_area(), target.pixel_area());

        RuleOutcome::new(
            self,
            scaled_points(size_ratio, self.max_points()),
            format!("Size ratio {size_ratio:.2} (area ratio {area_ratio:.2}, not scored)"),
            Measurement::SizeRatio {
                size_ratio,
                area_ratio,
            },
        )
    }
}

/// `min / max`, or 0 when either side is zero.
fn ratio(a: u64, b: u64) -> f64 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    if lo == 0 {
        0.0
    } else {
        lo as f64 / hi as f64
    }
}
