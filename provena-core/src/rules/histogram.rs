use super::{scaled_points, ComparisonRule, Measurement, RuleOutcome};
use crate::constants::HISTOGRAM_MAX_POINTS;
use crate::signature::{ProbeImage, Signature};

/// Scores the correlation between probe and target color histograms.
///
/// Robust to crops and geometric edits; weak against color and brightness shifts.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistogramRule;

impl ComparisonRule for HistogramRule {
    fn name(&self) -> &'static str {
        "Histogram"
    }

    fn max_points(&self) -> u32 {
        HISTOGRAM_MAX_POINTS
    }

    fn evaluate(&self, target: &Signature, probe: &ProbeImage) -> RuleOutcome {
        let correlation = probe
            .signature
            .color_histogram
            .correlation(&target.color_histogram);

        RuleOutcome::new(
            self,
            scaled_points(correlation, self.max_points()),
            format!("Correlation {correlation:.2}"),
            Measurement::Correlation { correlation },
        )
    }
}
