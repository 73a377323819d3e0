//! Comparison rules.
//!
//! Every rule compares one probe against one target signature and returns a
//! bounded number of points plus a human-readable justification. Rules are
//! stateless (`Send + Sync`) and are selected by an explicit
//! [`RuleSetSelector`], never discovered at runtime.
//!
//! | Rule | Max points | Signal |
//! |------|-----------:|--------|
//! | [`MetadataRule`] | 30 | file size ratio |
//! | [`HistogramRule`] | 30 | color histogram correlation |
//! | [`TemplateRule`] | 40 | normalized cross-correlation peak |
//! | [`GeometricFeatureRule`] | 50 | RANSAC homography inliers |

mod geometric;
mod histogram;
mod metadata;
mod template;

pub use geometric::GeometricFeatureRule;
pub use histogram::HistogramRule;
pub use metadata::MetadataRule;
pub use template::TemplateRule;

use serde::{Deserialize, Serialize};

use crate::config::{FusionPolicy, RansacConfig, RuleSet, RuleSetSelector};
use crate::evidence::EvidenceRecord;
use crate::signature::{ProbeImage, Signature};

/// Raw measurement behind a rule's points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Measurement {
    SizeRatio { size_ratio: f64, area_ratio: f64 },
    Correlation { correlation: f64 },
    TemplatePeak { max_value: f64 },
    Geometry { good_matches: usize, inliers: usize },
}

/// What a rule reports for one (probe, target) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub record: EvidenceRecord,
    pub measurement: Measurement,
}

impl RuleOutcome {
    pub fn new<R: ComparisonRule + ?Sized>(
        rule: &R,
        points: u32,
        explanation: impl Into<String>,
        measurement: Measurement,
    ) -> Self {
        Self {
            record: EvidenceRecord::new(rule.name(), points, rule.max_points(), explanation),
            measurement,
        }
    }

    pub fn points(&self) -> u32 {
        self.record.points_awarded
    }
}

/// Shared comparison contract.
pub trait ComparisonRule: Send + Sync {
    /// Short name used in evidence records.
    fn name(&self) -> &'static str;

    /// Upper bound on awarded points.
    fn max_points(&self) -> u32;

    /// Compare `probe` against `target`. Never fails: degenerate inputs
    /// produce zero points.
    fn evaluate(&self, target: &Signature, probe: &ProbeImage) -> RuleOutcome;
}

/// Instantiate the rules `selector` needs, in evaluation order.
///
/// Threshold-priority fusion reads only histogram correlation and inlier
/// counts, so under that policy the metadata and template rules are not
/// built.
pub fn rules_for(
    selector: RuleSetSelector,
    ransac: &RansacConfig,
) -> Vec<Box<dyn ComparisonRule>> {
    let mut rules: Vec<Box<dyn ComparisonRule>> = match selector.policy {
        FusionPolicy::WeightedSum => vec![
            Box::new(MetadataRule),
            Box::new(HistogramRule),
            Box::new(TemplateRule::default()),
        ],
        FusionPolicy::ThresholdPriority => vec![Box::new(HistogramRule)],
    };
    if selector.rule_set == RuleSet::Extended {
        rules.push(Box::new(GeometricFeatureRule::new(ransac.clone())));
    }
    rules
}

/// `floor(max(0, value) * max_points)`, capped at `max_points`.
pub(crate) fn scaled_points(value: f64, max_points: u32) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    let points = (value.max(0.0) * max_points as f64).floor();
    (points as u32).min(max_points)
}
