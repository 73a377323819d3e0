//! Decision engine.
//!
//! Runs the selected rule set against every corpus entry and fuses the
//! per-target evidence into one [`MatchResult`] with one of two policies:
//!
//! - **Weighted sum**: total the enabled rules' points per target, keep the
//!   first strictly greatest total, reject if it is below
//!   [`WEIGHTED_SUM_REJECTION_FLOOR`].
//! - **Threshold priority**: track the best inlier count and the best
//!   histogram correlation independently, then decide geometry first,
//!   histogram second, otherwise reject.
//!
//! Fusion is a pure function of the evaluations, which are produced in corpus
//! order regardless of how the scan is parallelized.

use std::fmt;
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use crate::config::{FusionPolicy, RansacConfig, RuleSet, RuleSetSelector};
use crate::constants::{
    HISTOGRAM_FALLBACK_CORRELATION, STRONG_GEOMETRY_INLIERS, WEIGHTED_SUM_REJECTION_FLOOR,
};
use crate::corpus::TargetCorpus;
use crate::evidence::{EvidenceRecord, MatchResult, Verdict};
use crate::rules::{rules_for, ComparisonRule, Measurement, RuleOutcome};
use crate::signature::{ProbeImage, Signature, SignatureExtractor};

/// Every rule outcome for one corpus entry, in rule order.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetEvaluation {
    pub target_id: String,
    pub outcomes: Vec<RuleOutcome>,
}

impl TargetEvaluation {
    pub fn new(target_id: impl Into<String>, outcomes: Vec<RuleOutcome>) -> Self {
        Self {
            target_id: target_id.into(),
            outcomes,
        }
    }

    /// Sum of awarded points over all outcomes.
    pub fn total_points(&self) -> u32 {
        self.outcomes.iter().map(RuleOutcome::points).sum()
    }

    pub fn max_points(&self) -> u32 {
        self.outcomes.iter().map(|o| o.record.max_points).sum()
    }

    pub fn evidence(&self) -> Vec<EvidenceRecord> {
        self.outcomes.iter().map(|o| o.record.clone()).collect()
    }

    /// The geometric outcome and its inlier count, if geometry ran.
    fn geometry(&self) -> Option<(&RuleOutcome, usize)> {
        self.outcomes.iter().find_map(|o| match o.measurement {
            Measurement::Geometry { inliers, .. } => Some((o, inliers)),
            _ => None,
        })
    }

    /// The histogram outcome and its correlation.
    fn histogram(&self) -> Option<(&RuleOutcome, f64)> {
        self.outcomes.iter().find_map(|o| match o.measurement {
            Measurement::Correlation { correlation } => Some((o, correlation)),
            _ => None,
        })
    }

    pub fn inliers(&self) -> Option<usize> {
        self.geometry().map(|(_, n)| n)
    }

    pub fn correlation(&self) -> Option<f64> {
        self.histogram().map(|(_, c)| c)
    }
}

/// Weighted-sum fusion.
///
/// Ties keep the first evaluation in slice order. A best total below
/// [`WEIGHTED_SUM_REJECTION_FLOOR`] is rejected but still reports the
/// runner's score and evidence.
pub fn fuse_weighted_sum(evaluations: &[TargetEvaluation]) -> MatchResult {
    let Some((first, rest)) = evaluations.split_first() else {
        return MatchResult::empty_corpus();
    };

    let mut best = first;
    let mut best_total = first.total_points();
    for evaluation in rest {
        let total = evaluation.total_points();
        if total > best_total {
            best = evaluation;
            best_total = total;
        }
    }

    let max_total = best.max_points();
    if best_total < WEIGHTED_SUM_REJECTION_FLOOR {
        MatchResult::new(
            Verdict::Rejected,
            best_total,
            best.evidence(),
            format!(
                "Best total {best_total}/{max_total} below rejection floor {WEIGHTED_SUM_REJECTION_FLOOR}"
            ),
        )
    } else {
        MatchResult::new(
            Verdict::Match(best.target_id.clone()),
            best_total,
            best.evidence(),
            format!("Best total {best_total}/{max_total} for {}", best.target_id),
        )
    }
}

/// Threshold-priority fusion.
///
/// Inlier count and histogram correlation maxima are tracked independently
/// (first seen wins ties) and may belong to different targets. At least
/// [`STRONG_GEOMETRY_INLIERS`] inliers decides for the geometric best;
/// otherwise a correlation strictly above [`HISTOGRAM_FALLBACK_CORRELATION`]
/// decides for the histogram best; otherwise the probe is rejected.
pub fn fuse_threshold_priority(evaluations: &[TargetEvaluation]) -> MatchResult {
    if evaluations.is_empty() {
        return MatchResult::empty_corpus();
    }

    let mut best_geometry: Option<(&TargetEvaluation, &RuleOutcome, usize)> = None;
    let mut best_histogram: Option<(&TargetEvaluation, &RuleOutcome, f64)> = None;

    for evaluation in evaluations {
        if let Some((outcome, inliers)) = evaluation.geometry() {
            if best_geometry.map_or(true, |(_, _, best)| inliers > best) {
                best_geometry = Some((evaluation, outcome, inliers));
            }
        }
        if let Some((outcome, correlation)) = evaluation.histogram() {
            if best_histogram.map_or(true, |(_, _, best)| correlation > best) {
                best_histogram = Some((evaluation, outcome, correlation));
            }
        }
    }

    let evidence: Vec<EvidenceRecord> = best_geometry
        .map(|(_, o, _)| o.record.clone())
        .into_iter()
        .chain(best_histogram.map(|(_, o, _)| o.record.clone()))
        .collect();

    let max_inliers = best_geometry.map_or(0, |(_, _, n)| n);
    let max_correlation = best_histogram.map_or(0.0, |(_, _, c)| c);

    if let Some((target, outcome, inliers)) =
        best_geometry.filter(|&(_, _, n)| n >= STRONG_GEOMETRY_INLIERS)
    {
        return MatchResult::new(
            Verdict::Match(target.target_id.clone()),
            outcome.points(),
            evidence,
            format!("Strong geometric match ({inliers} RANSAC inliers)"),
        );
    }

    if let Some((target, outcome, correlation)) =
        best_histogram.filter(|&(_, _, c)| c > HISTOGRAM_FALLBACK_CORRELATION)
    {
        return MatchResult::new(
            Verdict::Match(target.target_id.clone()),
            outcome.points(),
            evidence,
            format!("High color similarity ({correlation:.3}) fallback"),
        );
    }

    MatchResult::new(
        Verdict::Rejected,
        0,
        evidence,
        format!(
            "No match: max geometric inliers {max_inliers}, max color correlation {max_correlation:.2}"
        ),
    )
}

/// Matches probes against a corpus with a fixed rule set and fusion policy.
///
/// Holds no per-query state; one engine can serve concurrent queries.
pub struct DecisionEngine {
    selector: RuleSetSelector,
    extractor: SignatureExtractor,
    rules: Vec<Box<dyn ComparisonRule>>,
}

impl DecisionEngine {
    pub fn new(selector: RuleSetSelector) -> Self {
        Self::with_config(selector, SignatureExtractor::default(), RansacConfig::default())
    }

    pub fn with_config(
        selector: RuleSetSelector,
        extractor: SignatureExtractor,
        ransac: RansacConfig,
    ) -> Self {
        if selector.policy == FusionPolicy::ThresholdPriority
            && selector.rule_set == RuleSet::Baseline
        {
            warn!(
                "Threshold-priority without geometric rule; only the histogram fallback can match"
            );
        }

        Self {
            selector,
            extractor,
            rules: rules_for(selector, &ransac),
        }
    }

    pub fn selector(&self) -> RuleSetSelector {
        self.selector
    }

    pub fn extractor(&self) -> &SignatureExtractor {
        &self.extractor
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn ComparisonRule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    /// Decode the probe at `path` and match it.
    ///
    /// Returns `None` if the probe cannot be decoded, which is distinct from a
    /// `Rejected` verdict.
    #[instrument(level = "info", skip_all, fields(probe = %path.as_ref().display()))]
    pub fn match_path(
        &self,
        path: impl AsRef<Path>,
        corpus: &TargetCorpus,
    ) -> Option<MatchResult> {
        match self.extractor.load_probe(path.as_ref()) {
            Ok(probe) => Some(self.match_probe(&probe, corpus)),
            Err(e) => {
                warn!(error = %e, "Probe could not be decoded");
                None
            }
        }
    }

    /// Match an already decoded probe against every corpus entry.
    pub fn match_probe(&self, probe: &ProbeImage, corpus: &TargetCorpus) -> MatchResult {
        if corpus.is_empty() {
            return MatchResult::empty_corpus();
        }

        // Indexed parallel collect keeps corpus order for the tie-break.
        let evaluations: Vec<TargetEvaluation> = corpus
            .entries()
            .par_iter()
            .map(|(id, signature)| self.evaluate_target(probe, id, signature))
            .collect();

        let result = match self.selector.policy {
            FusionPolicy::WeightedSum => fuse_weighted_sum(&evaluations),
            FusionPolicy::ThresholdPriority => fuse_threshold_priority(&evaluations),
        };

        debug!(
            verdict = %result.verdict,
            score = result.total_score,
            max = result.max_total,
            "Probe matched"
        );
        result
    }

    /// Run every rule the selector needs for one target.
    pub fn evaluate_target(
        &self,
        probe: &ProbeImage,
        target_id: &str,
        target: &Signature,
    ) -> TargetEvaluation {
        let outcomes: Vec<RuleOutcome> = self
            .rules
            .iter()
            .map(|rule| rule.evaluate(target, probe))
            .collect();

        let evaluation = TargetEvaluation::new(target_id, outcomes);
        debug!(
            target = target_id,
            total = evaluation.total_points(),
            "Target evaluated"
        );
        evaluation
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(RuleSetSelector::default())
    }
}

impl fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("selector", &self.selector)
            .field("rules", &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>())
            .finish()
    }
}
