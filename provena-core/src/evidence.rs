//! Evidence and verdict types emitted by the decision engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One rule's contribution for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub rule_name: String,
    /// Always within `0..=max_points`
    pub points_awarded: u32,
    pub max_points: u32,
    pub explanation: String,
}

impl EvidenceRecord {
    /// Build a record, clamping `points_awarded` to `max_points`.
    pub fn new(
        rule_name: impl Into<String>,
        points_awarded: u32,
        max_points: u32,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            points_awarded: points_awarded.min(max_points),
            max_points,
            explanation: explanation.into(),
        }
    }

    /// Whether the rule contributed any points.
    pub fn fired(&self) -> bool {
        self.points_awarded > 0
    }
}

/// Final decision for a probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum Verdict {
    /// The probe derives from the named corpus entry
    Match(String),
    /// No corpus entry is a confident match
    Rejected,
}

impl Verdict {
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Self::Match(id) => Some(id),
            Self::Rejected => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Match(id) => write!(f, "{id}"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Verdict plus the itemized evidence behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub verdict: Verdict,
    pub total_score: u32,
    /// Sum of `max_points` over `evidence`
    pub max_total: u32,
    pub evidence: Vec<EvidenceRecord>,
    /// One-line human explanation of the decision
    pub reason: String,
}

impl MatchResult {
    pub fn new(
        verdict: Verdict,
        total_score: u32,
        evidence: Vec<EvidenceRecord>,
        reason: impl Into<String>,
    ) -> Self {
        let max_total = evidence.iter().map(|e| e.max_points).sum();
        Self {
            verdict,
            total_score,
            max_total,
            evidence,
            reason: reason.into(),
        }
    }

    /// The verdict for an empty corpus: rejected, score 0, no evidence.
    pub fn empty_corpus() -> Self {
        Self::new(Verdict::Rejected, 0, Vec::new(), "Corpus is empty")
    }

    pub fn target_id(&self) -> Option<&str> {
        self.verdict.target_id()
    }

    pub fn is_rejected(&self) -> bool {
        self.verdict.is_rejected()
    }
}
