//! Subcommand implementations.

pub mod batch;
pub mod evaluate;
pub mod r#match;
pub mod validate;

use clap::Args;
use provena_core::{
    DecisionEngine, ExtractorConfig, FusionPolicy, RansacConfig, RuleSet, RuleSetSelector,
    SignatureExtractor,
};

/// Rule set and fusion policy shared by every matching command.
#[derive(Args, Debug, Clone, Copy)]
pub struct RuleOptions {
    /// Rules to run: baseline (metadata, histogram, template) or extended (adds ORB geometry)
    #[arg(long, env = "PROVENA_RULE_SET", default_value_t = RuleSet::Baseline)]
    pub rule_set: RuleSet,

    /// How rule evidence becomes a verdict: weighted-sum or threshold-priority
    #[arg(long, env = "PROVENA_POLICY", default_value_t = FusionPolicy::WeightedSum)]
    pub policy: FusionPolicy,
}

impl RuleOptions {
    pub fn selector(&self) -> RuleSetSelector {
        RuleSetSelector::new(self.rule_set, self.policy)
    }

    /// Engine with extractor tuning taken from the environment.
    pub fn engine(&self) -> DecisionEngine {
        DecisionEngine::with_config(
            self.selector(),
            SignatureExtractor::new(ExtractorConfig::from_env()),
            RansacConfig::default(),
        )
    }
}
