#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/touchline-analytics/touchline/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod credits;
#[cfg(test)]
mod fixtures;
pub mod lift;
pub mod markov;
pub mod shapley;
pub mod stage;

// Re-export main types
pub use credits::{ChannelCredits, apply_channel_credits, normalize_scores};
pub use lift::{LiftAttributionResult, data_driven_lift, lift_credits};
pub use markov::{
    AbsorptionMethod, MarkovAnalysis, MarkovAttributionResult, MarkovConfig, MarkovError,
    MarkovModel, TransitionMatrix,
};
pub use shapley::{
    ShapleyAnalysis, ShapleyAttributionResult, ShapleyConfig, ShapleyError, ShapleyMode,
    ShapleyModel,
};
pub use stage::{
    AnalysisQuality, StageAnalysis, StageError, StageMarkovService, StageRemovalEffect,
    StageServiceConfig,
};
