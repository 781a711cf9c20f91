#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/touchline-analytics/touchline/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;

// Re-export main types from sub-crates
pub use touchline_algorithmic as algorithmic;
pub use touchline_data as data;
pub use touchline_models as models;
pub use touchline_output as output;

pub use config::EngineConfig;
pub use engine::{
    AttributionEngine, AttributionModel, EngineRun, GlobalCredits, ModelConfig, attribute_events,
    attribute_path,
};
pub use error::EngineError;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
