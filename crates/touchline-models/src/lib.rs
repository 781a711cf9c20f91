#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/touchline-analytics/touchline/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod aggregator;
pub mod direct;
pub mod error;
pub mod journey;
pub mod path_builder;
pub mod registry;

pub use aggregator::{AggregatedAttribution, aggregate};
pub use direct::{
    PositionWeights, TimeDecayConfig, first_touch, last_touch, linear, position_based, time_decay,
};
pub use error::ModelError;
pub use journey::{AttributedTouchpoint, AttributionResult, ConversionPath, PathSet, Touchpoint};
pub use path_builder::{PathBuilder, PathBuilderConfig};
pub use registry::{
    ModelCategory, ModelInfo, available_models, get_model_info, models_by_category,
};
