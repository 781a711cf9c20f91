#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/touchline-analytics/touchline/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod report;
pub mod summary;
pub mod tables;

pub use export::{
    ChannelRow, CreditRow, ExportError, ExportFormat, Exporter, StageRow, TouchpointRow,
};
pub use report::{Report, ReportBuilder, ReportError};
pub use summary::{ComparisonRow, ModelComparison, compare_models};
pub use tables::{ChannelTable, CreditTable, StageTable};
