//! Glue between the command line and the Touchline crates.
//!
//! Event files and identity maps are loaded by the pipeline, funnel exports are
//! imported into the SQLite store, and the store lives under the platform
//! cache directory unless a path is given.

pub(crate) mod cache_manager;
pub(crate) mod event_pipeline;
pub(crate) mod funnel_import;
