#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/touchline-analytics/touchline/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod error;
pub mod event;
pub mod funnel;
pub mod generator;
pub mod identity;
pub mod ingest;

pub use cache::{AnalysisCache, CacheStats, MemoryCache, SqliteCache};
pub use error::{DataError, Result};
pub use event::{Channel, ChannelGrouping, EventType, RawEvent, parse_timestamp};
pub use funnel::{CONVERSION_STAGE, FunnelStage, InMemoryFunnel, StageTransition, TransitionSource};
pub use generator::EventGenerator;
pub use identity::{AnonymousIndex, IdentityMap};
pub use ingest::{EventFormat, EventRecord, LoadedEvents, load_events, validate_events};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
