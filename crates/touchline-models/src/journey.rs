//! Journey types: touchpoints, paths and attribution results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use touchline_data::{Channel, ChannelGrouping, EventType, RawEvent};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// One channel-attributed marketing exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Touchpoint {
    /// Source event id
    pub event_id: String,
    /// Session the event happened in; empty when unknown
    pub session_id: String,
    /// Identity id carried by the event
    pub user_id: Option<String>,
    /// When the exposure happened
    pub timestamp: DateTime<Utc>,
    /// Channel descriptor
    pub channel: Channel,
    /// Event type of the exposure
    pub event_type: EventType,
    /// Page the exposure landed on
    pub page_url: Option<String>,
}

impl Touchpoint {
    /// Build a touchpoint from a channel-bearing event.
    pub fn from_event(event: &RawEvent) -> Option<Self> {
        let channel = event.channel()?;
        Some(Self {
            event_id: event.event_id.clone(),
            session_id: event.session_id.clone().unwrap_or_default(),
            user_id: event.user_id.clone(),
            timestamp: event.timestamp,
            channel,
            event_type: event.event_type.clone(),
            page_url: event.page_url.clone(),
        })
    }

    /// Minimal touchpoint for a channel at a point in time.
    pub fn new(event_id: impl Into<String>, timestamp: DateTime<Utc>, channel: Channel) -> Self {
        Self {
            event_id: event_id.into(),
            session_id: String::new(),
            user_id: None,
            timestamp,
            channel,
            event_type: EventType::PageView,
            page_url: None,
        }
    }

    /// Fractional days between this touchpoint and `at`, clamped at zero.
    pub fn days_before(&self, at: DateTime<Utc>) -> f64 {
        let seconds = (at - self.timestamp).num_milliseconds() as f64 / 1000.0;
        (seconds / SECONDS_PER_DAY).max(0.0)
    }
}

/// Ordered touchpoints leading to one conversion, or to none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionPath {
    /// Conversion event id, or a synthetic id for non-converting journeys
    pub conversion_id: String,
    /// Resolved identity id, if the journey could be tied to one
    pub identity_id: Option<String>,
    /// Anonymous ids merged under the identity
    pub anonymous_ids: Vec<String>,
    /// Touchpoints in chronological order
    pub touchpoints: Vec<Touchpoint>,
    /// Conversion time; the build time for non-converting journeys
    pub converted_at: DateTime<Utc>,
    /// Conversion value in minor units; 0 for non-converting journeys
    pub conversion_value: f64,
    /// Conversion event type; `None` for non-converting journeys
    pub conversion_type: Option<EventType>,
}

impl ConversionPath {
    /// Create a converting path.
    pub fn new(
        conversion_id: impl Into<String>,
        touchpoints: Vec<Touchpoint>,
        converted_at: DateTime<Utc>,
        conversion_value: f64,
    ) -> Self {
        Self {
            conversion_id: conversion_id.into(),
            identity_id: None,
            anonymous_ids: Vec::new(),
            touchpoints,
            converted_at,
            conversion_value,
            conversion_type: Some(EventType::Conversion),
        }
    }

    /// Create a non-converting path.
    pub fn non_converting(
        path_id: impl Into<String>,
        touchpoints: Vec<Touchpoint>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            conversion_id: path_id.into(),
            identity_id: None,
            anonymous_ids: Vec::new(),
            touchpoints,
            converted_at: observed_at,
            conversion_value: 0.0,
            conversion_type: None,
        }
    }

    /// Whether the path ended in a conversion.
    pub const fn is_converting(&self) -> bool {
        self.conversion_type.is_some()
    }

    /// Number of touchpoints.
    pub fn len(&self) -> usize {
        self.touchpoints.len()
    }

    /// Whether the path has no touchpoints.
    pub fn is_empty(&self) -> bool {
        self.touchpoints.is_empty()
    }

    /// Node labels in touchpoint order.
    pub fn labels(&self, grouping: ChannelGrouping) -> Vec<String> {
        self.touchpoints
            .iter()
            .map(|t| t.channel.label(grouping))
            .collect()
    }

    /// Distinct node labels present in the path.
    pub fn distinct_labels(&self, grouping: ChannelGrouping) -> BTreeSet<String> {
        self.touchpoints
            .iter()
            .map(|t| t.channel.label(grouping))
            .collect()
    }

    /// Days from the earliest touchpoint to the conversion, or 0.
    pub fn days_to_convert(&self) -> f64 {
        self.touchpoints
            .iter()
            .map(|t| t.timestamp)
            .min()
            .map_or(0.0, |first| {
                let seconds = (self.converted_at - first).num_milliseconds() as f64 / 1000.0;
                (seconds / SECONDS_PER_DAY).max(0.0)
            })
    }
}

/// A touchpoint with its share of a conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedTouchpoint {
    /// The credited touchpoint
    #[serde(flatten)]
    pub touchpoint: Touchpoint,
    /// Credit in conversion value units
    pub credit: f64,
    /// Credit as a percentage of the conversion (0-100)
    pub credit_percentage: f64,
}

/// Attribution of one path under one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResult {
    /// Path (conversion) id
    pub path_id: String,
    /// Model name
    pub model: String,
    /// Credited touchpoints in chronological order
    pub touchpoints: Vec<AttributedTouchpoint>,
    /// Number of touchpoints in the path
    pub path_length: usize,
    /// Days from the first touchpoint to the conversion
    pub days_to_convert: f64,
}

impl AttributionResult {
    /// Wrap credited touchpoints for a path.
    pub fn new(
        path: &ConversionPath,
        model: impl Into<String>,
        touchpoints: Vec<AttributedTouchpoint>,
    ) -> Self {
        Self {
            path_id: path.conversion_id.clone(),
            model: model.into(),
            path_length: path.len(),
            days_to_convert: path.days_to_convert(),
            touchpoints,
        }
    }

    /// Total credit handed out.
    pub fn total_credit(&self) -> f64 {
        self.touchpoints.iter().map(|t| t.credit).sum()
    }
}

/// Output of the path builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathSet {
    /// One path per conversion event
    pub conversion_paths: Vec<ConversionPath>,
    /// One path per identity that never converted
    pub non_conversion_paths: Vec<ConversionPath>,
    /// Events without any identity, anonymous or session id
    pub dropped_events: usize,
}

impl PathSet {
    /// Total number of paths.
    pub fn len(&self) -> usize {
        self.conversion_paths.len() + self.non_conversion_paths.len()
    }

    /// Whether no path was built.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converted fraction of all paths.
    pub fn conversion_rate(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.conversion_paths.len() as f64 / self.len() as f64
    }
}
