//! Path Builder
//!
//! Groups raw events into per-identity journeys and cuts them into one
//! conversion path per conversion event, bounded by the attribution window.
//!
//! An event belongs to the first identity that applies:
//! 1. its explicit identity (user) id
//! 2. the identity that owns its anonymous id in the identity map
//! 3. the anonymous id itself
//! 4. the session id
//!
//! Events with none of these are dropped and counted.

use crate::error::ModelError;
use crate::journey::{ConversionPath, PathSet, Touchpoint};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use touchline_data::{AnonymousIndex, IdentityMap, RawEvent};
use tracing::debug;

/// Configuration for the path builder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathBuilderConfig {
    /// Look-back window before a conversion in days (default: 30)
    pub attribution_window_days: i64,
}

impl Default for PathBuilderConfig {
    fn default() -> Self {
        Self {
            attribution_window_days: 30,
        }
    }
}

impl PathBuilderConfig {
    /// Check that the window is positive.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.attribution_window_days <= 0 {
            return Err(ModelError::InvalidConfig(format!(
                "attribution window must be positive, got {} days",
                self.attribution_window_days
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct JourneyGroup<'a> {
    identity_id: Option<String>,
    anonymous_ids: BTreeSet<String>,
    events: Vec<&'a RawEvent>,
}

/// Builds conversion and non-conversion paths from raw events.
#[derive(Debug, Clone)]
pub struct PathBuilder {
    config: PathBuilderConfig,
}

impl PathBuilder {
    /// Create a path builder with a validated configuration.
    pub fn new(config: PathBuilderConfig) -> Result<Self, ModelError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create a path builder with the default 30-day window.
    pub fn try_default() -> Result<Self, ModelError> {
        Self::new(PathBuilderConfig::default())
    }

    /// Active configuration.
    pub const fn config(&self) -> &PathBuilderConfig {
        &self.config
    }

    /// Build paths, stamping non-converting journeys with the current time.
    pub fn build(&self, events: &[RawEvent], identities: &IdentityMap) -> PathSet {
        self.build_at(events, identities, Utc::now())
    }

    /// Build paths with an explicit "now" for non-converting journeys.
    pub fn build_at(
        &self,
        events: &[RawEvent],
        identities: &IdentityMap,
        now: DateTime<Utc>,
    ) -> PathSet {
        let index = identities.inverted_index();
        let (groups, dropped_events) = group_events(events, &index);
        let window = Duration::days(self.config.attribution_window_days);

        let mut paths = PathSet {
            dropped_events,
            ..PathSet::default()
        };

        for (key, mut group) in groups {
            group.events.sort_by_key(|e| e.timestamp);

            if let Some(identity_id) = &group.identity_id {
                if let Some(known) = identities.anonymous_ids(identity_id) {
                    group.anonymous_ids.extend(known.iter().cloned());
                }
            }
            let anonymous_ids: Vec<String> = group.anonymous_ids.into_iter().collect();

            let mut converted = false;
            for (position, conversion) in group.events.iter().enumerate() {
                if !conversion.is_conversion() {
                    continue;
                }
                converted = true;

                let window_start = conversion.timestamp - window;
                let touchpoints = group
                    .events
                    .iter()
                    .enumerate()
                    .filter(|(i, e)| {
                        *i != position
                            && e.timestamp >= window_start
                            && e.timestamp <= conversion.timestamp
                    })
                    .filter_map(|(_, e)| Touchpoint::from_event(e))
                    .collect();

                paths.conversion_paths.push(ConversionPath {
                    conversion_id: conversion.event_id.clone(),
                    identity_id: group.identity_id.clone(),
                    anonymous_ids: anonymous_ids.clone(),
                    touchpoints,
                    converted_at: conversion.timestamp,
                    conversion_value: conversion.event_value,
                    conversion_type: Some(conversion.event_type.clone()),
                });
            }

            if converted {
                continue;
            }

            let touchpoints: Vec<Touchpoint> = group
                .events
                .iter()
                .filter_map(|e| Touchpoint::from_event(e))
                .collect();
            if touchpoints.is_empty() {
                continue;
            }

            paths.non_conversion_paths.push(ConversionPath {
                conversion_id: format!("nonconv-{key}"),
                identity_id: group.identity_id,
                anonymous_ids,
                touchpoints,
                converted_at: now,
                conversion_value: 0.0,
                conversion_type: None,
            });
        }

        debug!(
            events = events.len(),
            conversion_paths = paths.conversion_paths.len(),
            non_conversion_paths = paths.non_conversion_paths.len(),
            dropped = paths.dropped_events,
            "Built paths"
        );

        paths
    }
}

/// Group events by effective identity, keyed in sorted order.
fn group_events<'a>(
    events: &'a [RawEvent],
    index: &AnonymousIndex,
) -> (BTreeMap<String, JourneyGroup<'a>>, usize) {
    let mut groups: BTreeMap<String, JourneyGroup<'a>> = BTreeMap::new();
    let mut dropped = 0;

    for event in events {
        let anonymous_owner = event
            .anonymous_id
            .as_deref()
            .and_then(|anon| index.resolve(anon));

        let (key, identity_id) = if let Some(user_id) = &event.user_id {
            (user_id.clone(), Some(user_id.clone()))
        } else if let Some(owner) = anonymous_owner {
            (owner.to_string(), Some(owner.to_string()))
        } else if let Some(anonymous_id) = &event.anonymous_id {
            (anonymous_id.clone(), None)
        } else if let Some(session_id) = &event.session_id {
            (session_id.clone(), None)
        } else {
            dropped += 1;
            continue;
        };

        let group = groups.entry(key).or_default();
        if group.identity_id.is_none() {
            group.identity_id = identity_id;
        }
        if let Some(anonymous_id) = &event.anonymous_id {
            group.anonymous_ids.insert(anonymous_id.clone());
        }
        group.events.push(event);
    }

    (groups, dropped)
}
