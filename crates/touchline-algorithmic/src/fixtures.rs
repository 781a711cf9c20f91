//! Shared path fixtures for unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use touchline_data::Channel;
use touchline_models::{ConversionPath, Touchpoint};

pub(crate) fn end_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap()
}

/// Path over `sources`, one hour apart and ending an hour before `end_time`.
pub(crate) fn path(id: &str, sources: &[&str], converted: bool) -> ConversionPath {
    let end = end_time();
    let touchpoints = sources
        .iter()
        .enumerate()
        .map(|(i, s)| {
            Touchpoint::new(
                format!("{id}-{i}"),
                end - Duration::hours((sources.len() - i) as i64),
                Channel::new(*s, None, None),
            )
        })
        .collect();
    if converted {
        ConversionPath::new(id, touchpoints, end, 100.0)
    } else {
        ConversionPath::non_converting(id, touchpoints, end)
    }
}

/// `count` copies of the same path shape.
pub(crate) fn repeat(prefix: &str, count: usize, sources: &[&str], converted: bool) -> Vec<ConversionPath> {
    (0..count)
        .map(|i| path(&format!("{prefix}{i}"), sources, converted))
        .collect()
}
