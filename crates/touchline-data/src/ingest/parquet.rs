//! Parquet reading and writing through polars.

use super::EventRecord;
use crate::error::Result;
use crate::event::RawEvent;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let Ok(column) = df.column(name) else {
        return Ok(vec![None; df.height()]);
    };

    let column = column.cast(&DataType::String)?;
    let values = column.str()?;
    Ok(values
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let Ok(column) = df.column(name) else {
        return Ok(vec![None; df.height()]);
    };

    let column = column.cast(&DataType::Float64)?;
    let values = column.f64()?;
    Ok(values.into_iter().collect())
}

/// Read event records from a Parquet file.
///
/// Datetime columns are cast to strings and re-parsed during validation, so
/// both timestamp-typed and string-typed `timestamp` columns are accepted.
pub fn read_records(path: &Path) -> Result<Vec<EventRecord>> {
    let file = File::open(path)?;
    let df = ParquetReader::new(file).finish()?;

    let ids = string_column(&df, "id")?;
    let event_ids = string_column(&df, "event_id")?;
    let timestamps = string_column(&df, "timestamp")?;
    let event_types = string_column(&df, "event_type")?;
    let values = float_column(&df, "event_value")?;
    let currencies = string_column(&df, "currency")?;
    let user_ids = string_column(&df, "user_id")?;
    let anonymous_ids = string_column(&df, "anonymous_id")?;
    let session_ids = string_column(&df, "session_id")?;
    let sources = string_column(&df, "utm_source")?;
    let mediums = string_column(&df, "utm_medium")?;
    let campaigns = string_column(&df, "utm_campaign")?;
    let pages = string_column(&df, "page_url")?;
    let devices = string_column(&df, "device_type")?;
    let browsers = string_column(&df, "browser")?;
    let countries = string_column(&df, "country")?;

    let records = (0..df.height())
        .map(|i| EventRecord {
            id: ids[i].clone(),
            event_id: event_ids[i].clone(),
            timestamp: timestamps[i].clone(),
            event_type: event_types[i].clone(),
            event_value: values[i],
            currency: currencies[i].clone(),
            user_id: user_ids[i].clone(),
            anonymous_id: anonymous_ids[i].clone(),
            session_id: session_ids[i].clone(),
            utm_source: sources[i].clone(),
            utm_medium: mediums[i].clone(),
            utm_campaign: campaigns[i].clone(),
            page_url: pages[i].clone(),
            device_type: devices[i].clone(),
            browser: browsers[i].clone(),
            country: countries[i].clone(),
        })
        .collect();

    Ok(records)
}

/// Write events to a Parquet file. Timestamps are stored as RFC 3339 strings.
pub fn write_events(events: &[RawEvent], path: &Path) -> Result<()> {
    let optional = |f: fn(&RawEvent) -> &Option<String>| -> Vec<Option<String>> {
        events.iter().map(|e| f(e).clone()).collect()
    };

    let event_ids: Vec<String> = events.iter().map(|e| e.event_id.clone()).collect();
    let timestamps: Vec<String> = events.iter().map(|e| e.timestamp.to_rfc3339()).collect();
    let event_types: Vec<String> = events.iter().map(|e| e.event_type.to_string()).collect();
    let values: Vec<f64> = events.iter().map(|e| e.event_value).collect();
    let currencies: Vec<String> = events.iter().map(|e| e.currency.clone()).collect();

    let mut df = DataFrame::new(vec![
        Series::new("event_id".into(), event_ids).into(),
        Series::new("timestamp".into(), timestamps).into(),
        Series::new("event_type".into(), event_types).into(),
        Series::new("event_value".into(), values).into(),
        Series::new("currency".into(), currencies).into(),
        Series::new("user_id".into(), optional(|e| &e.user_id)).into(),
        Series::new("anonymous_id".into(), optional(|e| &e.anonymous_id)).into(),
        Series::new("session_id".into(), optional(|e| &e.session_id)).into(),
        Series::new("utm_source".into(), optional(|e| &e.utm_source)).into(),
        Series::new("utm_medium".into(), optional(|e| &e.utm_medium)).into(),
        Series::new("utm_campaign".into(), optional(|e| &e.utm_campaign)).into(),
        Series::new("page_url".into(), optional(|e| &e.page_url)).into(),
        Series::new("device_type".into(), optional(|e| &e.device_type)).into(),
        Series::new("browser".into(), optional(|e| &e.browser)).into(),
        Series::new("country".into(), optional(|e| &e.country)).into(),
    ])?;

    let mut file = File::create(path)?;
    ParquetWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}
