//! Event file ingest.
//!
//! Reads event exports in CSV, JSON (array of records), JSON Lines or Parquet,
//! then validates and normalizes every row into a [`RawEvent`]. Unknown columns
//! (organization ids, row ids, attribution path strings) are ignored.

pub mod parquet;

use crate::error::{DataError, Result};
use crate::event::{DEFAULT_CURRENCY, EventType, RawEvent, parse_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Supported event file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// A JSON array of records.
    Json,
    /// One JSON record per line.
    JsonLines,
    /// Apache Parquet.
    Parquet,
}

impl EventFormat {
    /// Detect the format from a file extension, falling back to CSV.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => Self::Json,
            Some("jsonl") | Some("ndjson") => Self::JsonLines,
            Some("parquet") | Some("pq") => Self::Parquet,
            _ => Self::Csv,
        }
    }

    /// File extension for this format.
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::JsonLines => "jsonl",
            Self::Parquet => "parquet",
        }
    }
}

impl FromStr for EventFormat {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "jsonl" | "ndjson" => Ok(Self::JsonLines),
            "parquet" | "pq" => Ok(Self::Parquet),
            other => Err(DataError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// An event row as it appears in an export file, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventRecord {
    /// Storage row id; used as the event id when `event_id` is absent.
    pub id: Option<String>,
    /// Event identifier
    pub event_id: Option<String>,
    /// Timestamp string
    pub timestamp: Option<String>,
    /// Event type name
    pub event_type: Option<String>,
    /// Event value
    pub event_value: Option<f64>,
    /// Currency code
    pub currency: Option<String>,
    /// Identity id
    pub user_id: Option<String>,
    /// Anonymous id
    pub anonymous_id: Option<String>,
    /// Session id
    pub session_id: Option<String>,
    /// UTM source
    pub utm_source: Option<String>,
    /// UTM medium
    pub utm_medium: Option<String>,
    /// UTM campaign
    pub utm_campaign: Option<String>,
    /// Page url
    pub page_url: Option<String>,
    /// Device type
    pub device_type: Option<String>,
    /// Browser
    pub browser: Option<String>,
    /// Country
    pub country: Option<String>,
}

/// Validated events plus the number of rows that had to be dropped.
#[derive(Debug, Clone, Default)]
pub struct LoadedEvents {
    /// Validated events in file order
    pub events: Vec<RawEvent>,
    /// Rows skipped because their timestamp could not be parsed
    pub skipped: usize,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate and normalize raw records.
///
/// Missing event ids are generated, a missing event type defaults to
/// `conversion`, a missing value to 0 and a missing currency to `USD`. Rows
/// without a timestamp are stamped with `now`; rows whose timestamp does not
/// parse are skipped.
pub fn validate_events(records: Vec<EventRecord>, now: DateTime<Utc>) -> LoadedEvents {
    let mut loaded = LoadedEvents::default();

    for (row, record) in records.into_iter().enumerate() {
        let timestamp = match clean(record.timestamp) {
            None => now,
            Some(raw) => match parse_timestamp(&raw) {
                Some(ts) => ts,
                None => {
                    warn!(row, timestamp = %raw, "Skipping event with unparseable timestamp");
                    loaded.skipped += 1;
                    continue;
                }
            },
        };

        let event_id = clean(record.event_id)
            .or_else(|| clean(record.id))
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let event_type = clean(record.event_type)
            .map_or(EventType::Conversion, |name| EventType::parse(&name));

        let event_value = record
            .event_value
            .filter(|v| v.is_finite())
            .unwrap_or(0.0);

        let currency = clean(record.currency)
            .map_or_else(|| DEFAULT_CURRENCY.to_string(), |c| c.to_ascii_uppercase());

        loaded.events.push(RawEvent {
            event_id,
            timestamp,
            event_type,
            event_value,
            currency,
            user_id: clean(record.user_id),
            anonymous_id: clean(record.anonymous_id),
            session_id: clean(record.session_id),
            utm_source: clean(record.utm_source),
            utm_medium: clean(record.utm_medium),
            utm_campaign: clean(record.utm_campaign),
            page_url: clean(record.page_url),
            device_type: clean(record.device_type),
            browser: clean(record.browser),
            country: clean(record.country),
        });
    }

    loaded
}

/// Read unvalidated records from a file.
///
/// When `format` is `None` it is detected from the file extension.
pub fn read_records<P: AsRef<Path>>(path: P, format: Option<EventFormat>) -> Result<Vec<EventRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DataError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("File not found: {}", path.display()),
        )));
    }

    let format = format.unwrap_or_else(|| EventFormat::from_path(path));
    debug!(path = %path.display(), format = format.extension(), "Reading event file");

    let records = match format {
        EventFormat::Csv => {
            let mut reader = csv::Reader::from_path(path)?;
            reader
                .deserialize::<EventRecord>()
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        EventFormat::Json => {
            let reader = BufReader::new(File::open(path)?);
            serde_json::from_reader(reader)?
        }
        EventFormat::JsonLines => {
            let reader = BufReader::new(File::open(path)?);
            let mut records = Vec::new();
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                records.push(serde_json::from_str(&line)?);
            }
            records
        }
        EventFormat::Parquet => parquet::read_records(path)?,
    };

    Ok(records)
}

/// Read and validate events from a file.
pub fn load_events<P: AsRef<Path>>(path: P, format: Option<EventFormat>) -> Result<LoadedEvents> {
    let path = path.as_ref();
    let records = read_records(path, format)?;
    let total = records.len();
    let loaded = validate_events(records, Utc::now());

    info!(
        path = %path.display(),
        rows = total,
        events = loaded.events.len(),
        skipped = loaded.skipped,
        "Loaded events"
    );

    Ok(loaded)
}

/// Write events to a file in the given format.
pub fn write_events<P: AsRef<Path>>(events: &[RawEvent], path: P, format: EventFormat) -> Result<()> {
    let path = path.as_ref();

    match format {
        EventFormat::Csv => {
            let mut writer = csv::Writer::from_path(path)?;
            for event in events {
                writer.serialize(event)?;
            }
            writer.flush()?;
        }
        EventFormat::Json => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, events)?;
        }
        EventFormat::JsonLines => {
            let mut writer = BufWriter::new(File::create(path)?);
            for event in events {
                serde_json::to_writer(&mut writer, event)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        EventFormat::Parquet => parquet::write_events(events, path)?,
    }

    info!(path = %path.display(), events = events.len(), format = format.extension(), "Wrote events");
    Ok(())
}
