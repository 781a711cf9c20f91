//! Event and identity loading for the attribution commands.

use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use touchline_data::{DataError, EventFormat, IdentityMap, RawEvent, load_events};

/// Where the attribution input comes from.
#[derive(Debug, Clone)]
pub(crate) struct InputConfig {
    /// Event export file
    pub events: PathBuf,
    /// Format override; detected from the extension when unset
    pub format: Option<EventFormat>,
    /// Optional JSON identity map (`{"identity": ["anon", ...]}`)
    pub identities: Option<PathBuf>,
}

/// Validated events and the identity map to stitch them with.
#[derive(Debug)]
pub(crate) struct EventInput {
    /// Events in file order
    pub events: Vec<RawEvent>,
    /// Identity → anonymous ids
    pub identities: IdentityMap,
    /// Rows dropped during validation
    pub skipped: usize,
}

/// Load events and identities, reporting progress on `progress` when given.
pub(crate) fn load_input(
    config: &InputConfig,
    progress: Option<&ProgressBar>,
) -> Result<EventInput, DataError> {
    if let Some(pb) = progress {
        pb.set_message(format!("Reading {}...", display_name(&config.events)));
    }
    let loaded = load_events(&config.events, config.format)?;

    let identities = match &config.identities {
        Some(path) => {
            if let Some(pb) = progress {
                pb.set_message(format!("Reading {}...", display_name(path)));
            }
            IdentityMap::from_json_file(path)?
        }
        None => IdentityMap::new(),
    };

    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Loaded {} events, {} identities ({} rows skipped)",
            loaded.events.len(),
            identities.len(),
            loaded.skipped
        ));
    }

    Ok(EventInput {
        events: loaded.events,
        identities,
        skipped: loaded.skipped,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_csv_with_identities() {
        let dir = tempfile::tempdir().unwrap();
        let events_path = dir.path().join("events.csv");
        let mut file = std::fs::File::create(&events_path).unwrap();
        writeln!(file, "event_id,event_type,timestamp,user_id,anonymous_id,utm_source,event_value").unwrap();
        writeln!(file, "e1,page_view,2024-03-01T10:00:00Z,,anon-1,google,").unwrap();
        writeln!(file, "e2,purchase,2024-03-02T10:00:00Z,u1,,,120").unwrap();
        drop(file);

        let identities_path = dir.path().join("identities.json");
        std::fs::write(&identities_path, r#"{"u1": ["anon-1"]}"#).unwrap();

        let input = load_input(
            &InputConfig {
                events: events_path,
                format: None,
                identities: Some(identities_path),
            },
            None,
        )
        .unwrap();

        assert_eq!(input.events.len(), 2);
        assert_eq!(input.identities.len(), 1);
        assert_eq!(input.skipped, 0);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let config = InputConfig {
            events: PathBuf::from("/nonexistent/events.csv"),
            format: None,
            identities: None,
        };
        assert!(load_input(&config, None).is_err());
    }
}
