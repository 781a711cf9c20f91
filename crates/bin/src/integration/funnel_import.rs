//! Import of funnel exports into the SQLite store.
//!
//! ```json
//! {
//!   "org_id": "acme",
//!   "stages": [{"id": "landing", "name": "Landing", "ordinal": 1}],
//!   "transitions": [
//!     {"date": "2024-03-01", "from_stage": "landing", "to_stage": "conversion",
//!      "visitors": 1000, "transitions": 60}
//!   ]
//! }
//! ```

use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use touchline_data::{DataError, FunnelStage, SqliteCache, StageTransition};
use tracing::info;

/// Stage movement counted on one day.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DailyTransition {
    /// Day the movement was observed
    pub date: NaiveDate,
    /// Stage left
    pub from_stage: String,
    /// Stage entered
    pub to_stage: String,
    /// Visitors in `from_stage`
    pub visitors: u64,
    /// Visitors that moved on to `to_stage`
    pub transitions: u64,
}

/// One organization's funnel definition and observed traffic.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FunnelFile {
    /// Organization the funnel belongs to
    pub org_id: String,
    /// Stage definitions
    #[serde(default)]
    pub stages: Vec<FunnelStage>,
    /// Daily transition counts
    #[serde(default)]
    pub transitions: Vec<DailyTransition>,
}

impl FunnelFile {
    /// Parse a funnel export.
    pub(crate) fn from_json_str(json: &str) -> Result<Self, DataError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a funnel export from disk.
    pub(crate) fn from_json_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Write stages and transitions into `store`; returns the number of transition rows.
    pub(crate) fn import_into(&self, store: &SqliteCache) -> Result<usize, DataError> {
        store.put_stages(&self.org_id, &self.stages)?;

        let rows: Vec<(NaiveDate, StageTransition)> = self
            .transitions
            .iter()
            .map(|t| {
                (
                    t.date,
                    StageTransition::new(t.from_stage.clone(), t.to_stage.clone(), t.visitors, t.transitions),
                )
            })
            .collect();
        store.put_transitions_batch(&self.org_id, &rows)?;

        info!(
            org_id = %self.org_id,
            stages = self.stages.len(),
            transitions = rows.len(),
            "Imported funnel"
        );
        Ok(rows.len())
    }
}
