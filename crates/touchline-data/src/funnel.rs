//! Funnel stages and pre-aggregated stage transitions.
//!
//! Funnel analysis does not replay raw events. A job upstream rolls events up
//! into one row per `(day, from_stage, to_stage)` with the number of visitors
//! that were in `from_stage` and how many of them moved on. A
//! [`TransitionSource`] serves those rows aggregated over a reporting period.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Stage id of the absorbing conversion state.
pub const CONVERSION_STAGE: &str = "conversion";

/// An ordered stage of an organization's funnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelStage {
    /// Stage identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Position in the funnel; lower is earlier
    pub ordinal: i32,
}

impl FunnelStage {
    /// Create a stage.
    pub fn new(id: impl Into<String>, name: impl Into<String>, ordinal: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ordinal,
        }
    }
}

/// Observed movement between two stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransition {
    /// Stage the visitors were in
    pub from_stage: String,
    /// Stage they moved to; [`CONVERSION_STAGE`] for conversions
    pub to_stage: String,
    /// Visitors observed in `from_stage`
    pub visitors: u64,
    /// Visitors that moved to `to_stage`
    pub transitions: u64,
    /// `transitions / visitors`, 0 when there were no visitors
    pub transition_rate: f64,
}

impl StageTransition {
    /// Create a transition and derive its rate.
    pub fn new(
        from_stage: impl Into<String>,
        to_stage: impl Into<String>,
        visitors: u64,
        transitions: u64,
    ) -> Self {
        let transition_rate = if visitors == 0 {
            0.0
        } else {
            transitions as f64 / visitors as f64
        };

        Self {
            from_stage: from_stage.into(),
            to_stage: to_stage.into(),
            visitors,
            transitions,
            transition_rate,
        }
    }

    /// Whether this row ends in the conversion state.
    pub fn is_conversion(&self) -> bool {
        self.to_stage == CONVERSION_STAGE
    }
}

/// Sum daily rows per `(from, to)` pair and recompute the rate.
pub fn aggregate_transitions<'a, I>(rows: I) -> Vec<StageTransition>
where
    I: IntoIterator<Item = &'a StageTransition>,
{
    let mut totals: BTreeMap<(&str, &str), (u64, u64)> = BTreeMap::new();
    for row in rows {
        let entry = totals
            .entry((row.from_stage.as_str(), row.to_stage.as_str()))
            .or_default();
        entry.0 += row.visitors;
        entry.1 += row.transitions;
    }

    totals
        .into_iter()
        .map(|((from, to), (visitors, transitions))| {
            StageTransition::new(from, to, visitors, transitions)
        })
        .collect()
}

pub(crate) fn check_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(DataError::InvalidDateRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok(())
}

/// Read access to funnel definitions and transition aggregates.
pub trait TransitionSource {
    /// Stages of an organization's funnel, ordered by ordinal.
    fn stages(&self, org_id: &str) -> Result<Vec<FunnelStage>>;

    /// Transitions aggregated over `[start, end]` (inclusive days).
    fn transitions(
        &self,
        org_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StageTransition>>;
}

#[derive(Debug, Default)]
struct FunnelTables {
    stages: BTreeMap<String, Vec<FunnelStage>>,
    daily: Vec<(String, NaiveDate, StageTransition)>,
}

/// In-memory [`TransitionSource`] for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryFunnel {
    tables: RwLock<FunnelTables>,
}

impl InMemoryFunnel {
    /// Create an empty funnel store.
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> DataError {
        DataError::Cache("funnel store lock poisoned".to_string())
    }

    /// Replace the stages of an organization.
    pub fn put_stages(&self, org_id: &str, stages: Vec<FunnelStage>) -> Result<()> {
        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;
        tables.stages.insert(org_id.to_string(), stages);
        Ok(())
    }

    /// Record one day's transition row.
    pub fn put_transition(
        &self,
        org_id: &str,
        date: NaiveDate,
        transition: StageTransition,
    ) -> Result<()> {
        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;
        tables.daily.push((org_id.to_string(), date, transition));
        Ok(())
    }
}

impl TransitionSource for InMemoryFunnel {
    fn stages(&self, org_id: &str) -> Result<Vec<FunnelStage>> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        let mut stages = tables.stages.get(org_id).cloned().unwrap_or_default();
        stages.sort_by_key(|s| s.ordinal);
        Ok(stages)
    }

    fn transitions(
        &self,
        org_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StageTransition>> {
        check_range(start, end)?;
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        Ok(aggregate_transitions(
            tables
                .daily
                .iter()
                .filter(|(org, date, _)| org == org_id && *date >= start && *date <= end)
                .map(|(_, _, row)| row),
        ))
    }
}
