//! SQLite store for funnel data and cached analyses.

use super::{AnalysisCache, CacheStats};
use crate::error::{DataError, Result};
use crate::funnel::{FunnelStage, StageTransition, TransitionSource, check_range};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use tracing::debug;

/// SQLite-backed funnel store and analysis cache.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Connection,
}

impl SqliteCache {
    /// Open (or create) a cache database.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS funnel_stages (
                org_id TEXT NOT NULL,
                stage_id TEXT NOT NULL,
                name TEXT NOT NULL,
                ordinal INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (org_id, stage_id)
            )",
            [],
        )?;

        // One row per day and stage pair
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS stage_transitions (
                org_id TEXT NOT NULL,
                date TEXT NOT NULL,
                from_stage TEXT NOT NULL,
                to_stage TEXT NOT NULL,
                visitors INTEGER NOT NULL,
                transitions INTEGER NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (org_id, date, from_stage, to_stage)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transitions_org_date ON stage_transitions(org_id, date)",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS analysis_cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                cached_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Insert or replace one funnel stage.
    pub fn put_stage(&self, org_id: &str, stage: &FunnelStage) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT OR REPLACE INTO funnel_stages (org_id, stage_id, name, ordinal, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![org_id, stage.id, stage.name, stage.ordinal, updated_at],
        )?;

        Ok(())
    }

    /// Insert or replace several stages in one transaction.
    pub fn put_stages(&self, org_id: &str, stages: &[FunnelStage]) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;

        for stage in stages {
            tx.execute(
                "INSERT OR REPLACE INTO funnel_stages (org_id, stage_id, name, ordinal, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![org_id, stage.id, stage.name, stage.ordinal, updated_at],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Store one day's transition row.
    pub fn put_transition(
        &self,
        org_id: &str,
        date: NaiveDate,
        transition: &StageTransition,
    ) -> Result<()> {
        self.put_transitions_batch(org_id, &[(date, transition.clone())])
    }

    /// Store daily transition rows in one transaction.
    pub fn put_transitions_batch(
        &self,
        org_id: &str,
        rows: &[(NaiveDate, StageTransition)],
    ) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;

        for (date, row) in rows {
            let visitors = i64::try_from(row.visitors)
                .map_err(|_| DataError::Parse(format!("visitor count too large: {}", row.visitors)))?;
            let transitions = i64::try_from(row.transitions).map_err(|_| {
                DataError::Parse(format!("transition count too large: {}", row.transitions))
            })?;

            tx.execute(
                "INSERT OR REPLACE INTO stage_transitions
                 (org_id, date, from_stage, to_stage, visitors, transitions, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    org_id,
                    date.to_string(),
                    row.from_stage,
                    row.to_stage,
                    visitors,
                    transitions,
                    cached_at
                ],
            )?;
        }

        tx.commit()?;
        debug!(org_id, rows = rows.len(), "Stored stage transitions");
        Ok(())
    }

    /// Delete expired analysis entries, returning how many were removed.
    pub fn clear_expired(&self) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM analysis_cache WHERE expires_at <= ?1",
            params![Utc::now().to_rfc3339()],
        )?;
        Ok(removed)
    }

    /// Clear all stored data.
    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM funnel_stages", [])?;
        self.conn.execute("DELETE FROM stage_transitions", [])?;
        self.conn.execute("DELETE FROM analysis_cache", [])?;
        Ok(())
    }

    /// Clear funnel data for one organization.
    pub fn clear_org(&self, org_id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM funnel_stages WHERE org_id = ?1", params![org_id])?;
        self.conn.execute(
            "DELETE FROM stage_transitions WHERE org_id = ?1",
            params![org_id],
        )?;
        Ok(())
    }

    /// Get cache statistics.
    pub fn get_stats(&self) -> Result<CacheStats> {
        let stages: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM funnel_stages", [], |row| row.get(0))?;

        let transitions: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM stage_transitions", [], |row| {
                    row.get(0)
                })?;

        let analyses: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM analysis_cache", [], |row| row.get(0))?;

        let live: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM analysis_cache WHERE expires_at > ?1",
            params![Utc::now().to_rfc3339()],
            |row| row.get(0),
        )?;

        Ok(CacheStats {
            funnel_stages: stages as usize,
            transition_rows: transitions as usize,
            cached_analyses: analyses as usize,
            live_analyses: live as usize,
        })
    }
}

impl TransitionSource for SqliteCache {
    fn stages(&self, org_id: &str) -> Result<Vec<FunnelStage>> {
        let mut stmt = self.conn.prepare(
            "SELECT stage_id, name, ordinal FROM funnel_stages
             WHERE org_id = ?1
             ORDER BY ordinal ASC, stage_id ASC",
        )?;

        let stages = stmt
            .query_map(params![org_id], |row| {
                Ok(FunnelStage {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    ordinal: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(stages)
    }

    fn transitions(
        &self,
        org_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StageTransition>> {
        check_range(start, end)?;

        let mut stmt = self.conn.prepare(
            "SELECT from_stage, to_stage, SUM(visitors), SUM(transitions)
             FROM stage_transitions
             WHERE org_id = ?1 AND date >= ?2 AND date <= ?3
             GROUP BY from_stage, to_stage
             ORDER BY from_stage, to_stage",
        )?;

        let rows = stmt
            .query_map(
                params![org_id, start.to_string(), end.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .map(|(from, to, visitors, transitions)| {
                StageTransition::new(from, to, visitors.max(0) as u64, transitions.max(0) as u64)
            })
            .collect())
    }
}

impl AnalysisCache for SqliteCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT value, expires_at FROM analysis_cache WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((value, expires_at)) = row else {
            return Ok(None);
        };

        let expires_at = DateTime::parse_from_rfc3339(&expires_at)
            .map_err(|e| DataError::Parse(format!("Invalid expiry for {key}: {e}")))?
            .with_timezone(&Utc);

        if expires_at <= Utc::now() {
            return Ok(None);
        }

        Ok(Some(value))
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let now = Utc::now();

        self.conn.execute(
            "INSERT OR REPLACE INTO analysis_cache (key, value, expires_at, cached_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, value, (now + ttl).to_rfc3339(), now.to_rfc3339()],
        )?;

        Ok(())
    }

    fn invalidate(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM analysis_cache WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::CONVERSION_STAGE;
    use approx::assert_relative_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    #[test]
    fn test_cache_initialization() {
        let cache = SqliteCache::in_memory();
        assert!(cache.is_ok());
    }

    #[test]
    fn test_cache_stats_empty() {
        let cache = SqliteCache::in_memory().unwrap();
        assert_eq!(cache.get_stats().unwrap(), CacheStats::default());
    }

    #[test]
    fn test_stage_operations() {
        let cache = SqliteCache::in_memory().unwrap();
        cache
            .put_stages(
                "acme",
                &[
                    FunnelStage::new("checkout", "Checkout", 3),
                    FunnelStage::new("visit", "Visit", 1),
                    FunnelStage::new("signup", "Signup", 2),
                ],
            )
            .unwrap();

        let stages = cache.stages("acme").unwrap();
        let ids: Vec<_> = stages.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["visit", "signup", "checkout"]);

        // Replace keeps one row per stage id
        cache
            .put_stage("acme", &FunnelStage::new("visit", "Landing", 1))
            .unwrap();
        let stages = cache.stages("acme").unwrap();
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[0].name, "Landing");

        assert!(cache.stages("other").unwrap().is_empty());
    }

    #[test]
    fn test_transitions_aggregate_over_period() {
        let cache = SqliteCache::in_memory().unwrap();
        cache
            .put_transitions_batch(
                "acme",
                &[
                    (day(1), StageTransition::new("visit", "signup", 100, 20)),
                    (day(2), StageTransition::new("visit", "signup", 100, 40)),
                    (day(2), StageTransition::new("signup", CONVERSION_STAGE, 60, 30)),
                    (day(20), StageTransition::new("visit", "signup", 1000, 1000)),
                ],
            )
            .unwrap();

        let rows = cache.transitions("acme", day(1), day(7)).unwrap();
        assert_eq!(rows.len(), 2);

        let conversion = rows.iter().find(|r| r.is_conversion()).unwrap();
        assert_eq!(conversion.from_stage, "signup");
        assert_relative_eq!(conversion.transition_rate, 0.5);

        let visit = rows.iter().find(|r| r.from_stage == "visit").unwrap();
        assert_eq!(visit.visitors, 200);
        assert_eq!(visit.transitions, 60);
        assert_relative_eq!(visit.transition_rate, 0.3);

        assert!(cache.transitions("acme", day(8), day(19)).unwrap().is_empty());
        assert!(cache.transitions("acme", day(7), day(1)).is_err());
    }

    #[test]
    fn test_analysis_cache_ttl() {
        let cache = SqliteCache::in_memory().unwrap();
        cache.put("fresh", "{}", Duration::minutes(5)).unwrap();
        cache.put("stale", "{}", Duration::seconds(-5)).unwrap();

        assert_eq!(cache.get("fresh").unwrap().as_deref(), Some("{}"));
        assert_eq!(cache.get("stale").unwrap(), None);
        assert_eq!(cache.get("missing").unwrap(), None);

        let stats = cache.get_stats().unwrap();
        assert_eq!(stats.cached_analyses, 2);
        assert_eq!(stats.live_analyses, 1);

        assert_eq!(cache.clear_expired().unwrap(), 1);
        cache.invalidate("fresh").unwrap();
        assert_eq!(cache.get("fresh").unwrap(), None);
    }

    #[test]
    fn test_clear_operations() {
        let cache = SqliteCache::in_memory().unwrap();
        cache
            .put_stage("acme", &FunnelStage::new("visit", "Visit", 1))
            .unwrap();
        cache
            .put_transition("acme", day(1), &StageTransition::new("visit", "signup", 10, 1))
            .unwrap();
        cache
            .put_stage("globex", &FunnelStage::new("visit", "Visit", 1))
            .unwrap();

        cache.clear_org("acme").unwrap();
        assert!(cache.stages("acme").unwrap().is_empty());
        assert_eq!(cache.stages("globex").unwrap().len(), 1);

        cache.clear_all().unwrap();
        assert_eq!(cache.get_stats().unwrap(), CacheStats::default());
    }
}
