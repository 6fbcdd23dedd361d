//! `pg_stat_statements` probes: long and frequent queries.

use std::time::Instant;

use postgres::Row;
use tracing::debug;

use super::queries::{build_frequent_queries_query, build_long_queries_query};
use super::{PostgresProbes, Session};
use crate::collector::ProbeError;
use crate::model::{FrequentQueryRow, LongQueryRow, Section};

impl PostgresProbes {
    /// Statements slower on average than the configured threshold.
    ///
    /// Empty when `pg_stat_statements` is not installed.
    pub fn long_queries(&self) -> Result<Vec<LongQueryRow>, ProbeError> {
        let section = Section::LongQueries;
        let started = Instant::now();
        let mut session = self.open(section)?;
        let Some(version) = statements_version(&mut session, section)? else {
            return Ok(Vec::new());
        };

        let threshold = self.settings.long_query_threshold_ms;
        let limit = self.settings.limits.long_queries;
        let rows = session.query(&build_long_queries_query(version), &[&threshold, &limit])?;
        let rows = retain_slow(rows.iter().map(long_query_from_row).collect(), threshold);

        debug!(%section, rows = rows.len(), elapsed_ms = started.elapsed().as_millis() as u64, "probe done");
        Ok(rows)
    }

    /// Most frequently called statements.
    ///
    /// Empty when `pg_stat_statements` is not installed.
    pub fn frequent_queries(&self) -> Result<Vec<FrequentQueryRow>, ProbeError> {
        let section = Section::FrequentQueries;
        let started = Instant::now();
        let mut session = self.open(section)?;
        let Some(version) = statements_version(&mut session, section)? else {
            return Ok(Vec::new());
        };

        let limit = self.settings.limits.frequent_queries;
        let rows: Vec<FrequentQueryRow> = session
            .query(&build_frequent_queries_query(version), &[&limit])?
            .iter()
            .map(frequent_query_from_row)
            .collect();

        debug!(%section, rows = rows.len(), elapsed_ms = started.elapsed().as_millis() as u64, "probe done");
        Ok(rows)
    }
}

/// Server version when the extension is usable, `None` when it is absent.
fn statements_version(session: &mut Session, section: Section) -> Result<Option<i32>, ProbeError> {
    if !session.statements_available()? {
        debug!(%section, "pg_stat_statements not installed, section left empty");
        return Ok(None);
    }
    session.server_version_num().map(Some)
}

/// Keeps rows whose mean time is strictly above `threshold_ms`.
pub fn retain_slow(mut rows: Vec<LongQueryRow>, threshold_ms: f64) -> Vec<LongQueryRow> {
    rows.retain(|r| r.mean_ms > threshold_ms);
    rows
}

fn long_query_from_row(row: &Row) -> LongQueryRow {
    LongQueryRow {
        query: row.try_get(0).unwrap_or_default(),
        total_ms: row.try_get(1).unwrap_or(0.0),
        mean_ms: row.try_get(2).unwrap_or(0.0),
        calls: row.try_get(3).unwrap_or(0),
        total_fmt: row.try_get(4).unwrap_or_default(),
        mean_fmt: row.try_get(5).unwrap_or_default(),
    }
}

fn frequent_query_from_row(row: &Row) -> FrequentQueryRow {
    FrequentQueryRow {
        query: row.try_get(0).unwrap_or_default(),
        calls: row.try_get::<_, i64>(1).unwrap_or(0).max(0),
        total_ms: row.try_get(2).unwrap_or(0.0),
        total_fmt: row.try_get(3).unwrap_or_default(),
        avg_per_call_fmt: row.try_get(4).unwrap_or_else(|_| "0ms".to_string()),
    }
}
