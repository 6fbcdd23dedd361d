//! Buffer cache hit ratio probe.

use std::time::Instant;

use postgres::Row;
use tracing::debug;

use super::PostgresProbes;
use super::queries::{CACHE_TOTALS_QUERY, build_index_heap_query, build_per_table_cache_query};
use crate::collector::ProbeError;
use crate::model::{CacheHitReport, CacheTotals, IndexHeapRow, PerTableCacheRow, Section};

impl PostgresProbes {
    /// Instance totals, worst tables and index/heap access split.
    pub fn cache_hit(&self) -> Result<CacheHitReport, ProbeError> {
        let section = Section::CacheHitRatio;
        let started = Instant::now();
        let limits = self.settings.limits;
        let mut session = self.open(section)?;

        let totals = session.query_one(CACHE_TOTALS_QUERY, &[])?;
        // Ratio computed here from the same sums it is reported with.
        let total = CacheTotals::new(
            totals.try_get(0).unwrap_or(0),
            totals.try_get(1).unwrap_or(0),
        );

        let per_table = session
            .query(&build_per_table_cache_query(), &[&limits.per_table_cache])?
            .iter()
            .map(per_table_from_row)
            .collect::<Vec<_>>();

        let index_heap_ratio = session
            .query(&build_index_heap_query(), &[&limits.index_heap])?
            .iter()
            .map(index_heap_from_row)
            .collect::<Vec<_>>();

        debug!(
            %section,
            ratio = ?total.ratio,
            per_table = per_table.len(),
            index_heap = index_heap_ratio.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "probe done"
        );
        Ok(CacheHitReport {
            total,
            per_table,
            index_heap_ratio,
        })
    }
}

fn clamp_pct(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) }
}

fn per_table_from_row(row: &Row) -> PerTableCacheRow {
    PerTableCacheRow {
        schema: row.try_get(0).unwrap_or_default(),
        table: row.try_get(1).unwrap_or_default(),
        heap_hits: row.try_get(2).unwrap_or(0),
        heap_reads: row.try_get(3).unwrap_or(0),
        hit_ratio_pct: clamp_pct(row.try_get(4).unwrap_or(0.0)),
    }
}

fn index_heap_from_row(row: &Row) -> IndexHeapRow {
    IndexHeapRow {
        schema: row.try_get(0).unwrap_or_default(),
        table: row.try_get(1).unwrap_or_default(),
        heap_blocks: row.try_get(2).unwrap_or(0),
        index_blocks: row.try_get(3).unwrap_or(0),
        index_ratio_pct: clamp_pct(row.try_get(4).unwrap_or(0.0)),
    }
}
