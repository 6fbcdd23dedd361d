//! Rows produced by the PostgreSQL probes.
//!
//! Each struct mirrors the columns of one probe query. Column origins are
//! noted where they are not obvious from the name.

use serde::{Deserialize, Serialize};

/// Statement whose mean execution time exceeds the slow-query threshold.
///
/// Source: `pg_stat_statements`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct LongQueryRow {
    pub query: String,
    /// Source: `total_exec_time` (`total_time` before PG 13)
    pub total_ms: f64,
    /// Source: `mean_exec_time` (`mean_time` before PG 13)
    pub mean_ms: f64,
    pub calls: i64,
    /// Server-side formatted `total_ms`.
    pub total_fmt: String,
    /// Server-side formatted `mean_ms`.
    pub mean_fmt: String,
}

/// Statement ranked by call count.
///
/// Source: `pg_stat_statements`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct FrequentQueryRow {
    pub query: String,
    pub calls: i64,
    pub total_ms: f64,
    pub total_fmt: String,
    /// `total / calls`, or `"0ms"` when `calls == 0`.
    pub avg_per_call_fmt: String,
}

/// Instance-wide buffer cache counters.
///
/// Source: `sum(blks_hit)`, `sum(blks_read)` over `pg_stat_database`
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct CacheTotals {
    pub hits: i64,
    pub reads: i64,
    /// `hits / (hits + reads)`, `None` when both are zero.
    pub ratio: Option<f64>,
}

impl CacheTotals {
    pub fn new(hits: i64, reads: i64) -> Self {
        let denom = hits.saturating_add(reads);
        let ratio = if denom > 0 {
            Some(hits as f64 / denom as f64)
        } else {
            None
        };
        Self { hits, reads, ratio }
    }

    /// Ratio as a percentage, 0 when unknown.
    pub fn ratio_pct(&self) -> f64 {
        self.ratio.map(|r| r * 100.0).unwrap_or(0.0)
    }
}

/// Heap cache hit ratio of one table.
///
/// Source: `pg_statio_user_tables`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct PerTableCacheRow {
    pub schema: String,
    pub table: String,
    pub heap_hits: i64,
    pub heap_reads: i64,
    /// 0..=100, two decimals.
    pub hit_ratio_pct: f64,
}

/// Share of block accesses going to index pages rather than heap pages.
///
/// Source: `pg_statio_user_tables`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct IndexHeapRow {
    pub schema: String,
    pub table: String,
    pub heap_blocks: i64,
    pub index_blocks: i64,
    /// 0..=100, two decimals.
    pub index_ratio_pct: f64,
}

/// Contents of the "Cache Hit Ratio" section.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct CacheHitReport {
    pub total: CacheTotals,
    /// Worst ratio first.
    pub per_table: Vec<PerTableCacheRow>,
    /// Highest index share first.
    pub index_heap_ratio: Vec<IndexHeapRow>,
}

/// Size of one non-template database.
///
/// Source: `pg_database`, `pg_database_size()`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct DbSizeRow {
    pub datname: String,
    pub size_pretty: String,
    pub size_bytes: i64,
}

/// Size of one user table: total, heap alone, and its indexes.
///
/// Total also counts TOAST, so heap plus indexes can be less than total.
///
/// Source: `pg_class` joined with `pg_namespace` and `pg_stat_all_tables`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct TableSizeRow {
    pub schema: String,
    pub table: String,
    pub total_pretty: String,
    pub table_pretty: String,
    pub index_pretty: String,
    /// `pg_total_relation_size()`
    pub total_bytes: i64,
    /// `pg_relation_size()`
    pub table_bytes: i64,
    /// `pg_indexes_size()`
    pub index_bytes: i64,
    /// Live tuples, falling back to `reltuples`, then 0.
    pub row_count: i64,
}

/// Size of one user index.
///
/// Source: `pg_index` + `pg_class` + `pg_namespace`, `pg_relation_size()`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct IndexSizeRow {
    pub schema: String,
    pub indexname: String,
    pub tablename: String,
    pub size_pretty: String,
    pub size_bytes: i64,
}

/// Scan counters and size of one index.
///
/// Source: `pg_stat_user_indexes` (NULL counters read as 0)
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct IndexUsageRow {
    pub schema: String,
    pub table: String,
    pub indexname: String,
    pub size_pretty: String,
    pub size_bytes: i64,
    pub idx_scan: i64,
    pub idx_tup_read: i64,
    pub idx_tup_fetch: i64,
}

/// Contents of the "Storage Usage" section.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct StorageReport {
    pub databases: Vec<DbSizeRow>,
    pub tables: Vec<TableSizeRow>,
    pub indexes: Vec<IndexSizeRow>,
    pub index_usage: Vec<IndexUsageRow>,
}

/// One attached standby.
///
/// Source: `pg_stat_replication`. Lag intervals are rendered by the server
/// as text and are `None` while the standby has not reported yet.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ReplicationRow {
    pub client_addr: Option<String>,
    pub state: Option<String>,
    pub write_lag: Option<String>,
    pub flush_lag: Option<String>,
    pub replay_lag: Option<String>,
}

/// Server-side sizing and connection figures.
///
/// Source: `pg_database_size(current_database())`, `pg_settings`,
/// `pg_stat_activity`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PgServerMetrics {
    pub db_size_pretty: String,
    pub shared_buffers_mb: f64,
    pub work_mem_mb: f64,
    pub maintenance_work_mem_mb: f64,
    /// Backends with a non-null state.
    pub active_connections: i64,
    /// Backends in state `active`.
    pub active_queries: i64,
}

impl Default for PgServerMetrics {
    fn default() -> Self {
        Self {
            db_size_pretty: "N/A".to_string(),
            shared_buffers_mb: 0.0,
            work_mem_mb: 0.0,
            maintenance_work_mem_mb: 0.0,
            active_connections: 0,
            active_queries: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_totals_ratio() {
        let t = CacheTotals::new(990, 10);
        assert!((t.ratio.unwrap() - 0.99).abs() < 1e-9);
        assert!((t.ratio_pct() - 99.0).abs() < 1e-9);
    }

    #[test]
    fn cache_totals_ratio_null_on_empty_counters() {
        let t = CacheTotals::new(0, 0);
        assert_eq!(t.ratio, None);
        assert_eq!(t.ratio_pct(), 0.0);
    }

    #[test]
    fn cache_totals_ratio_matches_definition() {
        for (hits, reads) in [(1, 2), (7, 0), (0, 7), (123_456_789, 987_654_321)] {
            let t = CacheTotals::new(hits, reads);
            let expected = hits as f64 / (hits + reads) as f64;
            assert!((t.ratio.unwrap() - expected).abs() < 1e-9);
        }
    }
}
