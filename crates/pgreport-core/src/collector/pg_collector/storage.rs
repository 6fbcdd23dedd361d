//! Storage footprint probe.

use std::time::Instant;

use postgres::Row;
use tracing::debug;

use super::PostgresProbes;
use super::queries::{
    DATABASE_SIZES_QUERY, build_index_sizes_query, build_index_usage_query,
    build_table_sizes_query,
};
use crate::collector::ProbeError;
use crate::model::{DbSizeRow, IndexSizeRow, IndexUsageRow, Section, StorageReport, TableSizeRow};

impl PostgresProbes {
    /// Database, table and index sizes plus index scan counters.
    pub fn storage_usage(&self) -> Result<StorageReport, ProbeError> {
        let section = Section::StorageUsage;
        let started = Instant::now();
        let limits = self.settings.limits;
        let mut session = self.open(section)?;

        let databases = session
            .query(DATABASE_SIZES_QUERY, &[])?
            .iter()
            .map(|row| DbSizeRow {
                datname: row.try_get(0).unwrap_or_default(),
                size_pretty: row.try_get(1).unwrap_or_default(),
                size_bytes: non_negative(row.try_get(2).unwrap_or(0)),
            })
            .collect::<Vec<_>>();

        let tables = session
            .query(&build_table_sizes_query(), &[&limits.tables])?
            .iter()
            .map(table_size_from_row)
            .collect::<Vec<_>>();

        let indexes = session
            .query(&build_index_sizes_query(), &[&limits.indexes])?
            .iter()
            .map(|row| IndexSizeRow {
                schema: row.try_get(0).unwrap_or_default(),
                indexname: row.try_get(1).unwrap_or_default(),
                tablename: row.try_get(2).unwrap_or_default(),
                size_pretty: row.try_get(3).unwrap_or_default(),
                size_bytes: non_negative(row.try_get(4).unwrap_or(0)),
            })
            .collect::<Vec<_>>();

        let index_usage = session
            .query(&build_index_usage_query(), &[&limits.index_usage])?
            .iter()
            .map(index_usage_from_row)
            .collect::<Vec<_>>();

        debug!(
            %section,
            databases = databases.len(),
            tables = tables.len(),
            indexes = indexes.len(),
            index_usage = index_usage.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "probe done"
        );
        Ok(StorageReport {
            databases,
            tables,
            indexes,
            index_usage,
        })
    }
}

fn non_negative(v: i64) -> i64 {
    v.max(0)
}

fn table_size_from_row(row: &Row) -> TableSizeRow {
    let table_bytes = non_negative(row.try_get(6).unwrap_or(0));
    TableSizeRow {
        schema: row.try_get(0).unwrap_or_default(),
        table: row.try_get(1).unwrap_or_default(),
        total_pretty: row.try_get(2).unwrap_or_default(),
        table_pretty: row.try_get(3).unwrap_or_default(),
        index_pretty: row.try_get(4).unwrap_or_default(),
        // Total includes the heap; sizes read at slightly different moments
        // must not invert that.
        total_bytes: non_negative(row.try_get(5).unwrap_or(0)).max(table_bytes),
        table_bytes,
        index_bytes: non_negative(row.try_get(8).unwrap_or(0)),
        row_count: non_negative(row.try_get(7).unwrap_or(0)),
    }
}

fn index_usage_from_row(row: &Row) -> IndexUsageRow {
    IndexUsageRow {
        schema: row.try_get(0).unwrap_or_default(),
        table: row.try_get(1).unwrap_or_default(),
        indexname: row.try_get(2).unwrap_or_default(),
        size_pretty: row.try_get(3).unwrap_or_default(),
        size_bytes: non_negative(row.try_get(4).unwrap_or(0)),
        idx_scan: non_negative(row.try_get(5).unwrap_or(0)),
        idx_tup_read: non_negative(row.try_get(6).unwrap_or(0)),
        idx_tup_fetch: non_negative(row.try_get(7).unwrap_or(0)),
    }
}
