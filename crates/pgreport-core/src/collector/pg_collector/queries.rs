//! SQL for the PostgreSQL probes.
//!
//! Every numeric column is cast server-side (`::bigint`, `::double precision`)
//! and every interval or name column to `::text`, so rows decode without
//! extra driver type features. Limits and the slow-query threshold are bound
//! parameters.

/// Schemas never reported by the storage and usage probes.
const EXCLUDED_SCHEMAS: &str = "('information_schema', 'pg_catalog')";

pub(super) const STATEMENTS_EXTENSION_QUERY: &str =
    "SELECT 1 FROM pg_extension WHERE extname = 'pg_stat_statements'";

/// `(total, mean)` execution time columns of `pg_stat_statements`.
fn statements_time_columns(server_version_num: i32) -> (&'static str, &'static str) {
    if server_version_num >= 130000 {
        ("total_exec_time", "mean_exec_time")
    } else {
        ("total_time", "mean_time")
    }
}

/// Renders a millisecond expression as `X.YYm`, `X.YYs` or `X.YYms`.
pub(super) fn exec_time_fmt_expr(ms: &str) -> String {
    format!(
        "CASE \
            WHEN ({ms}) >= 60000 THEN round((({ms}) / 60000)::numeric, 2)::text || 'm' \
            WHEN ({ms}) >= 1000 THEN round((({ms}) / 1000)::numeric, 2)::text || 's' \
            ELSE round(({ms})::numeric, 2)::text || 'ms' \
        END"
    )
}

/// Statements whose mean time exceeds `$1` ms, slowest first, at most `$2` rows.
pub(super) fn build_long_queries_query(server_version_num: i32) -> String {
    let (total, mean) = statements_time_columns(server_version_num);
    let total_fmt = exec_time_fmt_expr(total);
    let mean_fmt = exec_time_fmt_expr(mean);

    format!(
        r#"
            SELECT
                COALESCE(query, '') as query,
                {total}::double precision as total_ms,
                {mean}::double precision as mean_ms,
                calls::bigint as calls,
                {total_fmt} as total_fmt,
                {mean_fmt} as mean_fmt
            FROM pg_stat_statements
            WHERE {mean} > $1
            ORDER BY {mean} DESC, calls DESC, queryid
            LIMIT $2
        "#
    )
}

/// Most called statements first, at most `$1` rows.
pub(super) fn build_frequent_queries_query(server_version_num: i32) -> String {
    let (total, _) = statements_time_columns(server_version_num);
    let total_fmt = exec_time_fmt_expr(total);
    let per_call_fmt = exec_time_fmt_expr(&format!("{total} / calls"));

    format!(
        r#"
            SELECT
                COALESCE(query, '') as query,
                calls::bigint as calls,
                {total}::double precision as total_ms,
                {total_fmt} as total_fmt,
                CASE WHEN calls > 0 THEN {per_call_fmt} ELSE '0ms' END as avg_per_call_fmt
            FROM pg_stat_statements
            ORDER BY calls DESC, {total} DESC, queryid
            LIMIT $1
        "#
    )
}

pub(super) const CACHE_TOTALS_QUERY: &str = r#"
    SELECT
        COALESCE(sum(blks_hit), 0)::bigint as hits,
        COALESCE(sum(blks_read), 0)::bigint as reads
    FROM pg_stat_database
"#;

/// Per-table heap hit ratio, worst first, at most `$1` rows.
pub(super) fn build_per_table_cache_query() -> String {
    format!(
        r#"
            SELECT
                schemaname::text as schemaname,
                relname::text as relname,
                COALESCE(heap_blks_hit, 0)::bigint as heap_hits,
                COALESCE(heap_blks_read, 0)::bigint as heap_reads,
                COALESCE(round((100.0 * heap_blks_hit
                    / NULLIF(heap_blks_hit + heap_blks_read, 0))::numeric, 2), 0)::double precision
                    as hit_ratio_pct
            FROM pg_statio_user_tables
            WHERE COALESCE(heap_blks_hit, 0) + COALESCE(heap_blks_read, 0) > 0
              AND schemaname NOT IN {EXCLUDED_SCHEMAS}
            ORDER BY hit_ratio_pct ASC, schemaname, relname
            LIMIT $1
        "#
    )
}

/// Share of block accesses that hit index pages, highest first, at most `$1` rows.
pub(super) fn build_index_heap_query() -> String {
    format!(
        r#"
            SELECT
                schemaname::text as schemaname,
                relname::text as relname,
                (COALESCE(heap_blks_hit, 0) + COALESCE(heap_blks_read, 0))::bigint as heap_blocks,
                (COALESCE(idx_blks_hit, 0) + COALESCE(idx_blks_read, 0))::bigint as index_blocks,
                COALESCE(round((100.0 * (COALESCE(idx_blks_hit, 0) + COALESCE(idx_blks_read, 0))
                    / NULLIF(COALESCE(heap_blks_hit, 0) + COALESCE(heap_blks_read, 0)
                        + COALESCE(idx_blks_hit, 0) + COALESCE(idx_blks_read, 0), 0))::numeric, 2), 0)
                    ::double precision as index_ratio_pct
            FROM pg_statio_user_tables
            WHERE COALESCE(heap_blks_hit, 0) + COALESCE(heap_blks_read, 0)
                + COALESCE(idx_blks_hit, 0) + COALESCE(idx_blks_read, 0) > 0
              AND schemaname NOT IN {EXCLUDED_SCHEMAS}
            ORDER BY index_ratio_pct DESC, schemaname, relname
            LIMIT $1
        "#
    )
}

pub(super) const DATABASE_SIZES_QUERY: &str = r#"
    SELECT
        datname::text as datname,
        pg_size_pretty(pg_database_size(datname)) as size_pretty,
        pg_database_size(datname)::bigint as size_bytes
    FROM pg_database
    WHERE NOT datistemplate
    ORDER BY size_bytes DESC, datname
"#;

/// Largest tables by total size (heap + indexes + toast), at most `$1` rows.
pub(super) fn build_table_sizes_query() -> String {
    format!(
        r#"
            SELECT
                n.nspname::text as schemaname,
                c.relname::text as relname,
                pg_size_pretty(pg_total_relation_size(c.oid)) as total_pretty,
                pg_size_pretty(pg_relation_size(c.oid)) as table_pretty,
                pg_size_pretty(pg_indexes_size(c.oid)) as index_pretty,
                pg_total_relation_size(c.oid)::bigint as total_bytes,
                pg_relation_size(c.oid)::bigint as table_bytes,
                COALESCE(NULLIF(s.n_live_tup, 0), NULLIF(GREATEST(c.reltuples, 0)::bigint, 0), 0)::bigint
                    as row_count,
                pg_indexes_size(c.oid)::bigint as index_bytes
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            LEFT JOIN pg_stat_all_tables s ON s.relid = c.oid
            WHERE c.relkind IN ('r', 'p')
              AND n.nspname NOT IN {EXCLUDED_SCHEMAS}
              AND n.nspname NOT LIKE 'pg_toast%'
            ORDER BY total_bytes DESC, schemaname, relname
            LIMIT $1
        "#
    )
}

/// Largest indexes, at most `$1` rows.
pub(super) fn build_index_sizes_query() -> String {
    format!(
        r#"
            SELECT
                n.nspname::text as schemaname,
                i.relname::text as indexname,
                t.relname::text as tablename,
                pg_size_pretty(pg_relation_size(i.oid)) as size_pretty,
                pg_relation_size(i.oid)::bigint as size_bytes
            FROM pg_index x
            JOIN pg_class i ON i.oid = x.indexrelid
            JOIN pg_class t ON t.oid = x.indrelid
            JOIN pg_namespace n ON n.oid = i.relnamespace
            WHERE n.nspname NOT IN {EXCLUDED_SCHEMAS}
              AND n.nspname NOT LIKE 'pg_toast%'
            ORDER BY size_bytes DESC, schemaname, indexname
            LIMIT $1
        "#
    )
}

/// Index scan counters, most scanned first, at most `$1` rows.
pub(super) fn build_index_usage_query() -> String {
    format!(
        r#"
            SELECT
                schemaname::text as schemaname,
                relname::text as relname,
                indexrelname::text as indexname,
                pg_size_pretty(pg_relation_size(indexrelid)) as size_pretty,
                pg_relation_size(indexrelid)::bigint as size_bytes,
                COALESCE(idx_scan, 0)::bigint as idx_scan,
                COALESCE(idx_tup_read, 0)::bigint as idx_tup_read,
                COALESCE(idx_tup_fetch, 0)::bigint as idx_tup_fetch
            FROM pg_stat_user_indexes
            WHERE schemaname NOT IN {EXCLUDED_SCHEMAS}
            ORDER BY idx_scan DESC, size_bytes DESC, schemaname, indexname
            LIMIT $1
        "#
    )
}

pub(super) const REPLICATION_QUERY: &str = r#"
    SELECT
        host(client_addr) as client_addr,
        state::text as state,
        write_lag::text as write_lag,
        flush_lag::text as flush_lag,
        replay_lag::text as replay_lag
    FROM pg_stat_replication
    ORDER BY client_addr, application_name
"#;

pub(super) const SERVER_DB_SIZE_QUERY: &str =
    "SELECT pg_size_pretty(pg_database_size(current_database())) as db_size";

pub(super) const SERVER_SETTINGS_QUERY: &str = r#"
    SELECT name::text, setting::text, COALESCE(unit, '')::text as unit
    FROM pg_settings
    WHERE name IN ('shared_buffers', 'work_mem', 'maintenance_work_mem')
"#;

pub(super) const SERVER_ACTIVITY_QUERY: &str = r#"
    SELECT
        count(*)::bigint as connections,
        count(*) FILTER (WHERE state = 'active')::bigint as active_queries
    FROM pg_stat_activity
    WHERE state IS NOT NULL
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_time_fmt_has_three_units() {
        let e = exec_time_fmt_expr("x");
        assert!(e.contains("WHEN (x) >= 60000 THEN round(((x) / 60000)::numeric, 2)::text || 'm'"));
        assert!(e.contains("WHEN (x) >= 1000 THEN round(((x) / 1000)::numeric, 2)::text || 's'"));
        assert!(e.contains("ELSE round((x)::numeric, 2)::text || 'ms'"));
    }

    #[test]
    fn long_queries_use_exec_time_columns_on_pg13_plus() {
        let q = build_long_queries_query(130000);
        assert!(q.contains("total_exec_time::double precision as total_ms"));
        assert!(q.contains("WHERE mean_exec_time > $1"));
        assert!(q.contains("ORDER BY mean_exec_time DESC"));
        assert!(q.contains("LIMIT $2"));
        assert!(!q.contains("mean_time "));
    }

    #[test]
    fn long_queries_use_legacy_columns_on_pg12_and_older() {
        let q = build_long_queries_query(120000);
        assert!(q.contains("total_time::double precision as total_ms"));
        assert!(q.contains("mean_time::double precision as mean_ms"));
        assert!(q.contains("WHERE mean_time > $1"));
        assert!(!q.contains("exec_time"));
    }

    #[test]
    fn frequent_queries_guard_zero_calls() {
        let q = build_frequent_queries_query(150000);
        assert!(q.contains("ORDER BY calls DESC"));
        assert!(q.contains("CASE WHEN calls > 0 THEN"));
        assert!(q.contains("ELSE '0ms' END as avg_per_call_fmt"));
        assert!(q.contains("(total_exec_time / calls)"));
        assert!(q.contains("LIMIT $1"));
    }

    #[test]
    fn cache_queries_use_nullif_and_sort_keys() {
        let per_table = build_per_table_cache_query();
        assert!(per_table.contains("NULLIF(heap_blks_hit + heap_blks_read, 0)"));
        assert!(per_table.contains("ORDER BY hit_ratio_pct ASC"));
        assert!(per_table.contains("> 0"));

        let index_heap = build_index_heap_query();
        assert!(index_heap.contains("NULLIF("));
        assert!(index_heap.contains("ORDER BY index_ratio_pct DESC"));
    }

    #[test]
    fn storage_queries_exclude_system_schemas() {
        for q in [
            build_per_table_cache_query(),
            build_index_heap_query(),
            build_table_sizes_query(),
            build_index_sizes_query(),
            build_index_usage_query(),
        ] {
            assert!(q.contains("NOT IN ('information_schema', 'pg_catalog')"), "{}", q);
            assert!(q.contains("LIMIT $1"), "{}", q);
        }
    }

    #[test]
    fn storage_sort_keys() {
        assert!(DATABASE_SIZES_QUERY.contains("ORDER BY size_bytes DESC"));
        assert!(DATABASE_SIZES_QUERY.contains("WHERE NOT datistemplate\n"));
        assert!(!DATABASE_SIZES_QUERY.contains("datallowconn"));
        assert!(build_table_sizes_query().contains("ORDER BY total_bytes DESC"));
        assert!(build_index_sizes_query().contains("ORDER BY size_bytes DESC"));
        assert!(build_index_usage_query().contains("ORDER BY idx_scan DESC, size_bytes DESC"));
    }

    #[test]
    fn table_sizes_include_partitioned_parents() {
        let q = build_table_sizes_query();
        assert!(q.contains("c.relkind IN ('r', 'p')"));
        assert!(q.contains("pg_indexes_size(c.oid)::bigint as index_bytes"));
    }

    #[test]
    fn table_row_count_prefers_live_tuples() {
        let q = build_table_sizes_query();
        assert!(q.contains(
            "COALESCE(NULLIF(s.n_live_tup, 0), NULLIF(GREATEST(c.reltuples, 0)::bigint, 0), 0)"
        ));
    }

    #[test]
    fn replication_lags_are_text() {
        assert!(REPLICATION_QUERY.contains("host(client_addr) as client_addr"));
        assert!(!REPLICATION_QUERY.contains("client_addr::text"));
        assert!(REPLICATION_QUERY.contains("write_lag::text"));
        assert!(REPLICATION_QUERY.contains("flush_lag::text"));
        assert!(REPLICATION_QUERY.contains("replay_lag::text"));
    }
}
