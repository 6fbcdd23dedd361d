//! Report document: a renderer-neutral list of blocks built from a [`Report`].
//!
//! Everything here is a pure projection of the assembled report. Layout,
//! fonts and colors are left to [`crate::pdf`].

use chrono::NaiveDateTime;

use pgreport_core::classify::{
    Status, cache_hit_status, connections_status, cpu_status, index_status, ram_status,
};
use pgreport_core::config::{ConnectionDescriptor, ProbeSettings};
use pgreport_core::fmt::{format_bytes_prefer_gb, normalize_for_display, truncate_query};
use pgreport_core::model::{ReportModel, Section};
use pgreport_core::report::Report;
use pgreport_core::summary::summarize;

pub const TITLE: &str = "PostgreSQL Database Monitoring Report";

/// Query text longer than this is cut for display.
pub const QUERY_DISPLAY_LEN: usize = 300;

/// Widest table, in monospace characters, including one-character gutters.
pub const MAX_TABLE_CHARS: usize = 120;

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub title: String,
    pub footer: String,
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Title(String),
    Heading(String),
    Subheading(String),
    Paragraph(String),
    /// Smaller, de-emphasized text.
    Note(String),
    Table(Table),
    PageBreak,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub title: &'static str,
    /// Width in monospace characters; longer cell text wraps.
    pub width: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub text: String,
    pub status: Option<Status>,
}

impl Cell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: None,
        }
    }

    pub fn status(status: Status) -> Self {
        Self {
            text: status.label().to_string(),
            status: Some(status),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    fn new(columns: &[(&'static str, usize)]) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|&(title, width)| Column { title, width })
                .collect(),
            rows: Vec::new(),
        }
    }

    fn row(&mut self, cells: Vec<Cell>) {
        self.rows.push(cells);
    }

    /// Total width in characters, gutters included.
    pub fn width(&self) -> usize {
        let cols: usize = self.columns.iter().map(|c| c.width).sum();
        cols + self.columns.len().saturating_sub(1)
    }
}

/// Builds the document for one run.
pub fn build(
    report: &Report,
    db: &ConnectionDescriptor,
    settings: &ProbeSettings,
    generated_at: NaiveDateTime,
) -> Document {
    let model = &report.model;
    let mut blocks = Vec::new();

    header(&mut blocks, db, generated_at);
    executive_summary(&mut blocks, model);
    system_performance(&mut blocks, report);
    blocks.push(Block::PageBreak);
    database_performance(&mut blocks, report, settings);
    blocks.push(Block::PageBreak);
    storage_analysis(&mut blocks, report);
    blocks.push(Block::PageBreak);
    cache_analysis(&mut blocks, report);

    if report.is_degraded() {
        blocks.push(Block::Heading("Probe Warnings".to_string()));
        blocks.push(Block::Note(
            "The sections below could not be collected and are shown empty.".to_string(),
        ));
        for e in &report.errors {
            blocks.push(Block::Paragraph(e.to_string()));
        }
    }

    Document {
        title: TITLE.to_string(),
        footer: format!(
            "pgreport {} ({})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_SHA")
        ),
        blocks,
    }
}

fn header(blocks: &mut Vec<Block>, db: &ConnectionDescriptor, generated_at: NaiveDateTime) {
    blocks.push(Block::Title(TITLE.to_string()));
    blocks.push(Block::Paragraph(format!(
        "Generated: {}",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    )));
    blocks.push(Block::Paragraph(format!(
        "Database: {}   Host: {}:{}   User: {}",
        db.dbname, db.host, db.port, db.user
    )));
    let host_probe = if db.is_local_host() {
        "local (/proc)".to_string()
    } else {
        format!("SSH {}@{}:{}", db.ssh.user, db.host, db.ssh.port)
    };
    blocks.push(Block::Note(format!("Host metrics: {}", host_probe)));
}

fn executive_summary(blocks: &mut Vec<Block>, model: &ReportModel) {
    blocks.push(Block::Heading("Executive Summary".to_string()));
    let mut table = Table::new(&[("Metric", 30), ("Value", 16), ("Status", 12)]);
    for row in summarize(model) {
        table.row(vec![
            Cell::text(row.metric),
            Cell::text(row.value),
            Cell::status(row.status),
        ]);
    }
    blocks.push(Block::Table(table));
}

fn system_performance(blocks: &mut Vec<Block>, report: &Report) {
    let host = &report.model.resource_usage.host;
    let server = &report.model.resource_usage.server;

    blocks.push(Block::Heading("System Performance".to_string()));
    not_collected(blocks, report, Section::CpuRamUsage);
    blocks.push(Block::Subheading("Host Resources".to_string()));
    let mut table = Table::new(&[("Metric", 30), ("Value", 16), ("Status", 12)]);
    table.row(vec![
        Cell::text("CPU Usage"),
        Cell::text(format!("{:.2}%", host.cpu_pct)),
        Cell::status(cpu_status(host.cpu_pct)),
    ]);
    table.row(vec![
        Cell::text("RAM Usage"),
        Cell::text(format!("{:.2}%", host.ram_pct)),
        Cell::status(ram_status(host.ram_pct)),
    ]);
    table.row(vec![
        Cell::text("Total RAM"),
        Cell::text(format!("{:.2} GB", host.ram_total_gb)),
        Cell::text(""),
    ]);
    table.row(vec![
        Cell::text("Used RAM"),
        Cell::text(format!("{:.2} GB", host.ram_used_gb)),
        Cell::text(""),
    ]);
    table.row(vec![
        Cell::text("Available RAM"),
        Cell::text(format!("{:.2} GB", host.ram_available_gb)),
        Cell::text(""),
    ]);
    blocks.push(Block::Table(table));

    blocks.push(Block::Subheading("PostgreSQL Server".to_string()));
    let mut table = Table::new(&[("Metric", 30), ("Value", 16), ("Status", 12)]);
    table.row(vec![
        Cell::text("Database Size"),
        Cell::text(server.db_size_pretty.clone()),
        Cell::text(""),
    ]);
    for (name, mb) in [
        ("Shared Buffers", server.shared_buffers_mb),
        ("Work Mem", server.work_mem_mb),
        ("Maintenance Work Mem", server.maintenance_work_mem_mb),
    ] {
        table.row(vec![
            Cell::text(name),
            Cell::text(format!("{:.1} MB", mb)),
            Cell::text(""),
        ]);
    }
    table.row(vec![
        Cell::text("Connections"),
        Cell::text(server.active_connections.to_string()),
        Cell::status(connections_status(server.active_connections)),
    ]);
    table.row(vec![
        Cell::text("Active Queries"),
        Cell::text(server.active_queries.to_string()),
        Cell::text(""),
    ]);
    blocks.push(Block::Table(table));
}

fn database_performance(blocks: &mut Vec<Block>, report: &Report, settings: &ProbeSettings) {
    let model = &report.model;
    blocks.push(Block::Heading("Database Performance".to_string()));
    blocks.push(Block::Note(format!(
        "Queries with a mean execution time above {} ms are considered slow.",
        settings.long_query_threshold_ms
    )));

    blocks.push(Block::Subheading("Long Running Queries".to_string()));
    not_collected(blocks, report, Section::LongQueries);
    if model.long_queries.is_empty() {
        blocks.push(Block::Paragraph("No slow queries found.".to_string()));
    } else {
        let mut table = Table::new(&[("Query", 72), ("Calls", 10), ("Total", 12), ("Mean", 12)]);
        for q in &model.long_queries {
            table.row(vec![
                Cell::text(display_query(&q.query)),
                Cell::text(q.calls.to_string()),
                Cell::text(q.total_fmt.clone()),
                Cell::text(q.mean_fmt.clone()),
            ]);
        }
        blocks.push(Block::Table(table));
    }

    blocks.push(Block::Subheading("Most Frequent Queries".to_string()));
    not_collected(blocks, report, Section::FrequentQueries);
    if model.frequent_queries.is_empty() {
        blocks.push(Block::Paragraph(
            "No statement statistics available (pg_stat_statements).".to_string(),
        ));
    } else {
        let mut table = Table::new(&[("Query", 72), ("Calls", 12), ("Total", 12), ("Avg/Call", 12)]);
        for q in &model.frequent_queries {
            table.row(vec![
                Cell::text(display_query(&q.query)),
                Cell::text(q.calls.to_string()),
                Cell::text(q.total_fmt.clone()),
                Cell::text(q.avg_per_call_fmt.clone()),
            ]);
        }
        blocks.push(Block::Table(table));
    }

    blocks.push(Block::Subheading("Replication Status".to_string()));
    not_collected(blocks, report, Section::ReplicationDelay);
    if model.replication.is_empty() {
        blocks.push(Block::Paragraph("No replicas connected.".to_string()));
    } else {
        let mut table = Table::new(&[
            ("Client", 24),
            ("State", 12),
            ("Write Lag", 20),
            ("Flush Lag", 20),
            ("Replay Lag", 20),
        ]);
        for r in &model.replication {
            table.row(vec![
                Cell::text(or_dash(&r.client_addr)),
                Cell::text(or_dash(&r.state)),
                Cell::text(or_dash(&r.write_lag)),
                Cell::text(or_dash(&r.flush_lag)),
                Cell::text(or_dash(&r.replay_lag)),
            ]);
        }
        blocks.push(Block::Table(table));
    }
}

fn storage_analysis(blocks: &mut Vec<Block>, report: &Report) {
    let storage = &report.model.storage;
    blocks.push(Block::Heading("Storage Analysis".to_string()));
    not_collected(blocks, report, Section::StorageUsage);

    blocks.push(Block::Subheading("Databases".to_string()));
    let mut table = Table::new(&[("Database", 40), ("Size", 14)]);
    for d in &storage.databases {
        table.row(vec![
            Cell::text(d.datname.clone()),
            Cell::text(format_bytes_prefer_gb(d.size_bytes)),
        ]);
    }
    push_table_or(blocks, table, "No databases reported.");

    blocks.push(Block::Subheading("Largest Tables".to_string()));
    let mut table = Table::new(&[
        ("Table", 46),
        ("Total", 12),
        ("Table", 12),
        ("Indexes", 12),
        ("Rows", 14),
    ]);
    for t in &storage.tables {
        table.row(vec![
            Cell::text(format!("{}.{}", t.schema, t.table)),
            Cell::text(format_bytes_prefer_gb(t.total_bytes)),
            Cell::text(format_bytes_prefer_gb(t.table_bytes)),
            Cell::text(format_bytes_prefer_gb(t.index_bytes)),
            Cell::text(t.row_count.to_string()),
        ]);
    }
    push_table_or(blocks, table, "No user tables found.");

    blocks.push(Block::Subheading("Largest Indexes".to_string()));
    let mut table = Table::new(&[("Index", 44), ("Table", 36), ("Size", 12)]);
    for i in &storage.indexes {
        table.row(vec![
            Cell::text(format!("{}.{}", i.schema, i.indexname)),
            Cell::text(i.tablename.clone()),
            Cell::text(format_bytes_prefer_gb(i.size_bytes)),
        ]);
    }
    push_table_or(blocks, table, "No user indexes found.");

    blocks.push(Block::Subheading("Index Usage".to_string()));
    let mut table = Table::new(&[
        ("Index", 34),
        ("Table", 24),
        ("Scans", 10),
        ("Tup Read", 11),
        ("Tup Fetch", 11),
        ("Size", 10),
        ("Status", 11),
    ]);
    for u in &storage.index_usage {
        table.row(vec![
            Cell::text(format!("{}.{}", u.schema, u.indexname)),
            Cell::text(u.table.clone()),
            Cell::text(u.idx_scan.to_string()),
            Cell::text(u.idx_tup_read.to_string()),
            Cell::text(u.idx_tup_fetch.to_string()),
            Cell::text(format_bytes_prefer_gb(u.size_bytes)),
            Cell::status(index_status(u.idx_scan, u.idx_tup_read, u.idx_tup_fetch)),
        ]);
    }
    push_table_or(blocks, table, "No index statistics available.");
}

fn cache_analysis(blocks: &mut Vec<Block>, report: &Report) {
    let cache = &report.model.cache_hit;
    blocks.push(Block::Heading("Cache Analysis".to_string()));
    not_collected(blocks, report, Section::CacheHitRatio);

    blocks.push(Block::Subheading("Overall Buffer Cache".to_string()));
    let mut table = Table::new(&[("Buffer Hits", 16), ("Disk Reads", 16), ("Hit Ratio", 12), ("Status", 12)]);
    let (ratio, status) = match cache.total.ratio {
        Some(_) => {
            let pct = cache.total.ratio_pct();
            (format!("{:.2}%", pct), Cell::status(cache_hit_status(pct)))
        }
        None => ("N/A".to_string(), Cell::text("")),
    };
    table.row(vec![
        Cell::text(cache.total.hits.to_string()),
        Cell::text(cache.total.reads.to_string()),
        Cell::text(ratio),
        status,
    ]);
    blocks.push(Block::Table(table));

    blocks.push(Block::Subheading("Tables With Lowest Hit Ratio".to_string()));
    let mut table = Table::new(&[
        ("Table", 50),
        ("Heap Hits", 14),
        ("Heap Reads", 14),
        ("Hit Ratio", 10),
        ("Status", 11),
    ]);
    for t in &cache.per_table {
        table.row(vec![
            Cell::text(format!("{}.{}", t.schema, t.table)),
            Cell::text(t.heap_hits.to_string()),
            Cell::text(t.heap_reads.to_string()),
            Cell::text(format!("{:.2}%", t.hit_ratio_pct)),
            Cell::status(cache_hit_status(t.hit_ratio_pct)),
        ]);
    }
    push_table_or(blocks, table, "No table I/O recorded yet.");

    blocks.push(Block::Subheading("Index vs Heap Access".to_string()));
    let mut table = Table::new(&[
        ("Table", 50),
        ("Heap Blocks", 14),
        ("Index Blocks", 14),
        ("Index Ratio", 12),
    ]);
    for t in &cache.index_heap_ratio {
        table.row(vec![
            Cell::text(format!("{}.{}", t.schema, t.table)),
            Cell::text(t.heap_blocks.to_string()),
            Cell::text(t.index_blocks.to_string()),
            Cell::text(format!("{:.2}%", t.index_ratio_pct)),
        ]);
    }
    push_table_or(blocks, table, "No table I/O recorded yet.");
}

/// Notes each recorded failure under the heading of its section.
fn not_collected(blocks: &mut Vec<Block>, report: &Report, section: Section) {
    for e in report.errors_for(section) {
        blocks.push(Block::Note(format!("Not collected: {}", e.cause)));
    }
}

fn push_table_or(blocks: &mut Vec<Block>, table: Table, empty: &str) {
    if table.rows.is_empty() {
        blocks.push(Block::Paragraph(empty.to_string()));
    } else {
        blocks.push(Block::Table(table));
    }
}

fn display_query(query: &str) -> String {
    truncate_query(&normalize_for_display(query.trim()), QUERY_DISPLAY_LEN)
}

fn or_dash(v: &Option<String>) -> String {
    match v.as_deref() {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pgreport_core::collector::ProbeError;
    use pgreport_core::config::{SshSettings, SslMode};
    use pgreport_core::fmt::TRUNCATED_SUFFIX;
    use pgreport_core::model::{IndexUsageRow, LongQueryRow, ReplicationRow, TableSizeRow};

    fn descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor {
            host: "db.example.net".to_string(),
            port: 5432,
            user: "report".to_string(),
            password: String::new(),
            dbname: "app".to_string(),
            ssl_mode: SslMode::Disable,
            ssh: SshSettings {
                user: "pg".to_string(),
                ..Default::default()
            },
        }
    }

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    fn headings(doc: &Document) -> Vec<&str> {
        doc.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Heading(h) => Some(h.as_str()),
                _ => None,
            })
            .collect()
    }

    fn tables(doc: &Document) -> Vec<&Table> {
        doc.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Table(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn sections_follow_report_order() {
        let doc = build(&Report::default(), &descriptor(), &ProbeSettings::default(), at());
        assert_eq!(doc.blocks[0], Block::Title(TITLE.to_string()));
        assert_eq!(
            headings(&doc),
            vec![
                "Executive Summary",
                "System Performance",
                "Database Performance",
                "Storage Analysis",
                "Cache Analysis",
            ]
        );
        assert!(doc.blocks.contains(&Block::Paragraph("Generated: 2024-03-01 12:30:00".to_string())));
        assert!(doc.blocks.contains(&Block::Note("Host metrics: SSH pg@db.example.net:22".to_string())));
    }

    #[test]
    fn empty_sections_get_placeholders() {
        let doc = build(&Report::default(), &descriptor(), &ProbeSettings::default(), at());
        assert!(doc.blocks.contains(&Block::Paragraph("No slow queries found.".to_string())));
        assert!(doc.blocks.contains(&Block::Paragraph("No replicas connected.".to_string())));
        assert!(doc.blocks.contains(&Block::Note(
            "Queries with a mean execution time above 600 ms are considered slow.".to_string()
        )));
    }

    #[test]
    fn summary_table_carries_statuses() {
        let doc = build(&Report::default(), &descriptor(), &ProbeSettings::default(), at());
        let summary = tables(&doc)[0];
        assert_eq!(summary.rows.len(), 5);
        assert!(summary.rows.iter().all(|r| r[2].status.is_some()));
    }

    #[test]
    fn index_usage_rows_are_classified() {
        let mut report = Report::default();
        report.model.storage.index_usage = vec![
            IndexUsageRow {
                schema: "public".to_string(),
                table: "orders".to_string(),
                indexname: "orders_pkey".to_string(),
                idx_scan: 100,
                idx_tup_read: 1000,
                idx_tup_fetch: 500,
                ..Default::default()
            },
            IndexUsageRow {
                schema: "public".to_string(),
                table: "orders".to_string(),
                indexname: "orders_note_idx".to_string(),
                ..Default::default()
            },
        ];
        let doc = build(&report, &descriptor(), &ProbeSettings::default(), at());
        let usage = tables(&doc)
            .into_iter()
            .find(|t| t.columns[0].title == "Index" && t.columns.len() == 7)
            .unwrap();
        assert_eq!(usage.rows[0][0].text, "public.orders_pkey");
        assert_eq!(usage.rows[0][6].status, Some(Status::Active));
        assert_eq!(usage.rows[1][6].status, Some(Status::Unused));
    }

    #[test]
    fn long_query_text_is_truncated() {
        let mut report = Report::default();
        report.model.long_queries = vec![LongQueryRow {
            query: format!("SELECT {}\nFROM t", "col, ".repeat(200)),
            mean_fmt: "1.00s".to_string(),
            ..Default::default()
        }];
        let doc = build(&report, &descriptor(), &ProbeSettings::default(), at());
        let long = tables(&doc)
            .into_iter()
            .find(|t| t.columns[0].title == "Query")
            .unwrap();
        let text = &long.rows[0][0].text;
        assert!(text.ends_with(TRUNCATED_SUFFIX));
        assert!(text.chars().count() <= QUERY_DISPLAY_LEN);
        assert!(!text.contains('\n'));
    }

    #[test]
    fn replication_nulls_render_as_dash() {
        let mut report = Report::default();
        report.model.replication = vec![ReplicationRow {
            client_addr: Some("10.0.0.2".to_string()),
            state: Some("streaming".to_string()),
            write_lag: None,
            flush_lag: None,
            replay_lag: Some("00:00:01.5".to_string()),
        }];
        let doc = build(&report, &descriptor(), &ProbeSettings::default(), at());
        let repl = tables(&doc)
            .into_iter()
            .find(|t| t.columns[0].title == "Client")
            .unwrap();
        let texts: Vec<&str> = repl.rows[0].iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["10.0.0.2", "streaming", "-", "-", "00:00:01.5"]);
    }

    #[test]
    fn degraded_report_lists_warnings() {
        let report = Report {
            errors: vec![ProbeError::query(Section::StorageUsage, "permission denied")],
            ..Default::default()
        };
        let doc = build(&report, &descriptor(), &ProbeSettings::default(), at());
        assert_eq!(headings(&doc).last(), Some(&"Probe Warnings"));
        assert!(doc.blocks.contains(&Block::Paragraph(
            "query error [Storage Usage]: permission denied".to_string()
        )));
    }

    #[test]
    fn failed_section_is_marked_in_place() {
        let report = Report {
            errors: vec![
                ProbeError::query(Section::StorageUsage, "permission denied"),
                ProbeError::remote("authentication failed"),
            ],
            ..Default::default()
        };
        let doc = build(&report, &descriptor(), &ProbeSettings::default(), at());

        let storage = doc
            .blocks
            .iter()
            .position(|b| *b == Block::Heading("Storage Analysis".to_string()))
            .unwrap();
        assert_eq!(
            doc.blocks[storage + 1],
            Block::Note("Not collected: permission denied".to_string())
        );

        let system = doc
            .blocks
            .iter()
            .position(|b| *b == Block::Heading("System Performance".to_string()))
            .unwrap();
        assert_eq!(
            doc.blocks[system + 1],
            Block::Note("Not collected: authentication failed".to_string())
        );

        let notes = doc
            .blocks
            .iter()
            .filter(|b| matches!(b, Block::Note(n) if n.starts_with("Not collected")))
            .count();
        assert_eq!(notes, 2);
    }

    #[test]
    fn table_index_sizes_use_byte_formatting() {
        let mut report = Report::default();
        report.model.storage.tables = vec![TableSizeRow {
            schema: "public".to_string(),
            table: "orders".to_string(),
            total_bytes: 3 * 1024 * 1024 * 1024,
            table_bytes: 2 * 1024 * 1024 * 1024,
            index_bytes: 512 * 1024 * 1024,
            ..Default::default()
        }];
        let doc = build(&report, &descriptor(), &ProbeSettings::default(), at());
        let sizes = tables(&doc)
            .into_iter()
            .find(|t| t.columns.len() == 5 && t.columns[3].title == "Indexes")
            .unwrap();
        let texts: Vec<&str> = sizes.rows[0].iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["public.orders", "3.00 GB", "2.00 GB", "512.0 MB", "0"]);
    }

    #[test]
    fn unknown_cache_ratio_has_no_status() {
        let doc = build(&Report::default(), &descriptor(), &ProbeSettings::default(), at());
        let totals = tables(&doc)
            .into_iter()
            .find(|t| t.columns[0].title == "Buffer Hits")
            .unwrap();
        assert_eq!(totals.rows[0][2].text, "N/A");
        assert_eq!(totals.rows[0][3].status, None);
    }

    #[test]
    fn tables_fit_the_page() {
        let mut report = Report::default();
        report.model.long_queries = vec![LongQueryRow::default()];
        report.model.replication = vec![ReplicationRow::default()];
        report.model.storage.index_usage = vec![IndexUsageRow::default()];
        let doc = build(&report, &descriptor(), &ProbeSettings::default(), at());
        for t in tables(&doc) {
            assert!(t.width() <= MAX_TABLE_CHARS, "{:?} too wide", t.columns);
        }
    }
}
