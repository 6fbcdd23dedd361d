//! Data model of a report run.
//!
//! - [`postgres`]: rows produced by the PostgreSQL probes
//! - [`system`]: host resource metrics of the database machine
//!
//! [`ReportModel`] is the merged result handed to renderers. It always
//! carries all six sections in the fixed order below; a section whose probe
//! failed holds empty containers (or a zeroed record), never a missing key.
//!
//! ```text
//! ReportModel
//!   ├── "Long Queries"       Vec<LongQueryRow>
//!   ├── "Frequent Queries"   Vec<FrequentQueryRow>
//!   ├── "CPU/RAM Usage"      ResourceUsage = HostMetrics + PgServerMetrics
//!   ├── "Cache Hit Ratio"    { total, per_table, index_heap_ratio }
//!   ├── "Storage Usage"      { databases, tables, indexes, index_usage }
//!   └── "Replication Delay"  Vec<ReplicationRow>
//! ```

mod postgres;
mod system;

use serde::{Deserialize, Serialize};

pub use postgres::{
    CacheHitReport, CacheTotals, DbSizeRow, FrequentQueryRow, IndexHeapRow, IndexSizeRow,
    IndexUsageRow, LongQueryRow, PerTableCacheRow, PgServerMetrics, ReplicationRow,
    StorageReport, TableSizeRow,
};
pub use system::{HostMetrics, ResourceUsage};

/// Report sections in their fixed output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    LongQueries,
    FrequentQueries,
    CpuRamUsage,
    CacheHitRatio,
    StorageUsage,
    ReplicationDelay,
}

impl Section {
    /// All sections, in report order.
    pub const ALL: [Section; 6] = [
        Section::LongQueries,
        Section::FrequentQueries,
        Section::CpuRamUsage,
        Section::CacheHitRatio,
        Section::StorageUsage,
        Section::ReplicationDelay,
    ];

    /// Key of the section in the report mapping.
    pub fn key(self) -> &'static str {
        match self {
            Section::LongQueries => "Long Queries",
            Section::FrequentQueries => "Frequent Queries",
            Section::CpuRamUsage => "CPU/RAM Usage",
            Section::CacheHitRatio => "Cache Hit Ratio",
            Section::StorageUsage => "Storage Usage",
            Section::ReplicationDelay => "Replication Delay",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Merged output of all probes for one run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportModel {
    #[serde(rename = "Long Queries")]
    pub long_queries: Vec<LongQueryRow>,

    #[serde(rename = "Frequent Queries")]
    pub frequent_queries: Vec<FrequentQueryRow>,

    #[serde(rename = "CPU/RAM Usage")]
    pub resource_usage: ResourceUsage,

    #[serde(rename = "Cache Hit Ratio")]
    pub cache_hit: CacheHitReport,

    #[serde(rename = "Storage Usage")]
    pub storage: StorageReport,

    #[serde(rename = "Replication Delay")]
    pub replication: Vec<ReplicationRow>,
}
