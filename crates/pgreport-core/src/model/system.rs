//! Resource metrics of the machine running PostgreSQL.

use serde::{Deserialize, Serialize};

use super::PgServerMetrics;

/// CPU and memory of the database host.
///
/// Percentages are 0..=100; sizes are GiB rounded to two decimals.
/// The all-zero record stands in when the host could not be sampled.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct HostMetrics {
    pub cpu_pct: f64,
    pub ram_pct: f64,
    pub ram_total_gb: f64,
    pub ram_used_gb: f64,
    pub ram_available_gb: f64,
}

/// Contents of the "CPU/RAM Usage" section: host and server figures side by side.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ResourceUsage {
    #[serde(flatten)]
    pub host: HostMetrics,
    #[serde(flatten)]
    pub server: PgServerMetrics,
}
