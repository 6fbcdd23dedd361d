//! Server sizing and connection figures.

use std::time::Instant;

use tracing::debug;

use super::PostgresProbes;
use super::queries::{SERVER_ACTIVITY_QUERY, SERVER_DB_SIZE_QUERY, SERVER_SETTINGS_QUERY};
use crate::collector::ProbeError;
use crate::fmt::round2;
use crate::model::{PgServerMetrics, Section};

impl PostgresProbes {
    /// Current database size, memory settings and backend counts.
    pub fn server_metrics(&self) -> Result<PgServerMetrics, ProbeError> {
        let section = Section::CpuRamUsage;
        let started = Instant::now();
        let mut session = self.open(section)?;
        let mut metrics = PgServerMetrics::default();

        let size = session.query_one(SERVER_DB_SIZE_QUERY, &[])?;
        if let Ok(Some(pretty)) = size.try_get::<_, Option<String>>(0) {
            metrics.db_size_pretty = pretty;
        }

        for row in session.query(SERVER_SETTINGS_QUERY, &[])? {
            let name: String = row.try_get(0).unwrap_or_default();
            let setting: String = row.try_get(1).unwrap_or_default();
            let unit: String = row.try_get(2).unwrap_or_default();
            let mb = setting_to_mb(&setting, &unit);
            match name.as_str() {
                "shared_buffers" => metrics.shared_buffers_mb = mb,
                "work_mem" => metrics.work_mem_mb = mb,
                "maintenance_work_mem" => metrics.maintenance_work_mem_mb = mb,
                _ => {}
            }
        }

        let activity = session.query_one(SERVER_ACTIVITY_QUERY, &[])?;
        metrics.active_connections = activity.try_get::<_, i64>(0).unwrap_or(0).max(0);
        metrics.active_queries = activity.try_get::<_, i64>(1).unwrap_or(0).max(0);

        debug!(
            %section,
            connections = metrics.active_connections,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "probe done"
        );
        Ok(metrics)
    }
}

/// Converts a `pg_settings` value in its unit to MiB; 0 for unknown units.
pub fn setting_to_mb(setting: &str, unit: &str) -> f64 {
    let Ok(value) = setting.trim().parse::<f64>() else {
        return 0.0;
    };
    let kib = match unit.trim() {
        "8kB" => value * 8.0,
        "kB" => value,
        "MB" => value * 1024.0,
        "GB" => value * 1024.0 * 1024.0,
        "B" => value / 1024.0,
        _ => return 0.0,
    };
    round2(kib.max(0.0) / 1024.0)
}
