//! Live telemetry source: host probe plus PostgreSQL probes.

use crate::collector::ProbeError;
use crate::collector::host::HostProbe;
use crate::collector::pg_collector::PostgresProbes;
use crate::config::AppConfig;
use crate::model::{
    CacheHitReport, FrequentQueryRow, HostMetrics, LongQueryRow, PgServerMetrics,
    ReplicationRow, StorageReport,
};
use crate::report::TelemetrySource;

/// Probes bound to one configuration.
///
/// Holds no connections: every probe call opens and closes its own.
pub struct Collector {
    host: HostProbe,
    postgres: PostgresProbes,
}

impl Collector {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            host: HostProbe::new(&config.database),
            postgres: PostgresProbes::new(&config.database, config.report),
        }
    }

    pub fn host(&self) -> &HostProbe {
        &self.host
    }
}

impl TelemetrySource for Collector {
    fn long_queries(&self) -> Result<Vec<LongQueryRow>, ProbeError> {
        self.postgres.long_queries()
    }

    fn frequent_queries(&self) -> Result<Vec<FrequentQueryRow>, ProbeError> {
        self.postgres.frequent_queries()
    }

    fn host_metrics(&self) -> Result<HostMetrics, ProbeError> {
        self.host.sample()
    }

    fn server_metrics(&self) -> Result<PgServerMetrics, ProbeError> {
        self.postgres.server_metrics()
    }

    fn cache_hit(&self) -> Result<CacheHitReport, ProbeError> {
        self.postgres.cache_hit()
    }

    fn storage_usage(&self) -> Result<StorageReport, ProbeError> {
        self.postgres.storage_usage()
    }

    fn replication_delay(&self) -> Result<Vec<ReplicationRow>, ProbeError> {
        self.postgres.replication_delay()
    }
}
