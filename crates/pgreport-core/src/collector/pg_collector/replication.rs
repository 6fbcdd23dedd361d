//! Replication lag probe.

use std::time::Instant;

use tracing::debug;

use super::PostgresProbes;
use super::queries::REPLICATION_QUERY;
use crate::collector::ProbeError;
use crate::model::{ReplicationRow, Section};

impl PostgresProbes {
    /// One row per attached standby; empty when there are none.
    pub fn replication_delay(&self) -> Result<Vec<ReplicationRow>, ProbeError> {
        let section = Section::ReplicationDelay;
        let started = Instant::now();
        let mut session = self.open(section)?;

        let rows: Vec<ReplicationRow> = session
            .query(REPLICATION_QUERY, &[])?
            .iter()
            .map(|row| ReplicationRow {
                client_addr: row.try_get(0).unwrap_or(None),
                state: row.try_get(1).unwrap_or(None),
                write_lag: row.try_get(2).unwrap_or(None),
                flush_lag: row.try_get(3).unwrap_or(None),
                replay_lag: row.try_get(4).unwrap_or(None),
            })
            .collect();

        debug!(%section, rows = rows.len(), elapsed_ms = started.elapsed().as_millis() as u64, "probe done");
        Ok(rows)
    }
}
