//! Report model assembly.
//!
//! [`assemble`] runs every probe of a [`TelemetrySource`] once, in the fixed
//! section order, and merges the results into a [`ReportModel`]. A failing
//! probe never aborts the run: its section keeps the empty (or zeroed)
//! default and the error is recorded alongside the model.

use std::time::Instant;

use tracing::{info, warn};

use crate::collector::ProbeError;
use crate::model::{
    CacheHitReport, FrequentQueryRow, HostMetrics, LongQueryRow, PgServerMetrics,
    ReplicationRow, ReportModel, Section, StorageReport,
};

/// Everything the assembler needs to build a report.
///
/// Implemented by [`crate::collector::Collector`] against a live server and
/// by fakes in tests.
pub trait TelemetrySource {
    fn long_queries(&self) -> Result<Vec<LongQueryRow>, ProbeError>;
    fn frequent_queries(&self) -> Result<Vec<FrequentQueryRow>, ProbeError>;
    fn host_metrics(&self) -> Result<HostMetrics, ProbeError>;
    fn server_metrics(&self) -> Result<PgServerMetrics, ProbeError>;
    fn cache_hit(&self) -> Result<CacheHitReport, ProbeError>;
    fn storage_usage(&self) -> Result<StorageReport, ProbeError>;
    fn replication_delay(&self) -> Result<Vec<ReplicationRow>, ProbeError>;
}

/// Assembled model plus the errors of degraded probes, in probe order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    pub model: ReportModel,
    pub errors: Vec<ProbeError>,
}

impl Report {
    /// True when at least one probe failed.
    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Errors recorded for one section.
    pub fn errors_for(&self, section: Section) -> impl Iterator<Item = &ProbeError> {
        self.errors
            .iter()
            .filter(move |e| e.section == Some(section))
    }
}

/// Runs all probes sequentially and merges their output.
pub fn assemble<S: TelemetrySource + ?Sized>(source: &S) -> Report {
    let started = Instant::now();
    let mut errors = Vec::new();

    let long_queries = settle(source.long_queries(), &mut errors);
    let frequent_queries = settle(source.frequent_queries(), &mut errors);
    let host = settle(source.host_metrics(), &mut errors);
    let server = settle(source.server_metrics(), &mut errors);
    let cache_hit = settle(source.cache_hit(), &mut errors);
    let storage = settle(source.storage_usage(), &mut errors);
    let replication = settle(source.replication_delay(), &mut errors);

    let mut model = ReportModel {
        long_queries,
        frequent_queries,
        cache_hit,
        storage,
        replication,
        ..Default::default()
    };
    model.resource_usage.host = host;
    model.resource_usage.server = server;

    info!(
        failed = errors.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "report model assembled"
    );
    Report { model, errors }
}

/// Unwraps a probe result, or records the error and falls back to the default.
fn settle<T: Default>(result: Result<T, ProbeError>, errors: &mut Vec<ProbeError>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!("{}; section left empty", e);
            errors.push(e);
            T::default()
        }
    }
}
