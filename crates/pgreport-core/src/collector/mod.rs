//! Telemetry probes.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          Collector                            │
//! │  ┌────────────────────────┐   ┌─────────────────────────────┐ │
//! │  │       HostProbe        │   │       PostgresProbes        │ │
//! │  │  Local: /proc/stat,    │   │  long/frequent queries      │ │
//! │  │         /proc/meminfo  │   │  cache hit, storage usage   │ │
//! │  │  Remote: ssh top/free  │   │  replication, server        │ │
//! │  └───────────┬────────────┘   └──────────────┬──────────────┘ │
//! │              │                               │                │
//! │       ┌──────▼──────┐              ┌─────────▼─────────┐      │
//! │       │ FileSystem  │              │ ConnectionFactory │      │
//! │       │ RemoteShell │              │ (session / probe) │      │
//! │       └─────────────┘              └───────────────────┘      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every probe is independent: each PostgreSQL probe opens its own session
//! and drops it before returning, the remote host probe does the same with
//! its SSH session. Failures come back as [`ProbeError`]; nothing panics
//! across a probe boundary.

#[allow(clippy::module_inception)]
mod collector;
pub mod host;
pub mod mock;
mod pg_collector;
pub mod procfs;
pub mod traits;

pub use collector::Collector;
pub use host::{HostProbe, HostStrategy, LocalHostProbe, RemoteHostProbe, RemoteShell, SshShell};
pub use mock::MockFs;
pub use pg_collector::{ConnectionFactory, PostgresProbes, Session, retain_slow, setting_to_mb};
pub use traits::{FileSystem, RealFs};

use crate::model::Section;

/// What went wrong in a probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeErrorKind {
    /// Database unreachable, authentication or protocol failure.
    Connection,
    /// Statement failed or returned unusable data.
    Query,
    /// SSH connect, auth, command or output parse failure.
    HostProbeRemote,
    /// `/proc` unreadable or unparsable.
    HostProbeLocal,
}

/// Error type for a single probe.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub section: Option<Section>,
    pub cause: String,
}

impl ProbeError {
    pub fn new(kind: ProbeErrorKind, section: Option<Section>, cause: impl Into<String>) -> Self {
        Self {
            kind,
            section,
            cause: cause.into(),
        }
    }

    pub fn connection(section: Section, cause: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Connection, Some(section), cause)
    }

    pub fn query(section: Section, cause: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Query, Some(section), cause)
    }

    pub fn remote(cause: impl Into<String>) -> Self {
        Self::new(
            ProbeErrorKind::HostProbeRemote,
            Some(Section::CpuRamUsage),
            cause,
        )
    }

    pub fn local(cause: impl Into<String>) -> Self {
        Self::new(
            ProbeErrorKind::HostProbeLocal,
            Some(Section::CpuRamUsage),
            cause,
        )
    }
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let what = match self.kind {
            ProbeErrorKind::Connection => "connection error",
            ProbeErrorKind::Query => "query error",
            ProbeErrorKind::HostProbeRemote => "remote host probe error",
            ProbeErrorKind::HostProbeLocal => "local host probe error",
        };
        match self.section {
            Some(section) => write!(f, "{} [{}]: {}", what, section, self.cause),
            None => write!(f, "{}: {}", what, self.cause),
        }
    }
}

impl std::error::Error for ProbeError {}
