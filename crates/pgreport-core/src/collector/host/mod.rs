//! Host resource probe.
//!
//! Samples CPU and memory of the machine that runs PostgreSQL, which is not
//! necessarily the machine running the reporter. The strategy is picked from
//! the configured host: a localhost literal reads `/proc` directly, anything
//! else runs `top`/`free` over SSH.

mod local;
mod remote;

pub use local::{LocalHostProbe, cpu_busy_pct, memory_metrics};
pub use remote::{
    AuthMethod, CPU_COMMAND, DEFAULT_KEY_FILES, MEM_COMMAND, RemoteHostProbe, RemoteShell,
    SshShell, auth_method, default_key_files, parse_cpu_idle, parse_free_mb, sample_with,
};

use tracing::debug;

use crate::collector::ProbeError;
use crate::collector::traits::RealFs;
use crate::config::{ConnectionDescriptor, is_local_host};
use crate::model::HostMetrics;

/// Which way the host gets sampled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostStrategy {
    Local,
    Remote,
}

impl HostStrategy {
    pub fn for_host(host: &str) -> Self {
        if is_local_host(host) {
            HostStrategy::Local
        } else {
            HostStrategy::Remote
        }
    }
}

/// Host probe bound to one connection descriptor.
pub enum HostProbe {
    Local(LocalHostProbe<RealFs>),
    Remote(RemoteHostProbe),
}

impl HostProbe {
    pub fn new(descriptor: &ConnectionDescriptor) -> Self {
        match HostStrategy::for_host(&descriptor.host) {
            HostStrategy::Local => HostProbe::Local(LocalHostProbe::new(RealFs::new(), "/proc")),
            HostStrategy::Remote => HostProbe::Remote(RemoteHostProbe::new(
                descriptor.host.clone(),
                descriptor.ssh.clone(),
            )),
        }
    }

    pub fn strategy(&self) -> HostStrategy {
        match self {
            HostProbe::Local(_) => HostStrategy::Local,
            HostProbe::Remote(_) => HostStrategy::Remote,
        }
    }

    /// Takes one sample. Each call is a fresh probe.
    pub fn sample(&self) -> Result<HostMetrics, ProbeError> {
        debug!(strategy = ?self.strategy(), "sampling host resources");
        match self {
            HostProbe::Local(probe) => probe.sample(),
            HostProbe::Remote(probe) => probe.sample(),
        }
    }
}
