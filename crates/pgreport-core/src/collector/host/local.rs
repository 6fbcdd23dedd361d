//! Local strategy: `/proc/stat` and `/proc/meminfo`.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::collector::ProbeError;
use crate::collector::procfs::{CpuTimes, MemInfo, parse_cpu_times, parse_meminfo};
use crate::collector::traits::FileSystem;
use crate::fmt::{bytes_to_gb, round2};
use crate::model::HostMetrics;

/// CPU sampling window.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Reads host metrics from a proc filesystem.
pub struct LocalHostProbe<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
    interval: Duration,
}

impl<F: FileSystem> LocalHostProbe<F> {
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Samples CPU over one interval, then reads memory.
    pub fn sample(&self) -> Result<HostMetrics, ProbeError> {
        let before = self.read_cpu()?;
        if !self.interval.is_zero() {
            thread::sleep(self.interval);
        }
        let after = self.read_cpu()?;

        let meminfo = self.read("meminfo")?;
        let mem = parse_meminfo(&meminfo).map_err(|e| ProbeError::local(e.to_string()))?;

        Ok(HostMetrics {
            cpu_pct: cpu_busy_pct(&before, &after),
            ..memory_metrics(&mem)
        })
    }

    fn read_cpu(&self) -> Result<CpuTimes, ProbeError> {
        let stat = self.read("stat")?;
        parse_cpu_times(&stat).map_err(|e| ProbeError::local(e.to_string()))
    }

    fn read(&self, name: &str) -> Result<String, ProbeError> {
        let path = self.proc_path.join(name);
        self.fs
            .read_to_string(&path)
            .map_err(|e| ProbeError::local(format!("{}: {}", path.display(), e)))
    }
}

/// Busy percentage between two `/proc/stat` samples; `0.0` when no time passed.
pub fn cpu_busy_pct(prev: &CpuTimes, cur: &CpuTimes) -> f64 {
    let total = cur.total().saturating_sub(prev.total());
    if total == 0 {
        return 0.0;
    }
    let idle = cur.idle_total().saturating_sub(prev.idle_total()).min(total);
    round2(100.0 * (1.0 - idle as f64 / total as f64))
}

/// Memory part of [`HostMetrics`] from `/proc/meminfo`; `cpu_pct` is left at zero.
pub fn memory_metrics(mem: &MemInfo) -> HostMetrics {
    let total = mem.mem_total;

    let cache = mem.buffers + mem.cached + mem.s_reclaimable;
    let used = total
        .checked_sub(mem.mem_free + cache)
        .unwrap_or_else(|| total.saturating_sub(mem.mem_free));

    let available = if mem.mem_available > 0 {
        mem.mem_available
    } else {
        mem.mem_free + mem.buffers + mem.cached
    }
    .min(total);

    let ram_pct = if total > 0 {
        round2((total - available) as f64 / total as f64 * 100.0)
    } else {
        0.0
    };

    HostMetrics {
        cpu_pct: 0.0,
        ram_pct,
        ram_total_gb: bytes_to_gb(total * 1024),
        ram_used_gb: bytes_to_gb(used * 1024),
        ram_available_gb: bytes_to_gb(available * 1024),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ProbeErrorKind;
    use crate::collector::mock::MockFs;

    #[test]
    fn sample_from_typical_host() {
        let probe = LocalHostProbe::new(MockFs::typical_host(), "/proc").with_interval(Duration::ZERO);
        let m = probe.sample().unwrap();

        // Same /proc/stat read twice: no elapsed ticks.
        assert_eq!(m.cpu_pct, 0.0);
        assert_eq!(m.ram_pct, 25.0);
        assert_eq!(m.ram_total_gb, 16.0);
        assert_eq!(m.ram_used_gb, 3.75);
        assert_eq!(m.ram_available_gb, 12.0);
    }

    #[test]
    fn missing_proc_is_a_local_error() {
        let probe = LocalHostProbe::new(MockFs::new(), "/proc").with_interval(Duration::ZERO);
        let err = probe.sample().unwrap_err();
        assert_eq!(err.kind, ProbeErrorKind::HostProbeLocal);
        assert!(err.cause.contains("/proc/stat"));
    }

    #[test]
    fn busy_pct_counts_iowait_as_idle() {
        let prev = CpuTimes {
            user: 100,
            idle: 800,
            iowait: 100,
            ..Default::default()
        };
        let cur = CpuTimes {
            user: 150,
            system: 25,
            idle: 900,
            iowait: 125,
            ..Default::default()
        };
        // total delta 200, idle delta 125
        assert_eq!(cpu_busy_pct(&prev, &cur), 37.5);
    }

    #[test]
    fn busy_pct_without_elapsed_time() {
        let t = CpuTimes {
            user: 10,
            idle: 90,
            ..Default::default()
        };
        assert_eq!(cpu_busy_pct(&t, &t), 0.0);
    }

    #[test]
    fn busy_pct_survives_counter_reset() {
        let prev = CpuTimes {
            user: 1000,
            idle: 9000,
            ..Default::default()
        };
        let cur = CpuTimes {
            user: 10,
            idle: 90,
            ..Default::default()
        };
        assert_eq!(cpu_busy_pct(&prev, &cur), 0.0);
    }

    #[test]
    fn memory_falls_back_without_mem_available() {
        let mem = MemInfo {
            mem_total: 1024 * 1024,
            mem_free: 256 * 1024,
            mem_available: 0,
            buffers: 0,
            cached: 256 * 1024,
            s_reclaimable: 0,
        };
        let m = memory_metrics(&mem);
        assert_eq!(m.ram_available_gb, 0.5);
        assert_eq!(m.ram_pct, 50.0);
        assert_eq!(m.ram_used_gb, 0.5);
    }

    #[test]
    fn memory_used_falls_back_when_caches_exceed_total() {
        let mem = MemInfo {
            mem_total: 1000,
            mem_free: 400,
            mem_available: 500,
            buffers: 300,
            cached: 400,
            s_reclaimable: 0,
        };
        let m = memory_metrics(&mem);
        assert_eq!(m.ram_used_gb, bytes_to_gb(600 * 1024));
        assert_eq!(m.ram_pct, 50.0);
    }
}
