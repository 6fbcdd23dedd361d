//! Status labels for report metrics.
//!
//! Every function here is total: inputs go through [`Metric::as_metric`],
//! which maps anything unparsable (including NaN) to `0.0`, and the
//! comparisons below are defined for infinities.

use serde::{Deserialize, Serialize};

/// Categorical verdict attached to a metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Excellent,
    Good,
    Warning,
    Critical,
    Active,
    #[serde(rename = "LOW USE")]
    LowUse,
    Inefficient,
    Unused,
}

/// Color family a status is drawn in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Bad,
    Caution,
    Ok,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Excellent => "EXCELLENT",
            Status::Good => "GOOD",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Active => "ACTIVE",
            Status::LowUse => "LOW USE",
            Status::Inefficient => "INEFFICIENT",
            Status::Unused => "UNUSED",
        }
    }

    pub fn tone(self) -> Tone {
        match self {
            Status::Critical | Status::Unused => Tone::Bad,
            Status::Warning | Status::LowUse | Status::Inefficient => Tone::Caution,
            Status::Good | Status::Active | Status::Excellent => Tone::Ok,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Input coercion
// ---------------------------------------------------------------------------

/// Anything that can be read as a metric value.
pub trait Metric {
    /// The value as `f64`; `0.0` when it cannot be read as a number.
    fn as_metric(&self) -> f64;
}

impl Metric for f64 {
    fn as_metric(&self) -> f64 {
        if self.is_nan() { 0.0 } else { *self }
    }
}

impl Metric for f32 {
    fn as_metric(&self) -> f64 {
        (*self as f64).as_metric()
    }
}

impl Metric for i64 {
    fn as_metric(&self) -> f64 {
        *self as f64
    }
}

impl Metric for i32 {
    fn as_metric(&self) -> f64 {
        *self as f64
    }
}

impl Metric for u64 {
    fn as_metric(&self) -> f64 {
        *self as f64
    }
}

impl Metric for usize {
    fn as_metric(&self) -> f64 {
        *self as f64
    }
}

impl Metric for str {
    fn as_metric(&self) -> f64 {
        self.trim().parse::<f64>().map(|v| v.as_metric()).unwrap_or(0.0)
    }
}

impl Metric for String {
    fn as_metric(&self) -> f64 {
        self.as_str().as_metric()
    }
}

impl<T: Metric + ?Sized> Metric for &T {
    fn as_metric(&self) -> f64 {
        (**self).as_metric()
    }
}

impl<T: Metric> Metric for Option<T> {
    fn as_metric(&self) -> f64 {
        self.as_ref().map(Metric::as_metric).unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Threshold rules
// ---------------------------------------------------------------------------

/// Percentage where higher is worse (CPU, RAM).
pub const PCT_WARNING: f64 = 80.0;
pub const PCT_CRITICAL: f64 = 90.0;

/// Cache hit percentage where higher is better.
pub const CACHE_WARNING: f64 = 90.0;
pub const CACHE_CRITICAL: f64 = 80.0;

/// Slow query count.
pub const SLOW_QUERIES_WARNING: f64 = 5.0;
pub const SLOW_QUERIES_CRITICAL: f64 = 10.0;

/// Connection count.
pub const CONNECTIONS_WARNING: f64 = 50.0;
pub const CONNECTIONS_CRITICAL: f64 = 100.0;

/// Index scans below this count are "low use".
pub const INDEX_LOW_USE_SCANS: i64 = 10;
/// Fetched/read tuple ratio below this is "inefficient".
pub const INDEX_MIN_FETCH_RATIO: f64 = 0.1;

/// Higher is worse: `>= critical` CRITICAL, `>= warning` WARNING, else GOOD.
pub fn higher_is_worse(value: impl Metric, warning: f64, critical: f64) -> Status {
    let v = value.as_metric();
    if v >= critical {
        Status::Critical
    } else if v >= warning {
        Status::Warning
    } else {
        Status::Good
    }
}

/// Higher is better: `<= critical` CRITICAL, `<= warning` WARNING, else EXCELLENT.
pub fn higher_is_better(value: impl Metric, warning: f64, critical: f64) -> Status {
    let v = value.as_metric();
    if v <= critical {
        Status::Critical
    } else if v <= warning {
        Status::Warning
    } else {
        Status::Excellent
    }
}

/// Count where higher is worse. Same ordering as [`higher_is_worse`].
pub fn count_higher_is_worse(count: impl Metric, warning: f64, critical: f64) -> Status {
    higher_is_worse(count, warning, critical)
}

pub fn cpu_status(pct: impl Metric) -> Status {
    higher_is_worse(pct, PCT_WARNING, PCT_CRITICAL)
}

pub fn ram_status(pct: impl Metric) -> Status {
    higher_is_worse(pct, PCT_WARNING, PCT_CRITICAL)
}

pub fn cache_hit_status(pct: impl Metric) -> Status {
    higher_is_better(pct, CACHE_WARNING, CACHE_CRITICAL)
}

pub fn slow_queries_status(count: impl Metric) -> Status {
    count_higher_is_worse(count, SLOW_QUERIES_WARNING, SLOW_QUERIES_CRITICAL)
}

pub fn connections_status(count: impl Metric) -> Status {
    count_higher_is_worse(count, CONNECTIONS_WARNING, CONNECTIONS_CRITICAL)
}

/// Classify an index by its scan count and fetch efficiency.
pub fn index_status(scans: impl Metric, tup_read: impl Metric, tup_fetch: impl Metric) -> Status {
    let scans = as_count(scans);
    let read = as_count(tup_read);
    let fetch = as_count(tup_fetch);

    if scans == 0 {
        Status::Unused
    } else if scans < INDEX_LOW_USE_SCANS {
        Status::LowUse
    } else if (fetch as f64 / read.max(1) as f64) < INDEX_MIN_FETCH_RATIO {
        Status::Inefficient
    } else {
        Status::Active
    }
}

/// Truncate toward zero; saturates on infinities.
fn as_count(value: impl Metric) -> i64 {
    value.as_metric() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_hit_thresholds() {
        assert_eq!(cache_hit_status(87.3), Status::Warning);
        assert_eq!(cache_hit_status(79.9), Status::Critical);
        assert_eq!(cache_hit_status(95.0), Status::Excellent);
        assert_eq!(cache_hit_status(80.0), Status::Critical);
        assert_eq!(cache_hit_status(90.0), Status::Warning);
    }

    #[test]
    fn percentage_thresholds() {
        assert_eq!(cpu_status(95.0), Status::Critical);
        assert_eq!(cpu_status(90.0), Status::Critical);
        assert_eq!(ram_status(80.0), Status::Warning);
        assert_eq!(ram_status(79.99), Status::Good);
    }

    #[test]
    fn count_thresholds() {
        assert_eq!(slow_queries_status(10usize), Status::Critical);
        assert_eq!(slow_queries_status(5usize), Status::Warning);
        assert_eq!(slow_queries_status(4usize), Status::Good);
        assert_eq!(connections_status(100i64), Status::Critical);
        assert_eq!(connections_status(50i64), Status::Warning);
        assert_eq!(connections_status(49i64), Status::Good);
    }

    #[test]
    fn index_status_rules() {
        assert_eq!(index_status(0i64, 0i64, 0i64), Status::Unused);
        assert_eq!(index_status(5i64, 100i64, 50i64), Status::LowUse);
        assert_eq!(index_status(100i64, 1000i64, 50i64), Status::Inefficient);
        assert_eq!(index_status(100i64, 1000i64, 500i64), Status::Active);
    }

    #[test]
    fn index_status_guards_zero_reads() {
        // fetch / max(read, 1)
        assert_eq!(index_status(50i64, 0i64, 0i64), Status::Inefficient);
        assert_eq!(index_status(50i64, 0i64, 1i64), Status::Active);
    }

    #[test]
    fn classifiers_are_total() {
        for v in [
            f64::NAN,
            f64::INFINITY,
            f64::NEG_INFINITY,
            -1.0,
            0.0,
            f64::MAX,
            f64::MIN_POSITIVE,
        ] {
            let _ = cpu_status(v);
            let _ = cache_hit_status(v);
            let _ = slow_queries_status(v);
            let _ = connections_status(v);
            let _ = index_status(v, v, v);
        }
    }

    #[test]
    fn nan_is_treated_as_zero() {
        assert_eq!(cpu_status(f64::NAN), Status::Good);
        assert_eq!(cache_hit_status(f64::NAN), Status::Critical);
        assert_eq!(index_status(f64::NAN, 1.0, 1.0), Status::Unused);
    }

    #[test]
    fn infinities() {
        assert_eq!(cpu_status(f64::INFINITY), Status::Critical);
        assert_eq!(cpu_status(f64::NEG_INFINITY), Status::Good);
        assert_eq!(cache_hit_status(f64::INFINITY), Status::Excellent);
        assert_eq!(cache_hit_status(f64::NEG_INFINITY), Status::Critical);
    }

    #[test]
    fn string_inputs_fall_back_to_zero() {
        assert_eq!(cpu_status("91.5"), Status::Critical);
        assert_eq!(cpu_status(" 85 "), Status::Warning);
        assert_eq!(cpu_status("n/a"), Status::Good);
        assert_eq!(cache_hit_status("garbage"), Status::Critical);
        assert_eq!(connections_status(None::<i64>), Status::Good);
        assert_eq!(connections_status(Some(120i64)), Status::Critical);
    }

    #[test]
    fn labels_and_tones() {
        assert_eq!(Status::LowUse.label(), "LOW USE");
        assert_eq!(Status::Unused.tone(), Tone::Bad);
        assert_eq!(Status::Inefficient.tone(), Tone::Caution);
        assert_eq!(Status::Excellent.tone(), Tone::Ok);
        assert_eq!(Status::Critical.to_string(), "CRITICAL");
    }
}
