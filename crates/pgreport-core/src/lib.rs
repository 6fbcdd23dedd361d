//! pgreport-core - telemetry acquisition and classification for pgreport.
//!
//! Provides:
//! - `config` - connection descriptor and probe settings (YAML or libpq env)
//! - `collector` - host probe (local `/proc` or remote SSH) and PostgreSQL probes
//! - `model` - row shapes and the assembled report model
//! - `report` - assembler merging probe outputs into the fixed section order
//! - `classify` - status labels for metrics (pure, total functions)
//! - `summary` - executive summary projection of a report
//! - `fmt` - shared formatting helpers (execution time, bytes, query text)

pub mod classify;
pub mod collector;
pub mod config;
pub mod fmt;
pub mod model;
pub mod report;
pub mod summary;
