//! pgreport - one-shot PostgreSQL observability report.
//!
//! Samples the target database and its host once, classifies the results
//! and writes them as a PDF. Probe failures degrade single sections; only a
//! bad configuration or an unwritable output fails the run.

mod document;
mod pdf;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use pgreport_core::collector::Collector;
use pgreport_core::config::{AppConfig, ConfigError};
use pgreport_core::model::ReportModel;
use pgreport_core::report::assemble;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_SHA"), ")");

/// One-shot PostgreSQL observability report.
#[derive(Parser, Debug)]
#[command(name = "pgreport", about = "PostgreSQL monitoring report generator", version = VERSION)]
struct Args {
    /// YAML config with a `database:` mapping.
    /// Falls back to PGHOST/PGPORT/PGUSER/PGPASSWORD/PGDATABASE when the file is missing.
    #[arg(short, long, default_value = "config/db_config.yaml")]
    config: PathBuf,

    /// PDF output path.
    #[arg(short, long, default_value = "db_monitoring_report.pdf")]
    output: PathBuf,

    /// Also write the report model as JSON.
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Log level for the flags. Quiet still shows warnings, since degraded
/// probes are reported that way.
fn log_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// Initializes the tracing subscriber on stderr.
/// Default level is INFO. Use -q for quiet mode (warnings and errors).
fn init_logging(verbose: u8, quiet: bool) {
    let level = log_level(verbose, quiet);

    let mut filter = EnvFilter::from_default_env();
    for target in ["pgreport", "pgreport_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Reads the config file, or the environment when there is none.
fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if path.exists() {
        info!(path = %path.display(), "loading configuration");
        AppConfig::from_file(path)
    } else {
        warn!(path = %path.display(), "config file not found, using PG* environment");
        AppConfig::from_env()
    }
}

fn write_json(model: &ReportModel, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(model).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!("pgreport {} starting", VERSION);

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let db = &config.database;
    info!(
        "Target: {}@{}:{}/{} (host probe: {})",
        db.user,
        db.host,
        db.port,
        db.dbname,
        if db.is_local_host() { "local" } else { "ssh" }
    );

    let collector = Collector::new(&config);
    let report = assemble(&collector);
    if report.is_degraded() {
        warn!(
            "{} probe(s) failed; affected sections are empty",
            report.errors.len()
        );
    }

    if let Some(path) = &args.json {
        if let Err(e) = write_json(&report.model, path) {
            error!(path = %path.display(), "failed to write JSON: {}", e);
            return ExitCode::FAILURE;
        }
        info!(path = %path.display(), "JSON written");
    }

    let doc = document::build(&report, db, &config.report, Local::now().naive_local());
    match pdf::write(&doc, &args.output) {
        Ok(pages) => {
            info!(path = %args.output.display(), pages, "report written");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(path = %args.output.display(), "failed to write report: {}", e);
            ExitCode::FAILURE
        }
    }
}
