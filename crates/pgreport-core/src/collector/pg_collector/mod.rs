//! PostgreSQL probes.
//!
//! Reads from the statistics views and catalogs:
//! - `pg_stat_statements` - long and frequent queries (requires extension)
//! - `pg_stat_database`, `pg_statio_user_tables` - buffer cache hit ratios
//! - `pg_database`, `pg_class`, `pg_index`, `pg_stat_user_indexes` - storage
//! - `pg_stat_replication` - standby lag
//! - `pg_settings`, `pg_stat_activity` - server figures
//!
//! ## Sessions
//!
//! Every probe call opens its own [`Session`] through the [`ConnectionFactory`]
//! and drops it before returning. There is no pooling and no state shared
//! between probes, so one failing probe cannot poison the others.

mod cache;
mod queries;
mod replication;
mod server;
mod statements;
mod storage;

pub use server::setting_to_mb;
pub use statements::retain_slow;

use std::time::Instant;

use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};
use tracing::debug;

use crate::collector::ProbeError;
use crate::config::{ConnectionDescriptor, ProbeSettings, SslMode};
use crate::model::Section;

/// `application_name` reported to the server.
const APPLICATION_NAME: &str = "pgreport";

/// Opens short-lived sessions for one connection descriptor.
pub struct ConnectionFactory {
    config: postgres::Config,
    ssl_mode: SslMode,
}

impl ConnectionFactory {
    pub fn new(descriptor: &ConnectionDescriptor) -> Self {
        let mut config = postgres::Config::new();
        config
            .host(&descriptor.host)
            .port(descriptor.port)
            .user(&descriptor.user)
            .dbname(&descriptor.dbname)
            .application_name(APPLICATION_NAME)
            .ssl_mode(match descriptor.ssl_mode {
                SslMode::Disable => postgres::config::SslMode::Disable,
                SslMode::Prefer => postgres::config::SslMode::Prefer,
                SslMode::Require => postgres::config::SslMode::Require,
            });
        if !descriptor.password.is_empty() {
            config.password(&descriptor.password);
        }

        Self {
            config,
            ssl_mode: descriptor.ssl_mode,
        }
    }

    /// Opens a fresh session for `section`. The session closes when dropped.
    pub fn open(&self, section: Section) -> Result<Session, ProbeError> {
        let started = Instant::now();
        let client = match self.ssl_mode {
            SslMode::Disable => self.config.connect(NoTls),
            SslMode::Prefer | SslMode::Require => {
                // Encrypt without verifying the server certificate, as libpq does
                // for these modes.
                let connector = native_tls::TlsConnector::builder()
                    .danger_accept_invalid_certs(true)
                    .build()
                    .map_err(|e| ProbeError::connection(section, format!("TLS: {}", e)))?;
                self.config
                    .connect(postgres_native_tls::MakeTlsConnector::new(connector))
            }
        }
        .map_err(|e| ProbeError::connection(section, format_postgres_error(&e)))?;

        debug!(%section, elapsed_ms = started.elapsed().as_millis() as u64, "session opened");
        Ok(Session { client, section })
    }
}

/// A connection owned by exactly one probe call.
pub struct Session {
    client: Client,
    section: Section,
}

impl Session {
    pub fn query(&mut self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>, ProbeError> {
        self.client
            .query(sql, params)
            .map_err(|e| ProbeError::query(self.section, format_postgres_error(&e)))
    }

    pub fn query_one(&mut self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Row, ProbeError> {
        self.client
            .query_one(sql, params)
            .map_err(|e| ProbeError::query(self.section, format_postgres_error(&e)))
    }

    pub fn query_opt(
        &mut self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, ProbeError> {
        self.client
            .query_opt(sql, params)
            .map_err(|e| ProbeError::query(self.section, format_postgres_error(&e)))
    }

    /// `server_version_num`, e.g. `150004`.
    pub fn server_version_num(&mut self) -> Result<i32, ProbeError> {
        let row = self.query_one("SHOW server_version_num", &[])?;
        let text: String = row.try_get(0).unwrap_or_default();
        text.trim().parse().map_err(|_| {
            ProbeError::query(self.section, format!("bad server_version_num '{}'", text))
        })
    }

    /// True when `pg_stat_statements` is installed in the connected database.
    pub fn statements_available(&mut self) -> Result<bool, ProbeError> {
        Ok(self
            .query_opt(queries::STATEMENTS_EXTENSION_QUERY, &[])?
            .is_some())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!(section = %self.section, "session closed");
    }
}

/// The six PostgreSQL probes, each opening its own session.
pub struct PostgresProbes {
    factory: ConnectionFactory,
    settings: ProbeSettings,
}

impl PostgresProbes {
    pub fn new(descriptor: &ConnectionDescriptor, settings: ProbeSettings) -> Self {
        Self {
            factory: ConnectionFactory::new(descriptor),
            settings,
        }
    }

    fn open(&self, section: Section) -> Result<Session, ProbeError> {
        self.factory.open(section)
    }
}

/// Condenses a driver error into a one-line cause.
///
/// Server errors become `SEVERITY: message`. Client side errors keep their
/// `source()` chain, e.g. `error connecting to server: Connection refused (os error 111)`.
pub(crate) fn format_postgres_error(e: &postgres::Error) -> String {
    match e.as_db_error() {
        Some(db_error) => format!("{}: {}", db_error.severity(), db_error.message()),
        None => error_chain(e),
    }
}

/// `Display` of `e` followed by every cause not already part of it.
fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.is_empty() && !msg.contains(&text) {
            msg.push_str(": ");
            msg.push_str(&text);
        }
        source = std::error::Error::source(cause);
    }
    msg
}
