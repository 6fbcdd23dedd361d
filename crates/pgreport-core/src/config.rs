//! Connection descriptor and probe settings.
//!
//! Loaded either from a YAML file:
//!
//! ```yaml
//! database:
//!   host: db.example.net
//!   port: 5432
//!   user: report
//!   password: secret
//!   dbname: app
//!   ssh_user: pg          # default: postgres
//!   ssh_key: /k.pem       # preferred over ssh_password
//!   ssh_port: 22
//! report:                 # optional
//!   long_query_threshold_ms: 600
//! ```
//!
//! or from the standard libpq environment variables (`PGHOST`, `PGPORT`,
//! `PGUSER`, `PGPASSWORD`, `PGDATABASE`) plus `PGREPORT_SSH_*`.

use std::path::Path;

use serde::Deserialize;

/// Host literals that select the local host probe (compared case-insensitively).
///
/// `0.0.0.1` is kept as-is for compatibility with existing configurations.
pub const LOCAL_HOSTS: [&str; 4] = ["localhost", "127.0.0.1", "0.0.0.1", "::1"];

pub const DEFAULT_SSH_USER: &str = "postgres";
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_LONG_QUERY_THRESHOLD_MS: f64 = 600.0;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Io(String),
    /// Config file is not valid YAML or has wrong types.
    Parse(String),
    /// A value is out of range or missing.
    Invalid(String),
    /// Environment variable not set.
    EnvNotSet(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
            ConfigError::EnvNotSet(var) => write!(f, "config: {} not set", var),
        }
    }
}

impl std::error::Error for ConfigError {}

/// TLS policy for the PostgreSQL connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    #[default]
    Disable,
    Prefer,
    Require,
}

impl std::str::FromStr for SslMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disable" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            other => Err(ConfigError::Invalid(format!("unknown sslmode '{}'", other))),
        }
    }
}

/// SSH access to the database host, used by the remote host probe.
#[derive(Clone, Debug, PartialEq)]
pub struct SshSettings {
    pub user: String,
    pub password: Option<String>,
    pub key: Option<String>,
    pub port: u16,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: DEFAULT_SSH_USER.to_string(),
            password: None,
            key: None,
            port: DEFAULT_SSH_PORT,
        }
    }
}

/// Where and how to reach the target database. Read-only after load.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub ssl_mode: SslMode,
    pub ssh: SshSettings,
}

impl ConnectionDescriptor {
    /// True when `host` names the machine the reporter runs on.
    pub fn is_local_host(&self) -> bool {
        is_local_host(&self.host)
    }
}

/// Topology decision for the host probe.
pub fn is_local_host(host: &str) -> bool {
    LOCAL_HOSTS.iter().any(|h| h.eq_ignore_ascii_case(host.trim()))
}

/// Row limits of the probes.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TopN {
    pub long_queries: i64,
    pub frequent_queries: i64,
    pub per_table_cache: i64,
    pub index_heap: i64,
    pub tables: i64,
    pub indexes: i64,
    pub index_usage: i64,
}

impl Default for TopN {
    fn default() -> Self {
        Self {
            long_queries: 10,
            frequent_queries: 10,
            per_table_cache: 20,
            index_heap: 20,
            tables: 50,
            indexes: 20,
            index_usage: 50,
        }
    }
}

/// Probe parameters.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Statements with a mean execution time above this are "slow".
    pub long_query_threshold_ms: f64,
    pub limits: TopN,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            long_query_threshold_ms: DEFAULT_LONG_QUERY_THRESHOLD_MS,
            limits: TopN::default(),
        }
    }
}

/// Full application configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub database: ConnectionDescriptor,
    pub report: ProbeSettings,
}

/// `database:` mapping as written in the file, before validation.
#[derive(Deserialize)]
struct RawDatabase {
    host: String,
    port: i64,
    user: String,
    #[serde(default)]
    password: Option<String>,
    dbname: String,
    #[serde(default)]
    sslmode: SslMode,
    #[serde(default)]
    ssh_user: Option<String>,
    #[serde(default)]
    ssh_password: Option<String>,
    #[serde(default)]
    ssh_key: Option<String>,
    #[serde(default)]
    ssh_port: Option<i64>,
}

#[derive(Deserialize)]
struct RawConfig {
    database: RawDatabase,
    #[serde(default)]
    report: ProbeSettings,
}

impl AppConfig {
    /// Loads and validates a YAML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Parses and validates YAML config content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let db = raw.database;

        let config = AppConfig {
            database: ConnectionDescriptor {
                host: db.host,
                port: port_from(db.port, "port")?,
                user: db.user,
                password: db.password.unwrap_or_default(),
                dbname: db.dbname,
                ssl_mode: db.sslmode,
                ssh: SshSettings {
                    user: non_empty(db.ssh_user).unwrap_or_else(|| DEFAULT_SSH_USER.to_string()),
                    password: non_empty(db.ssh_password),
                    key: non_empty(db.ssh_key),
                    port: match db.ssh_port {
                        Some(p) => port_from(p, "ssh_port")?,
                        None => DEFAULT_SSH_PORT,
                    },
                },
            },
            report: raw.report,
        };
        config.validate()?;
        Ok(config)
    }

    /// Builds the config from libpq environment variables.
    ///
    /// Uses $USER as default if PGUSER is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let user = get("PGUSER")
            .or_else(|| get("USER"))
            .ok_or_else(|| ConfigError::EnvNotSet("PGUSER or USER".to_string()))?;

        let host = get("PGHOST").unwrap_or_else(|| "localhost".to_string());
        let port = match get("PGPORT") {
            Some(p) => parse_port(&p, "PGPORT")?,
            None => 5432,
        };
        let password = get("PGPASSWORD").unwrap_or_default();
        let dbname = get("PGDATABASE").unwrap_or_else(|| user.clone());
        let ssl_mode = match get("PGSSLMODE") {
            Some(m) => m.parse()?,
            None => SslMode::default(),
        };
        let ssh_port = match get("PGREPORT_SSH_PORT") {
            Some(p) => parse_port(&p, "PGREPORT_SSH_PORT")?,
            None => DEFAULT_SSH_PORT,
        };

        let config = AppConfig {
            database: ConnectionDescriptor {
                host,
                port,
                user,
                password,
                dbname,
                ssl_mode,
                ssh: SshSettings {
                    user: non_empty(get("PGREPORT_SSH_USER"))
                        .unwrap_or_else(|| DEFAULT_SSH_USER.to_string()),
                    password: non_empty(get("PGREPORT_SSH_PASSWORD")),
                    key: non_empty(get("PGREPORT_SSH_KEY")),
                    port: ssh_port,
                },
            },
            report: ProbeSettings::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges. Called by every constructor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let db = &self.database;
        if db.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        if db.port == 0 {
            return Err(ConfigError::Invalid("port must be in 1..=65535".to_string()));
        }
        if db.user.trim().is_empty() {
            return Err(ConfigError::Invalid("user must not be empty".to_string()));
        }
        if db.dbname.trim().is_empty() {
            return Err(ConfigError::Invalid("dbname must not be empty".to_string()));
        }
        if db.ssh.port == 0 {
            return Err(ConfigError::Invalid("ssh_port must be in 1..=65535".to_string()));
        }

        let report = &self.report;
        if !report.long_query_threshold_ms.is_finite() || report.long_query_threshold_ms < 0.0 {
            return Err(ConfigError::Invalid(
                "long_query_threshold_ms must be a non-negative number".to_string(),
            ));
        }
        let l = &report.limits;
        for (name, v) in [
            ("long_queries", l.long_queries),
            ("frequent_queries", l.frequent_queries),
            ("per_table_cache", l.per_table_cache),
            ("index_heap", l.index_heap),
            ("tables", l.tables),
            ("indexes", l.indexes),
            ("index_usage", l.index_usage),
        ] {
            if v < 1 {
                return Err(ConfigError::Invalid(format!(
                    "limits.{} must be at least 1",
                    name
                )));
            }
        }
        Ok(())
    }
}

fn port_from(value: i64, name: &str) -> Result<u16, ConfigError> {
    u16::try_from(value)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ConfigError::Invalid(format!("{} must be in 1..=65535, got {}", name, value)))
}

fn parse_port(value: &str, name: &str) -> Result<u16, ConfigError> {
    let v: i64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} is not a number: '{}'", name, value)))?;
    port_from(v, name)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
