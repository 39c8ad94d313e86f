//! Simulator configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Store credentials are required; every
//! other key falls back to a default.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::SimulatorError;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single-line output.
    Text,
    /// One JSON object per event.
    Json,
}

/// Connection parameters for the relational store.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Store host name.
    pub host: String,
    /// Store port.
    pub port: u16,
    /// Database name.
    pub name: String,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Namespace holding the simulator tables. Always a validated identifier.
    pub schema: String,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// Timeout for acquiring a connection.
    pub connect_timeout: Duration,
    /// Server-side statement timeout.
    pub statement_timeout: Duration,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("schema", &self.schema)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

/// Top-level simulator configuration.
///
/// Loaded once at startup via [`SimulatorConfig::from_env`].
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Store connection settings.
    pub database: DatabaseConfig,

    /// Interval between periodic steps.
    pub tick_interval: Duration,

    /// Upper bound on the status insert of a single tick.
    pub tick_timeout: Duration,

    /// Probability that a successful tick also moves a device.
    pub reassign_probability: f64,

    /// Optional JSON file replacing the built-in reference data.
    pub reference_data_path: Option<PathBuf>,

    /// Fixed seed for reproducible runs; seeded from the OS when unset.
    pub random_seed: Option<u64>,

    /// Log output format.
    pub log_format: LogFormat,
}

impl SimulatorConfig {
    /// Loads configuration from the process environment.
    ///
    /// Calls `dotenvy::dotenv().ok()` first to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::MissingConfig`] if a required key is unset
    /// and [`SimulatorError::InvalidConfig`] if a value is unusable.
    pub fn from_env() -> Result<Self, SimulatorError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`SimulatorConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SimulatorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, SimulatorError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(SimulatorError::MissingConfig(key))
        };

        let host = required("DB_HOST")?;
        let name = required("DB_NAME")?;
        let user = required("DB_USER")?;
        let password = required("DB_PASSWORD")?;

        let port = match lookup("DB_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                SimulatorError::InvalidConfig(format!("DB_PORT is not a valid port: {raw}"))
            })?,
            None => 5432,
        };

        let schema = lookup("DB_SCHEMA").unwrap_or_else(|| "simulator".to_string());
        validate_identifier(&schema)?;

        let tick_interval_secs: u64 = parse_value(&lookup, "TICK_INTERVAL_SECS", 10);
        if tick_interval_secs == 0 {
            return Err(SimulatorError::InvalidConfig(
                "TICK_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        let tick_timeout_secs: u64 = parse_value(&lookup, "TICK_TIMEOUT_SECS", 8);
        if tick_timeout_secs == 0 {
            return Err(SimulatorError::InvalidConfig(
                "TICK_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        let reassign_probability: f64 = parse_value(&lookup, "REASSIGN_PROBABILITY", 0.1);
        if !(0.0..=1.0).contains(&reassign_probability) {
            return Err(SimulatorError::InvalidConfig(format!(
                "REASSIGN_PROBABILITY must be within [0, 1], got {reassign_probability}"
            )));
        }

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") | Some("TEXT") => LogFormat::Text,
            Some("json") | Some("JSON") => LogFormat::Json,
            Some(other) => {
                return Err(SimulatorError::InvalidConfig(format!(
                    "LOG_FORMAT must be `text` or `json`, got `{other}`"
                )));
            }
        };

        Ok(Self {
            database: DatabaseConfig {
                host,
                port,
                name,
                user,
                password,
                schema,
                max_connections: parse_value(&lookup, "DATABASE_MAX_CONNECTIONS", 2),
                connect_timeout: Duration::from_secs(parse_value(
                    &lookup,
                    "DATABASE_CONNECT_TIMEOUT_SECS",
                    5,
                )),
                statement_timeout: Duration::from_millis(parse_value(
                    &lookup,
                    "DATABASE_STATEMENT_TIMEOUT_MS",
                    5000,
                )),
            },
            tick_interval: Duration::from_secs(tick_interval_secs),
            tick_timeout: Duration::from_secs(tick_timeout_secs),
            reassign_probability,
            reference_data_path: lookup("REFERENCE_DATA_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            random_seed: lookup("RANDOM_SEED").and_then(|v| v.trim().parse().ok()),
            log_format,
        })
    }
}

/// Parses a value as `T`, returning `default` on missing or invalid input.
fn parse_value<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Checks that `name` is safe to interpolate as an unquoted SQL identifier.
///
/// Identifiers cannot be bound as statement parameters, so the schema name
/// is the only value ever spliced into SQL text.
///
/// # Errors
///
/// Returns [`SimulatorError::InvalidConfig`] for anything other than
/// `[a-z_][a-z0-9_]*` up to 63 bytes.
pub fn validate_identifier(name: &str) -> Result<(), SimulatorError> {
    let mut chars = name.chars();
    let valid_head = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let valid_tail = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid_head && valid_tail && name.len() <= 63 {
        Ok(())
    } else {
        Err(SimulatorError::InvalidConfig(format!(
            "`{name}` is not a valid schema identifier"
        )))
    }
}
