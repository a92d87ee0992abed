//! Runtime configuration for core callers.
//!
//! # Responsibility
//! - Collect database and logging settings from `MEMBERDB_*` variables.
//! - Open the configured database.
//!
//! # Invariants
//! - A missing or empty `MEMBERDB_DB_PATH` selects an in-memory database.
//! - Log level is validated at load time, not at logger start.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::logging::{default_log_level, init_logging, normalize_level};
use config::{Config, ConfigError, Environment, Map};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "MEMBERDB";
pub const ENV_DB_PATH: &str = "MEMBERDB_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "MEMBERDB_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "MEMBERDB_LOG_DIR";

/// Settings shared by the CLI and embedding callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default = "default_level_string")]
    pub log_level: String,
    /// Logging stays off when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_level_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(environment())
    }

    /// Reads the given variables instead of the process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source: Map<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self::load(environment().source(Some(source)))
    }

    fn load(source: Environment) -> Result<Self, ConfigError> {
        let mut config: Self = Config::builder()
            .set_default("log_level", default_log_level())?
            .add_source(source)
            .build()?
            .try_deserialize()?;

        config.log_level = normalize_level(&config.log_level)
            .map_err(ConfigError::Message)?
            .to_string();
        Ok(config)
    }

    /// Opens and migrates the configured database.
    pub fn open_db(&self) -> DbResult<Connection> {
        match &self.db_path {
            Some(path) => open_db(path),
            None => open_db_in_memory(),
        }
    }

    /// Starts file logging when a log directory is configured.
    ///
    /// Returns whether logging was started.
    pub fn init_logging(&self) -> Result<bool, String> {
        match &self.log_dir {
            Some(log_dir) => init_logging(&self.log_level, log_dir).map(|()| true),
            None => Ok(false),
        }
    }
}

// No separator: `MEMBERDB_DB_PATH` maps to the flat `db_path` key.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .ignore_empty(true)
}

fn default_level_string() -> String {
    default_log_level().to_string()
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, ENV_DB_PATH, ENV_LOG_DIR, ENV_LOG_LEVEL};
    use crate::db::schema::{latest_version, schema_version};
    use crate::logging::default_log_level;
    use std::path::PathBuf;

    #[test]
    fn empty_environment_uses_defaults() {
        let config = CoreConfig::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.log_level, default_log_level());
    }

    #[test]
    fn reads_and_normalizes_values() {
        let config = CoreConfig::from_vars([
            (ENV_DB_PATH, "/tmp/members.sqlite3"),
            (ENV_LOG_LEVEL, "WARNING"),
            (ENV_LOG_DIR, ""),
        ])
        .unwrap();

        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/members.sqlite3")));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn ignores_variables_without_prefix() {
        let config = CoreConfig::from_vars([("DB_PATH", "/tmp/other.db")]).unwrap();
        assert_eq!(config.db_path, None);
    }

    #[test]
    fn rejects_unknown_log_level() {
        let error = CoreConfig::from_vars([(ENV_LOG_LEVEL, "loud")]).unwrap_err();
        assert!(error.to_string().contains("unsupported log level"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: CoreConfig = serde_json::from_str(r#"{"db_path":"members.db"}"#).unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("members.db")));
        assert_eq!(config.log_level, default_log_level());
    }

    #[test]
    fn open_db_falls_back_to_memory_and_logging_stays_off() {
        let config = CoreConfig::default();
        let conn = config.open_db().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), latest_version());
        assert!(!config.init_logging().unwrap());
    }
}
