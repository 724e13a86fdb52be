//! Connection pool configuration
//!
//! A `PoolConfig` is immutable once built. It can be assembled in code, read
//! from a TOML document, or read from `TESSERA_*` environment variables.

use crate::errors::{config_error, io_error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tessera_core_types::Sensitive;

pub const ENV_DATABASE_URL: &str = "TESSERA_DATABASE_URL";
pub const ENV_DATABASE_USER: &str = "TESSERA_DATABASE_USER";
pub const ENV_DATABASE_PASSWORD: &str = "TESSERA_DATABASE_PASSWORD";
pub const ENV_MAX_CONNECTIONS: &str = "TESSERA_POOL_MAX_CONNECTIONS";
pub const ENV_AUTO_COMMIT: &str = "TESSERA_POOL_AUTO_COMMIT";
pub const ENV_ACQUIRE_TIMEOUT_MS: &str = "TESSERA_POOL_ACQUIRE_TIMEOUT_MS";

const DEFAULT_MAX_CONNECTIONS: usize = 10;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;

/// Pool settings
///
/// `max_connections` below 1 is coerced to 1. An `acquire_timeout` of `None`
/// makes `acquire()` wait indefinitely.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    url: String,
    username: Option<String>,
    password: Option<Sensitive<String>>,
    max_connections: usize,
    auto_commit: bool,
    acquire_timeout: Option<Duration>,
}

/// On-disk shape, with serde defaults
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPoolConfig {
    url: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<Sensitive<String>>,
    #[serde(default = "default_max_connections")]
    max_connections: usize,
    #[serde(default = "default_auto_commit")]
    auto_commit: bool,
    /// 0 disables the timeout
    #[serde(default = "default_acquire_timeout_ms")]
    acquire_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    database: RawPoolConfig,
}

fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

fn default_auto_commit() -> bool {
    true
}

fn default_acquire_timeout_ms() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT_MS
}

fn timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl PoolConfig {
    /// Defaults: 10 connections, auto-commit on, 30 s acquire timeout
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            auto_commit: true,
            acquire_timeout: timeout_from_ms(DEFAULT_ACQUIRE_TIMEOUT_MS),
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<Sensitive<String>>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Parse the `[database]` table of a TOML document
    ///
    /// ```
    /// use tessera_store::config::PoolConfig;
    ///
    /// let config = PoolConfig::from_toml_str(r#"
    ///     [database]
    ///     url = "tessera.db"
    ///     max_connections = 4
    /// "#).unwrap();
    /// assert_eq!(config.max_connections(), 4);
    /// assert!(config.auto_commit());
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(source)
            .map_err(|e| config_error(format!("invalid pool configuration: {}", e)))?;
        Ok(Self::from_raw(file.database))
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())
            .map_err(|e| io_error("read_config", e))?;
        Self::from_toml_str(&source)
    }

    /// Read `TESSERA_*` variables; only the URL is required
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(ENV_DATABASE_URL)
            .ok_or_else(|| config_error(format!("{} is not set", ENV_DATABASE_URL)))?;

        let max_connections = match lookup(ENV_MAX_CONNECTIONS) {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                config_error(format!("{} must be an integer: {}", ENV_MAX_CONNECTIONS, e))
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        let auto_commit = match lookup(ENV_AUTO_COMMIT) {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| config_error(format!("{} must be true or false", ENV_AUTO_COMMIT)))?,
            None => true,
        };
        let acquire_timeout_ms = match lookup(ENV_ACQUIRE_TIMEOUT_MS) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                config_error(format!("{} must be an integer: {}", ENV_ACQUIRE_TIMEOUT_MS, e))
            })?,
            None => DEFAULT_ACQUIRE_TIMEOUT_MS,
        };

        Ok(Self::from_raw(RawPoolConfig {
            url,
            username: lookup(ENV_DATABASE_USER),
            password: lookup(ENV_DATABASE_PASSWORD).map(Sensitive::new),
            max_connections,
            auto_commit,
            acquire_timeout_ms,
        }))
    }

    fn from_raw(raw: RawPoolConfig) -> Self {
        Self {
            url: raw.url,
            username: raw.username,
            password: raw.password,
            max_connections: raw.max_connections.max(1),
            auto_commit: raw.auto_commit,
            acquire_timeout: timeout_from_ms(raw.acquire_timeout_ms),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&Sensitive<String>> {
        self.password.as_ref()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
