//! Server configuration.
//!
//! Values resolve in precedence order: CLI flag, then environment,
//! then config file, then built-in default. The config file is TOML:
//!
//! ```toml
//! bind = "0.0.0.0"
//! port = 8888
//! max_connections = 50
//! shutdown_grace_secs = 5
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8888;

/// Default maximum number of concurrent sessions.
pub const DEFAULT_MAX_CONNECTIONS: usize = 50;

/// Default bind address (all interfaces).
pub const DEFAULT_BIND: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Default shutdown grace period.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Environment variable consulted for the port when the CLI flag is absent.
pub const PORT_ENV_VAR: &str = "PALAVERD_PORT";

/// Fully resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind the listener to.
    pub bind: IpAddr,

    /// Port to listen on. Port 0 asks the OS for a free port.
    pub port: u16,

    /// Maximum concurrent sessions; connections beyond this are
    /// refused at accept time.
    pub max_connections: usize,

    /// How long shutdown waits for in-flight workers.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND,
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl ServerConfig {
    /// The socket address to bind.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Merges file values and overrides into a resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidMaxConnections` when the resolved
    /// limit is zero (a server that can accept nobody is a
    /// misconfiguration, not a policy).
    pub fn resolve(
        file: ConfigFile,
        overrides: Overrides,
        env_port: Option<u16>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            bind: overrides.bind.or(file.bind).unwrap_or(DEFAULT_BIND),
            port: overrides
                .port
                .or(env_port)
                .or(file.port)
                .unwrap_or(DEFAULT_PORT),
            max_connections: overrides
                .max_connections
                .or(file.max_connections)
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            shutdown_grace: file
                .shutdown_grace_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_SHUTDOWN_GRACE),
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections);
        }

        Ok(config)
    }
}

/// Optional values read from a TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
    pub max_connections: Option<usize>,
    pub shutdown_grace_secs: Option<u64>,
}

impl ConfigFile {
    /// Loads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` when the file cannot be read and
    /// `ConfigError::Parse` when it is not valid TOML for this schema.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// CLI overrides applied on top of environment and file values.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
    pub max_connections: Option<usize>,
}

/// Reads the port from [`PORT_ENV_VAR`], if set.
///
/// # Errors
///
/// Returns `ConfigError::InvalidPortEnv` when the variable is set but
/// does not parse as a port number.
pub fn port_from_env() -> Result<Option<u16>, ConfigError> {
    match std::env::var(PORT_ENV_VAR) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidPortEnv { value }),
        Err(_) => Ok(None),
    }
}

/// Errors that can occur while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid for this schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// `max_connections` resolved to zero.
    #[error("max_connections must be at least 1")]
    InvalidMaxConnections,

    /// The port environment variable is set but not a number.
    #[error("invalid {PORT_ENV_VAR} value: {value:?}")]
    InvalidPortEnv { value: String },
}
