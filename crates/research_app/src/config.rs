//! Application configuration.
//!
//! Values come from an optional RON file and are then overridden by command
//! line flags. Every field has a default so a partial file is enough.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use research_engine::{ClientSettings, DEFAULT_SERVER_URL};
use research_logging::LogDestination;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILENAME: &str = "research.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config file {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("unknown log destination {0:?} (expected off, file, terminal or both)")]
    LogDestination(String),
    #[error("unknown log level {0:?}")]
    LogLevel(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_reconnects: u32,
    pub reconnect_backoff_ms: u64,
    /// `off`, `file`, `terminal` or `both`.
    pub log: String,
    pub log_level: String,
    pub log_file: PathBuf,
    /// File the values were read from; `None` for built-in defaults.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            connect_timeout_secs: client.connect_timeout.as_secs(),
            request_timeout_secs: client.request_timeout.as_secs(),
            max_reconnects: client.max_reconnects,
            reconnect_backoff_ms: client.reconnect_backoff.as_millis() as u64,
            log: "file".to_string(),
            log_level: "info".to_string(),
            log_file: PathBuf::from("./research.log"),
            source: None,
        }
    }
}

/// Command line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub log: Option<String>,
    pub reconnects: Option<u32>,
}

impl AppConfig {
    /// Loads `path`, or `./research.ron` when it exists, or the defaults.
    ///
    /// An explicitly named file must exist; the implicit one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let implicit = Path::new(DEFAULT_CONFIG_FILENAME);
                if implicit.is_file() {
                    Self::from_file(implicit)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = ron::from_str(&content).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Ok(Self {
            source: Some(path.to_path_buf()),
            ..config
        })
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self, ConfigError> {
        if let Some(server) = overrides.server {
            self.server_url = server;
        }
        if let Some(log) = overrides.log {
            self.log = log;
        }
        if let Some(reconnects) = overrides.reconnects {
            self.max_reconnects = reconnects;
        }
        self.log_destination()?;
        self.log_level()?;
        Ok(self)
    }

    pub fn log_destination(&self) -> Result<LogDestination, ConfigError> {
        LogDestination::parse(&self.log).ok_or_else(|| ConfigError::LogDestination(self.log.clone()))
    }

    pub fn log_level(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(self.log_level.trim())
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            server_url: self.server_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_reconnects: self.max_reconnects,
            reconnect_backoff: Duration::from_millis(self.reconnect_backoff_ms),
        }
    }
}
