//! # Application Configuration
//!
//! Optional TOML file for the `drill` binary.
//!
//! ```toml
//! data_dir = "data"
//! default_subject = "english"
//! log_format = "text"      # or "json"
//! store_format = "json"    # or "binary"
//!
//! [session]
//! count = 10
//! level = "Lv1"
//! ```
//!
//! The file path comes from `--config` or `DRILL_CONFIG_PATH`. Every key is
//! optional; command-line flags override file values. Stage configurations
//! are compiled in and cannot be changed here.

use drill_core::primitives::DEFAULT_SUBJECT;
use drill_core::{DrillError, Level, StoreFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "DRILL_CONFIG_PATH";

/// Environment variable selecting the log format (`json` or `text`).
pub const LOG_FORMAT_ENV: &str = "DRILL_LOG_FORMAT";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Lenient parse used for the environment variable.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Defaults for the `order` command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub count: usize,
    pub level: Level,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            count: 10,
            level: Level::Lv1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub default_subject: String,
    pub log_format: LogFormat,
    pub store_format: StoreFormat,
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            default_subject: DEFAULT_SUBJECT.to_string(),
            log_format: LogFormat::Text,
            store_format: StoreFormat::Json,
            session: SessionConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, DrillError> {
        toml::from_str(text).map_err(|e| DrillError::DeserializationError(e.to_string()))
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, DrillError> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(DrillError::IoError(format!(
                "Config file {} exceeds {} bytes",
                path.display(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Effective log format: the environment wins over the file.
    #[must_use]
    pub fn effective_log_format(&self) -> LogFormat {
        std::env::var(LOG_FORMAT_ENV)
            .ok()
            .map_or(self.log_format, |value| LogFormat::parse(&value))
    }
}

/// Config file location: the explicit flag, else `DRILL_CONFIG_PATH`.
#[must_use]
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
}

/// Resolve and load the configuration.
///
/// Returns the defaults together with the error when the file exists but
/// cannot be read or parsed, so the caller can log it once logging is up.
pub fn resolve(explicit: Option<&Path>) -> (AppConfig, Option<DrillError>) {
    let Some(path) = config_path(explicit) else {
        return (AppConfig::default(), None);
    };
    match AppConfig::load(&path) {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    }
}
