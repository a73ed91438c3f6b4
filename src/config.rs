//! Configuration management for the audit sink
//!
//! Defaults are overridden by environment variables, and a `config.toml` in
//! the working directory (path overridable via `CONFIG_FILE`) overrides
//! both. Everything is read once at startup and read-only afterwards.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::audit::RetentionPolicy;

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Port the HTTP server listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory audit log files are written to
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Hours a log file lives before the retention sweep deletes it
    #[serde(default = "default_log_lifetime_hours")]
    pub log_lifetime_hours: u64,

    /// Megabytes past which the active file is archived (0 disables)
    #[serde(default = "default_max_log_size_mb")]
    pub max_log_size_mb: u64,

    /// Seconds between retention sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// IANA time zone used for file naming and entry timestamps
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_port() -> u16 {
    8080
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_log_lifetime_hours() -> u64 {
    72
}

fn default_max_log_size_mb() -> u64 {
    100
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_timezone() -> String {
    "Europe/Madrid".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            log_dir: default_log_dir(),
            log_lifetime_hours: default_log_lifetime_hours(),
            max_log_size_mb: default_max_log_size_mb(),
            sweep_interval_secs: default_sweep_interval_secs(),
            timezone: default_timezone(),
        }
    }
}

/// Per-key overrides read from the optional config file.
///
/// Keys the file leaves out keep their environment-derived values.
#[derive(Debug, Default, Deserialize)]
struct FileOverrides {
    port: Option<u16>,
    log_dir: Option<PathBuf>,
    log_lifetime_hours: Option<u64>,
    max_log_size_mb: Option<u64>,
    sweep_interval_secs: Option<u64>,
    timezone: Option<String>,
}

impl FileOverrides {
    fn apply(self, config: &mut Config) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(log_dir) = self.log_dir {
            config.log_dir = log_dir;
        }
        if let Some(hours) = self.log_lifetime_hours {
            config.log_lifetime_hours = hours;
        }
        if let Some(mb) = self.max_log_size_mb {
            config.max_log_size_mb = mb;
        }
        if let Some(secs) = self.sweep_interval_secs {
            config.sweep_interval_secs = secs;
        }
        if let Some(timezone) = self.timezone {
            config.timezone = timezone;
        }
    }
}

impl Config {
    /// Build the configuration from defaults, environment variables, and
    /// the optional config file, in that order of precedence (lowest
    /// first). Never fails: unusable values fall back and are logged.
    pub fn load() -> Self {
        let mut config = Self::from_env();

        let path = config_file_path();
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match toml::from_str::<FileOverrides>(&content) {
                    Ok(overrides) => overrides.apply(&mut config),
                    Err(e) => warn!("Ignoring unparsable config file {}: {}", path.display(), e),
                },
                Err(e) => warn!("Ignoring unreadable config file {}: {}", path.display(), e),
            }
        }

        config
    }

    /// Configuration from environment variables over the defaults.
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", default_port()),
            log_dir: PathBuf::from(env_or("LOG_DIR", "./logs")),
            log_lifetime_hours: env_parse("LOG_LIFETIME_HOURS", default_log_lifetime_hours()),
            max_log_size_mb: env_parse("MAX_LOG_SIZE_MB", default_max_log_size_mb()),
            sweep_interval_secs: env_parse("SWEEP_INTERVAL_SECS", default_sweep_interval_secs()),
            timezone: env_or("TIMEZONE", "Europe/Madrid"),
        }
    }

    /// Size cap in bytes; zero disables size rotation.
    pub fn max_log_size_bytes(&self) -> u64 {
        self.max_log_size_mb * 1024 * 1024
    }

    /// Retention policy derived from lifetime and sweep interval.
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_age: Duration::from_secs(self.log_lifetime_hours * 60 * 60),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }

    /// Resolve the configured zone identifier.
    pub fn timezone(&self) -> Tz {
        resolve_timezone(&self.timezone)
    }
}

/// Resolve an IANA zone name, falling back to UTC on an unknown identifier.
pub fn resolve_timezone(name: &str) -> Tz {
    match name.parse() {
        Ok(tz) => tz,
        Err(_) => {
            warn!("Unknown time zone {:?}, falling back to UTC", name);
            Tz::UTC
        }
    }
}

/// Path of the optional config file.
fn config_file_path() -> PathBuf {
    std::env::var("CONFIG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"))
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("Ignoring unparsable value for {}: {:?}", key, value);
                default
            }
        },
        _ => default,
    }
}
