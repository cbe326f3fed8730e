use crate::policy::{IntervalPolicy, Reporting};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration loaded from maybe-slow.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct WatchConfig {
    pub watchdog: WatchdogConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Wait before the first status line; later waits are multiples of it.
    pub base_ms: u64,
    /// Longest wait between two status lines.
    pub cap_ms: u64,
    pub reporting: Reporting,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
}

/// Errors from loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl WatchdogConfig {
    /// Reject schedules that would spin or never escalate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_ms == 0 {
            return Err(ConfigError::Invalid(
                "watchdog.base_ms must be greater than 0".to_string(),
            ));
        }
        if self.cap_ms < self.base_ms {
            return Err(ConfigError::Invalid(format!(
                "watchdog.cap_ms ({}) must not be below watchdog.base_ms ({})",
                self.cap_ms, self.base_ms
            )));
        }
        Ok(())
    }

    pub fn policy(&self) -> IntervalPolicy {
        IntervalPolicy {
            base: Duration::from_millis(self.base_ms),
            cap: Duration::from_millis(self.cap_ms),
            reporting: self.reporting,
        }
    }
}

/// Load configuration from `path`. A missing file yields the defaults.
pub fn load(path: &Path) -> Result<WatchConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(WatchConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

// --- Default implementations ---

impl Default for WatchdogConfig {
    fn default() -> Self {
        let policy = IntervalPolicy::detailed();
        Self {
            base_ms: policy.base.as_millis() as u64,
            cap_ms: policy.cap.as_millis() as u64,
            reporting: policy.reporting,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "maybe_slow=info".to_string(),
        }
    }
}
