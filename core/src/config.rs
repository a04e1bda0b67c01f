//! Configuration
//!
//! A small TOML file plus defaults. Every timing policy the loop uses lives
//! here so the retry/backoff behavior is inspectable and overridable without
//! touching code. The default path is `<config dir>/screenpilot/screenpilot.toml`;
//! a missing file just means defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "screenpilot.toml";

/// Default config directory name
const CONFIG_DIR_NAME: &str = "screenpilot";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Oracle endpoint and retry policy
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Loop timing policy
    #[serde(default, rename = "loop")]
    pub timing: TimingConfig,

    /// Screen capture settings
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Oracle (vision model endpoint) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Base URL of the Ollama-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Vision-capable model to consult
    #[serde(default = "default_model")]
    pub model: String,

    /// Optional bearer token for hosted endpoints
    #[serde(default)]
    pub api_key: Option<String>,

    /// Maximum request attempts before the cycle is abandoned
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay in seconds; doubles on each subsequent attempt
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: f64,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Fixed delays used by the dispatcher and the loop controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Pause after a successful action so the screen settles before the
    /// next capture
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: f64,

    /// Delay before retrying a failed screen capture
    #[serde(default = "default_capture_retry_secs")]
    pub capture_retry_secs: f64,

    /// Delay before re-entering the loop after the oracle was unreachable
    #[serde(default = "default_oracle_retry_secs")]
    pub oracle_retry_secs: f64,
}

/// Screen capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaptureConfig {
    /// Override the capture command. `{path}` is replaced with the output
    /// file; when absent the path is appended as the final argument.
    #[serde(default)]
    pub command: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2-vision".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_secs() -> f64 {
    1.0
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_settle_delay_secs() -> f64 {
    0.5
}

fn default_capture_retry_secs() -> f64 {
    2.0
}

fn default_oracle_retry_secs() -> f64 {
    2.0
}

/// Ceiling for operator-supplied delays, in seconds.
const MAX_DELAY_SECS: f64 = 3600.0;

/// Convert a configured delay to a `Duration` without trusting the value:
/// negatives clamp to zero, oversized and non-finite values to the ceiling.
fn delay_from_secs(secs: f64) -> Duration {
    if secs.is_finite() {
        Duration::from_secs_f64(secs.clamp(0.0, MAX_DELAY_SECS))
    } else {
        Duration::from_secs(MAX_DELAY_SECS as u64)
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            settle_delay_secs: default_settle_delay_secs(),
            capture_retry_secs: default_capture_retry_secs(),
            oracle_retry_secs: default_oracle_retry_secs(),
        }
    }
}

impl OracleConfig {
    /// First backoff delay; the client doubles it on each further attempt.
    pub fn backoff_base(&self) -> Duration {
        delay_from_secs(self.backoff_base_secs)
    }

    /// Per-request timeout for the HTTP transport.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl TimingConfig {
    pub fn settle_delay(&self) -> Duration {
        delay_from_secs(self.settle_delay_secs)
    }

    pub fn capture_retry(&self) -> Duration {
        delay_from_secs(self.capture_retry_secs)
    }

    pub fn oracle_retry(&self) -> Duration {
        delay_from_secs(self.oracle_retry_secs)
    }
}

impl Config {
    /// Load configuration from the given path, or from the default location.
    ///
    /// A missing file is not an error; it yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Config::default()),
            },
        };

        if !path.exists() {
            return Ok(Config::default());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Default config file path: `<config dir>/screenpilot/screenpilot.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_policy() {
        let config = Config::default();
        assert_eq!(config.oracle.max_attempts, 3);
        assert_eq!(config.oracle.model, "llama3.2-vision");
        assert_eq!(config.timing.settle_delay(), Duration::from_millis(500));
        assert_eq!(config.timing.capture_retry(), Duration::from_secs(2));
        assert_eq!(config.oracle.backoff_base(), Duration::from_secs(1));
    }

    #[test]
    fn absurd_delay_values_clamp_instead_of_panicking() {
        let timing = TimingConfig {
            settle_delay_secs: 1e300,
            capture_retry_secs: f64::NAN,
            oracle_retry_secs: -5.0,
        };
        assert_eq!(timing.settle_delay(), Duration::from_secs(3600));
        assert_eq!(timing.capture_retry(), Duration::from_secs(3600));
        assert_eq!(timing.oracle_retry(), Duration::ZERO);

        let oracle = OracleConfig {
            backoff_base_secs: f64::INFINITY,
            ..OracleConfig::default()
        };
        assert_eq!(oracle.backoff_base(), Duration::from_secs(3600));
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.oracle.max_attempts, 3);
    }

    #[test]
    fn load_partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screenpilot.toml");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(
            f,
            "[oracle]\nmodel = \"llava\"\nmax_attempts = 5\n\n[loop]\nsettle_delay_secs = 1.5"
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.oracle.model, "llava");
        assert_eq!(config.oracle.max_attempts, 5);
        assert_eq!(config.oracle.base_url, "http://localhost:11434");
        assert_eq!(config.timing.settle_delay(), Duration::from_millis(1500));
        assert_eq!(config.timing.oracle_retry(), Duration::from_secs(2));
    }
}
