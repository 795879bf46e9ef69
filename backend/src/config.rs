//! Application configuration.
//!
//! Settings come from an optional `dq-review.toml` and are then overridden by
//! environment variables:
//!
//! - `HOST`, `PORT`: bind address (default `0.0.0.0:8080`)
//! - `DQ_MAX_UPLOAD_MB`: request body limit (default 50)
//! - `DQ_DETECTION_MODE`: `lenient` or `strict` date detection
//! - `DQ_MIN_VALID_FRACTION`: explicit detection threshold, overrides the mode
//! - `DQ_ERROR_ALERT_PCT`: latest-day error-rate alert threshold (1 to 20)
//!
//! Repository selection is configured separately, see [`crate::db::factory`].

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::DetectionStrictness;
use crate::services::alert::{clamp_threshold, DEFAULT_ERROR_ALERT_PCT};

pub const CONFIG_FILE_NAME: &str = "dq-review.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub quality: QualitySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySettings {
    #[serde(default)]
    pub detection: DetectionStrictness,
    #[serde(default)]
    pub min_valid_fraction: Option<f64>,
    #[serde(default = "default_error_alert_pct")]
    pub error_alert_pct: f64,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            detection: DetectionStrictness::default(),
            min_valid_fraction: None,
            error_alert_pct: default_error_alert_pct(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_mb() -> usize {
    50
}

fn default_error_alert_pct() -> f64 {
    DEFAULT_ERROR_ALERT_PCT
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// First `dq-review.toml` found in the current directory, `backend/` or
    /// the parent directory.
    pub fn find_default_file() -> Option<PathBuf> {
        [
            PathBuf::from(CONFIG_FILE_NAME),
            PathBuf::from("backend").join(CONFIG_FILE_NAME),
            PathBuf::from("..").join(CONFIG_FILE_NAME),
        ]
        .into_iter()
        .find(|p| p.exists())
    }

    /// Defaults, then the config file if present, then the environment.
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_default_file() {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Override settings from environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = env::var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_env::<u16>("PORT")? {
            self.server.port = port;
        }
        if let Some(mb) = parse_env::<usize>("DQ_MAX_UPLOAD_MB")? {
            self.server.max_upload_mb = mb;
        }
        if let Ok(mode) = env::var("DQ_DETECTION_MODE") {
            self.quality.detection = mode
                .parse()
                .map_err(|e: String| anyhow::anyhow!("DQ_DETECTION_MODE: {}", e))?;
        }
        if let Some(fraction) = parse_env::<f64>("DQ_MIN_VALID_FRACTION")? {
            self.quality.min_valid_fraction = Some(fraction.clamp(0.0, 1.0));
        }
        if let Some(pct) = parse_env::<f64>("DQ_ERROR_ALERT_PCT")? {
            self.quality.error_alert_pct = pct;
        }
        self.quality.error_alert_pct = clamp_threshold(self.quality.error_alert_pct);
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.server.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} must be valid: {}", name, e)),
        Err(_) => Ok(None),
    }
}
