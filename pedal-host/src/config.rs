//! Host configuration
//!
//! Loaded from a JSON file; every field has a default so a partial (or
//! missing) file is fine.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Accepted range for `poll_hz` and `redraw_hz`
const RATE_HZ: RangeInclusive<f64> = 1.0..=1000.0;

/// Which sample source the host drives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    #[default]
    Demo,
    Iracing,
    Replay { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub source: SourceConfig,
    /// Sampling loop rate
    pub poll_hz: f64,
    /// Chart redraw rate
    pub redraw_hz: f64,
    /// How often to look for the simulator while disconnected
    pub detect_interval_ms: u64,
    pub chart_width: f32,
    pub chart_height: f32,
    /// Events buffered between the sampling loop and the chart view
    pub channel_capacity: usize,
    /// Used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            poll_hz: 60.0,
            redraw_hz: 60.0,
            detect_interval_ms: 1000,
            chart_width: 600.0,
            chart_height: 160.0,
            channel_capacity: 256,
            log_filter: "info".to_string(),
        }
    }
}

impl HostConfig {
    /// `<config dir>/pedal-telemetry/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pedal-telemetry").join("config.json"))
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: HostConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            RATE_HZ.contains(&self.poll_hz),
            "poll_hz must be within {:?}, got {}",
            RATE_HZ,
            self.poll_hz
        );
        ensure!(
            RATE_HZ.contains(&self.redraw_hz),
            "redraw_hz must be within {:?}, got {}",
            RATE_HZ,
            self.redraw_hz
        );
        ensure!(self.detect_interval_ms > 0, "detect_interval_ms must be positive");
        ensure!(self.channel_capacity > 0, "channel_capacity must be positive");
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.poll_hz)
    }

    pub fn redraw_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.redraw_hz)
    }

    pub fn detect_interval(&self) -> Duration {
        Duration::from_millis(self.detect_interval_ms)
    }
}
