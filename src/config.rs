use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::params::{MaMode, ParameterSpace};

pub const DEFAULT_FEATURE_LABEL: &str = "Use KC Momentum";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_CHANGE_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;
pub const DEFAULT_MODE_SETTLE_MS: u64 = 500;
pub const DEFAULT_PREVIEW_LEN: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub channel_lengths: Vec<i64>,
    pub fast_periods: Vec<i64>,
    pub slow_periods: Vec<i64>,
    pub modes: Vec<MaMode>,
    /// Label of the switch that must be on before the host reports meaningful metrics.
    pub feature_label: String,
    pub poll_interval_ms: u64,
    pub change_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub mode_settle_ms: u64,
    pub preview_len: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            channel_lengths: (4..=14).collect(),
            fast_periods: vec![5, 10, 15, 20, 25, 30],
            slow_periods: (2..=10).map(|x| x * 10).collect(),
            modes: vec![MaMode::Sma],
            feature_label: DEFAULT_FEATURE_LABEL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            change_timeout_ms: DEFAULT_CHANGE_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            mode_settle_ms: DEFAULT_MODE_SETTLE_MS,
            preview_len: DEFAULT_PREVIEW_LEN,
        }
    }
}

impl SweepConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be >= 1");
        }
        if self.modes.is_empty() {
            bail!("at least one mode is required");
        }
        if self.preview_len == 0 {
            bail!("preview_len must be >= 1");
        }
        if self.feature_label.trim().is_empty() {
            bail!("feature_label must not be empty");
        }
        Ok(())
    }

    pub fn space(&self) -> ParameterSpace<'_> {
        ParameterSpace::new(&self.channel_lengths, &self.fast_periods, &self.slow_periods)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn change_timeout(&self) -> Duration {
        Duration::from_millis(self.change_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn mode_settle(&self) -> Duration {
        Duration::from_millis(self.mode_settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SweepConfig::default();
        assert_eq!(cfg.channel_lengths.first(), Some(&4));
        assert_eq!(cfg.channel_lengths.last(), Some(&14));
        assert_eq!(cfg.slow_periods, vec![20, 30, 40, 50, 60, 70, 80, 90, 100]);
        assert_eq!(cfg.modes, vec![MaMode::Sma]);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
        assert_eq!(cfg.change_timeout(), Duration::from_millis(2000));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"modes": ["SMA", "ema"], "channel_lengths": [4, 5], "change_timeout_ms": 3000}}"#
        )
        .unwrap();

        let cfg = SweepConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.modes, vec![MaMode::Sma, MaMode::Ema]);
        assert_eq!(cfg.channel_lengths, vec![4, 5]);
        assert_eq!(cfg.change_timeout_ms, 3000);
        assert_eq!(cfg.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(cfg.feature_label, DEFAULT_FEATURE_LABEL);
    }

    #[test]
    fn rejects_unusable_settings() {
        let cfg = SweepConfig {
            poll_interval_ms: 0,
            ..SweepConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = SweepConfig {
            modes: Vec::new(),
            ..SweepConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_mode_in_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"modes": ["WMA"]}}"#).unwrap();
        assert!(SweepConfig::from_file(file.path()).is_err());
    }
}
