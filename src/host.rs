use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const UNKNOWN_HOST: &str = "Unknown";
const QUOTE_SUFFIX: &str = "USDT";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldId {
    ChannelLength,
    FastPeriod,
    SlowPeriod,
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldId::ChannelLength => "channel length input",
            FieldId::FastPeriod => "fast period input",
            FieldId::SlowPeriod => "slow period input",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub profit: Option<f64>,
    pub drawdown: f64,
    pub percent_profitable: f64,
    pub profit_factor: f64,
}

/// Write side of the host surface.
///
/// Every method reports `false` when the control it needs cannot be located.
/// `set_value` must look like a real user edit to the host (value write,
/// input and change notifications, commit keystroke, focus loss) so that the
/// host actually recomputes.
#[async_trait]
pub trait ControlInterface: Send {
    async fn set_mode(&mut self, name: &str) -> bool;
    async fn set_value(&mut self, field: FieldId, value: i64) -> bool;
    async fn set_toggle(&mut self, label: &str, desired: bool) -> bool;
}

/// Read side of the host surface. Reads are point-in-time snapshots and never block.
pub trait FeedbackChannel: Send {
    fn read_profit(&mut self) -> Option<f64>;
    /// `None` when the metric surface does not expose enough fields.
    fn read_metrics(&mut self) -> Option<MetricSnapshot>;
    fn host_title(&mut self) -> Option<String>;
}

pub trait Host: ControlInterface + FeedbackChannel {}

impl<T: ControlInterface + FeedbackChannel> Host for T {}

/// Parses rendered metric text such as `"−1,234.50 USDT"` or `"12.5%"`.
pub fn parse_metric_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .replace('\u{2212}', "-")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let value = cleaned.parse::<f64>().ok()?;
    if value.is_finite() { Some(value) } else { None }
}

/// Extracts the base asset from a host title like `"BTCUSDT Perpetual"`.
pub fn host_identifier(title: Option<&str>) -> String {
    let Some(title) = title else {
        return UNKNOWN_HOST.to_string();
    };
    let word: String = title
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    match word.rfind(QUOTE_SUFFIX) {
        Some(idx) if idx > 0 => word[..idx].to_string(),
        _ => UNKNOWN_HOST.to_string(),
    }
}
