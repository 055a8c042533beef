use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tracing::debug;

use crate::host::{ControlInterface, FeedbackChannel, FieldId, MetricSnapshot, parse_metric_text};
use crate::params::MaMode;

#[derive(Clone, Debug)]
pub struct SimConfig {
    pub seed: u64,
    pub title: String,
    pub feature_label: String,
    pub latency_min_ms: u64,
    pub latency_max_ms: u64,
    /// Chance that an edit never produces a recompute.
    pub stall_probability: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 20260226,
            title: "BTCUSDT Perpetual".to_string(),
            feature_label: "Use KC Momentum (channel filter)".to_string(),
            latency_min_ms: 600,
            latency_max_ms: 1800,
            stall_probability: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Panel {
    profit: String,
    drawdown: String,
    percent_profitable: String,
    profit_factor: String,
}

/// In-process stand-in for a strategy tester. Edits schedule a recompute that
/// lands after a random latency; until then the previous figures stay on screen.
#[derive(Debug)]
pub struct SimulatedHost {
    cfg: SimConfig,
    rng: StdRng,
    toggle_on: bool,
    toggle_flips: usize,
    mode: Option<MaMode>,
    channel_length: Option<i64>,
    fast_period: Option<i64>,
    slow_period: Option<i64>,
    shown: Option<Panel>,
    pending: Option<(Instant, Panel)>,
    commits: usize,
}

impl SimulatedHost {
    pub fn new(mut cfg: SimConfig) -> Self {
        if cfg.latency_min_ms > cfg.latency_max_ms {
            std::mem::swap(&mut cfg.latency_min_ms, &mut cfg.latency_max_ms);
        }
        cfg.stall_probability = if cfg.stall_probability.is_nan() {
            0.0
        } else {
            cfg.stall_probability.clamp(0.0, 1.0)
        };
        Self {
            rng: StdRng::seed_from_u64(cfg.seed),
            cfg,
            toggle_on: false,
            toggle_flips: 0,
            mode: None,
            channel_length: None,
            fast_period: None,
            slow_period: None,
            shown: None,
            pending: None,
            commits: 0,
        }
    }

    pub fn toggle_flips(&self) -> usize {
        self.toggle_flips
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    fn schedule_recompute(&mut self) {
        let (Some(mode), Some(ch), Some(fast), Some(slow)) =
            (self.mode, self.channel_length, self.fast_period, self.slow_period)
        else {
            return;
        };
        if self.rng.random_bool(self.cfg.stall_probability) {
            debug!(ch, fast, slow, "simulated host stalled");
            return;
        }
        let latency = self
            .rng
            .random_range(self.cfg.latency_min_ms..=self.cfg.latency_max_ms);
        let panel = backtest_panel(self.cfg.seed, mode, ch, fast, slow, self.toggle_on);
        self.pending = Some((Instant::now() + Duration::from_millis(latency), panel));
    }

    fn apply_pending(&mut self) {
        let ready = matches!(&self.pending, Some((at, _)) if Instant::now() >= *at);
        if ready {
            if let Some((_, panel)) = self.pending.take() {
                self.shown = Some(panel);
            }
        }
    }
}

#[async_trait]
impl ControlInterface for SimulatedHost {
    async fn set_mode(&mut self, name: &str) -> bool {
        let Ok(mode) = name.parse::<MaMode>() else {
            return false;
        };
        if self.mode != Some(mode) {
            self.mode = Some(mode);
            self.schedule_recompute();
        }
        true
    }

    async fn set_value(&mut self, field: FieldId, value: i64) -> bool {
        let slot = match field {
            FieldId::ChannelLength => &mut self.channel_length,
            FieldId::FastPeriod => &mut self.fast_period,
            FieldId::SlowPeriod => &mut self.slow_period,
        };
        *slot = Some(value);
        self.commits += 1;
        self.schedule_recompute();
        true
    }

    async fn set_toggle(&mut self, label: &str, desired: bool) -> bool {
        if !self.cfg.feature_label.contains(label) {
            return false;
        }
        if self.toggle_on != desired {
            self.toggle_on = desired;
            self.toggle_flips += 1;
            self.schedule_recompute();
        }
        true
    }
}

impl FeedbackChannel for SimulatedHost {
    fn read_profit(&mut self) -> Option<f64> {
        self.apply_pending();
        self.shown.as_ref().and_then(|p| parse_metric_text(&p.profit))
    }

    fn read_metrics(&mut self) -> Option<MetricSnapshot> {
        self.apply_pending();
        let panel = self.shown.as_ref()?;
        Some(MetricSnapshot {
            profit: parse_metric_text(&panel.profit),
            drawdown: parse_metric_text(&panel.drawdown).unwrap_or(0.0),
            percent_profitable: parse_metric_text(&panel.percent_profitable)?,
            profit_factor: parse_metric_text(&panel.profit_factor)?,
        })
    }

    fn host_title(&mut self) -> Option<String> {
        Some(self.cfg.title.clone())
    }
}

// Deterministic per parameter set so repeated sweeps agree.
fn backtest_panel(seed: u64, mode: MaMode, ch: i64, fast: i64, slow: i64, filtered: bool) -> Panel {
    let mode_salt: u64 = match mode {
        MaMode::Sma => 0x5A,
        MaMode::Ema => 0xE3,
    };
    let key = seed
        ^ mode_salt.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (ch as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
        ^ (fast as u64).wrapping_mul(0x94D0_49BB_1331_11EB)
        ^ (slow as u64).wrapping_mul(0x2545_F491_4F6C_DD1D);
    let mut rng = StdRng::seed_from_u64(key);

    let spread = if slow > 0 {
        (slow - fast) as f64 / slow as f64
    } else {
        0.0
    };
    let mut edge = 0.45 * spread + 0.015 * ch as f64 + rng.random_range(-0.35_f64..0.35);
    if mode == MaMode::Ema {
        edge += 0.05;
    }
    if !filtered {
        edge -= 0.2;
    }

    let profit_factor = (0.55 + edge).max(0.05);
    let win_rate = (38.0 + 12.0 * (profit_factor - 1.0) + rng.random_range(-6.0_f64..6.0)).clamp(0.0, 100.0);
    let profit = (profit_factor - 1.0) * 2_400.0 + rng.random_range(-150.0_f64..150.0);
    let drawdown = rng.random_range(4.0_f64..35.0) / profit_factor.max(0.5);

    Panel {
        profit: format!("{} USDT", signed_amount(profit)),
        drawdown: format!("{drawdown:.2}%"),
        percent_profitable: format!("{win_rate:.2}%"),
        profit_factor: format!("{profit_factor:.3}"),
    }
}

fn signed_amount(v: f64) -> String {
    let sign = if v < 0.0 { "\u{2212}" } else { "+" };
    let cents = (v.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{sign}{grouped}.{:02}", cents % 100)
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;

    fn host() -> SimulatedHost {
        SimulatedHost::new(SimConfig {
            latency_min_ms: 300,
            latency_max_ms: 300,
            ..SimConfig::default()
        })
    }

    #[test]
    fn amounts_render_with_unicode_minus_and_grouping() {
        assert_eq!(signed_amount(-1234.5), "\u{2212}1,234.50");
        assert_eq!(signed_amount(999.999), "+1,000.00");
        assert_eq!(signed_amount(12.0), "+12.00");
        assert_eq!(parse_metric_text(&signed_amount(-1234567.25)), Some(-1234567.25));
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_is_idempotent() {
        let mut h = host();
        assert!(h.set_toggle("Use KC Momentum", true).await);
        assert!(h.set_toggle("Use KC Momentum", true).await);
        assert_eq!(h.toggle_flips(), 1);
        assert!(!h.set_toggle("Use Volume Filter", true).await);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_mode_is_rejected() {
        let mut h = host();
        assert!(h.set_mode("SMA").await);
        assert!(h.set_mode("sma").await);
        assert!(!h.set_mode("HULL").await);
    }

    #[tokio::test(start_paused = true)]
    async fn figures_update_only_after_latency() {
        let mut h = host();
        h.set_toggle("Use KC Momentum", true).await;
        h.set_mode("EMA").await;
        h.set_value(FieldId::ChannelLength, 6).await;
        h.set_value(FieldId::FastPeriod, 10).await;
        h.set_value(FieldId::SlowPeriod, 40).await;
        assert_eq!(h.read_profit(), None);
        assert!(h.read_metrics().is_none());

        sleep(Duration::from_millis(300)).await;
        let profit = h.read_profit();
        assert!(profit.is_some());
        let snap = h.read_metrics().unwrap();
        assert_eq!(snap.profit, profit);
        assert!(snap.profit_factor > 0.0);
        assert_eq!(h.commits(), 3);
    }

    #[test]
    fn same_parameters_render_same_panel() {
        let a = backtest_panel(7, MaMode::Sma, 5, 10, 30, true);
        let b = backtest_panel(7, MaMode::Sma, 5, 10, 30, true);
        let c = backtest_panel(7, MaMode::Sma, 5, 10, 40, true);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_host_never_recomputes() {
        let mut h = SimulatedHost::new(SimConfig {
            stall_probability: 1.0,
            ..SimConfig::default()
        });
        h.set_toggle("Use KC Momentum", true).await;
        h.set_mode("SMA").await;
        h.set_value(FieldId::ChannelLength, 4).await;
        h.set_value(FieldId::FastPeriod, 5).await;
        h.set_value(FieldId::SlowPeriod, 20).await;
        sleep(Duration::from_secs(10)).await;
        assert_eq!(h.read_profit(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn nan_stall_probability_means_never_stall() {
        let mut h = SimulatedHost::new(SimConfig {
            stall_probability: f64::NAN,
            latency_min_ms: 100,
            latency_max_ms: 100,
            ..SimConfig::default()
        });
        h.set_toggle("Use KC Momentum", true).await;
        h.set_mode("SMA").await;
        h.set_value(FieldId::ChannelLength, 4).await;
        h.set_value(FieldId::FastPeriod, 5).await;
        h.set_value(FieldId::SlowPeriod, 20).await;
        sleep(Duration::from_millis(100)).await;
        assert!(h.read_profit().is_some());
    }
}
