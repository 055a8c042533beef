use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::SweepError;
use crate::host::MetricSnapshot;
use crate::params::{MaMode, ParameterCombination};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub channel_length: i64,
    pub fast_period: i64,
    pub slow_period: i64,
    pub profit: f64,
    pub drawdown: f64,
    pub percent_profitable: f64,
    pub profit_factor: f64,
}

impl ResultRecord {
    /// `profit` is the value that signalled the recompute; the snapshot must
    /// still carry a readable profit of its own. Non-finite figures are
    /// rejected since JSON cannot carry them.
    pub fn from_snapshot(
        combo: &ParameterCombination,
        profit: f64,
        snapshot: &MetricSnapshot,
    ) -> Result<Self, SweepError> {
        if snapshot.profit.is_none() {
            return Err(SweepError::MetricReadFailure);
        }
        let record = Self {
            channel_length: combo.channel_length,
            fast_period: combo.fast_period,
            slow_period: combo.slow_period,
            profit,
            drawdown: snapshot.drawdown,
            percent_profitable: snapshot.percent_profitable,
            profit_factor: snapshot.profit_factor,
        };
        if !record.is_finite() {
            return Err(SweepError::MetricReadFailure);
        }
        Ok(record)
    }

    pub fn is_finite(&self) -> bool {
        [
            self.profit,
            self.drawdown,
            self.percent_profitable,
            self.profit_factor,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SummaryRecord {
    pub total_time_minutes: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedEntry {
    Summary(SummaryRecord),
    Result(ResultRecord),
}

impl PersistedEntry {
    pub fn as_result(&self) -> Option<&ResultRecord> {
        match self {
            PersistedEntry::Result(r) => Some(r),
            PersistedEntry::Summary(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkippedCombination {
    pub combination: ParameterCombination,
    pub reason: SweepError,
}

/// One mode's worth of results. Elapsed time runs on the tokio clock so it
/// agrees with the engine's settle and poll delays.
#[derive(Clone, Debug)]
pub struct SweepRun {
    pub mode: MaMode,
    pub start_time: DateTime<Utc>,
    pub started: Instant,
    pub elapsed: Option<Duration>,
    pub results: Vec<ResultRecord>,
    pub skipped: Vec<SkippedCombination>,
}

impl SweepRun {
    pub fn start(mode: MaMode) -> Self {
        Self {
            mode,
            start_time: Utc::now(),
            started: Instant::now(),
            elapsed: None,
            results: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn record(&mut self, record: ResultRecord) {
        self.results.push(record);
    }

    pub fn skip(&mut self, combination: ParameterCombination, reason: SweepError) {
        self.skipped.push(SkippedCombination {
            combination,
            reason,
        });
    }

    pub fn finish(&mut self) {
        self.elapsed = Some(self.started.elapsed());
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.unwrap_or_else(|| self.started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn combo() -> ParameterCombination {
        ParameterCombination {
            channel_length: 6,
            fast_period: 10,
            slow_period: 40,
            mode: MaMode::Sma,
        }
    }

    #[test]
    fn record_serializes_with_flat_camel_case_fields() {
        let snap = MetricSnapshot {
            profit: Some(120.0),
            drawdown: 8.25,
            percent_profitable: 41.0,
            profit_factor: 1.42,
        };
        let rec = ResultRecord::from_snapshot(&combo(), 118.5, &snap).unwrap();
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(
            v,
            json!({
                "channelLength": 6,
                "fastPeriod": 10,
                "slowPeriod": 40,
                "profit": 118.5,
                "drawdown": 8.25,
                "percentProfitable": 41.0,
                "profitFactor": 1.42,
            })
        );
    }

    #[test]
    fn snapshot_without_profit_is_rejected() {
        let snap = MetricSnapshot {
            profit: None,
            drawdown: 1.0,
            percent_profitable: 50.0,
            profit_factor: 2.0,
        };
        assert_eq!(
            ResultRecord::from_snapshot(&combo(), 10.0, &snap),
            Err(SweepError::MetricReadFailure)
        );
    }

    #[test]
    fn non_finite_metrics_are_rejected() {
        for pf in [f64::NAN, f64::INFINITY] {
            let snap = MetricSnapshot {
                profit: Some(50.0),
                drawdown: 1.0,
                percent_profitable: 100.0,
                profit_factor: pf,
            };
            assert_eq!(
                ResultRecord::from_snapshot(&combo(), 50.0, &snap),
                Err(SweepError::MetricReadFailure)
            );
        }
        let snap = MetricSnapshot {
            profit: Some(50.0),
            drawdown: 1.0,
            percent_profitable: 100.0,
            profit_factor: 3.0,
        };
        assert!(ResultRecord::from_snapshot(&combo(), f64::NEG_INFINITY, &snap).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_follows_the_runtime_clock() {
        let mut run = SweepRun::start(MaMode::Ema);
        tokio::time::sleep(Duration::from_secs(90)).await;
        run.finish();
        let took = run.elapsed.unwrap();
        assert!(took >= Duration::from_secs(90) && took < Duration::from_secs(91));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(run.elapsed(), took);
    }

    #[test]
    fn untagged_entries_read_back_as_the_right_variant() {
        let raw = json!([
            {"totalTimeMinutes": 3.5},
            {"channelLength": 4, "fastPeriod": 5, "slowPeriod": 20, "profit": 1.0,
             "drawdown": 2.0, "percentProfitable": 3.0, "profitFactor": 4.0}
        ]);
        let entries: Vec<PersistedEntry> = serde_json::from_value(raw).unwrap();
        assert!(matches!(entries[0], PersistedEntry::Summary(_)));
        assert_eq!(entries[1].as_result().map(|r| r.profit_factor), Some(4.0));

        let summary = serde_json::to_value(&entries[0]).unwrap();
        assert!(summary.get("profitFactor").is_none());
        assert_eq!(summary.get("totalTimeMinutes"), Some(&Value::from(3.5)));
    }
}
