use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::awaiter::await_change;
use crate::config::SweepConfig;
use crate::error::SweepError;
use crate::host::{FieldId, Host, host_identifier};
use crate::notify::CompletionNotifier;
use crate::params::{MaMode, ParameterCombination};
use crate::records::{ResultRecord, SkippedCombination, SweepRun};
use crate::report::{Artifact, ArtifactSink, ResultAggregator};

#[derive(Clone, Debug)]
pub enum ModeOutcome {
    Completed(SweepRun),
    /// The host does not offer this mode; other modes still run.
    Skipped { mode: MaMode, reason: SweepError },
    Aborted { mode: MaMode, reason: SweepError },
}

impl ModeOutcome {
    pub fn mode(&self) -> MaMode {
        match self {
            ModeOutcome::Completed(run) => run.mode,
            ModeOutcome::Skipped { mode, .. } | ModeOutcome::Aborted { mode, .. } => *mode,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeStatus {
    Completed,
    Skipped,
    Aborted,
}

#[derive(Clone, Debug)]
pub struct ModeSummary {
    pub mode: MaMode,
    pub status: ModeStatus,
    pub recorded: usize,
    pub skipped: Vec<SkippedCombination>,
    pub artifact: Option<Artifact>,
    pub error: Option<String>,
}

impl ModeSummary {
    fn without_run(mode: MaMode, status: ModeStatus, reason: &SweepError) -> Self {
        Self {
            mode,
            status,
            recorded: 0,
            skipped: Vec::new(),
            artifact: None,
            error: Some(reason.to_string()),
        }
    }
}

/// Drives one host through the full grid, one mode at a time.
pub struct SweepEngine<H: Host> {
    config: SweepConfig,
    host: H,
    last_fast: Option<i64>,
}

impl<H: Host> SweepEngine<H> {
    pub fn new(config: SweepConfig, host: H) -> Self {
        Self {
            config,
            host,
            last_fast: None,
        }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Runs every configured mode in order, persists each completed run and
    /// signals `notifier` once at the end.
    pub async fn run(
        &mut self,
        sink: &mut dyn ArtifactSink,
        notifier: &dyn CompletionNotifier,
    ) -> Vec<ModeSummary> {
        let host_id = host_identifier(self.host.host_title().as_deref());
        let aggregator = ResultAggregator::new(self.config.preview_len);
        let modes = self.config.modes.clone();
        info!(host = %host_id, modes = modes.len(), "starting sweep");

        let mut summaries = Vec::with_capacity(modes.len());
        for mode in modes {
            let summary = match self.run_mode(mode).await {
                ModeOutcome::Completed(run) => {
                    let recorded = run.results.len();
                    let skipped = run.skipped.clone();
                    let (artifact, error) = match aggregator.finalize(run, &host_id, sink) {
                        Ok(artifact) => (artifact, None),
                        Err(e) => {
                            error!(%mode, "{e:#}");
                            (None, Some(format!("{e:#}")))
                        }
                    };
                    ModeSummary {
                        mode,
                        status: ModeStatus::Completed,
                        recorded,
                        skipped,
                        artifact,
                        error,
                    }
                }
                ModeOutcome::Skipped { mode, reason } => {
                    ModeSummary::without_run(mode, ModeStatus::Skipped, &reason)
                }
                ModeOutcome::Aborted { mode, reason } => {
                    ModeSummary::without_run(mode, ModeStatus::Aborted, &reason)
                }
            };
            summaries.push(summary);
        }

        if let Err(e) = notifier.notify() {
            warn!("failed to signal completion: {e:#}");
        }
        info!("testing completed");
        summaries
    }

    pub async fn run_mode(&mut self, mode: MaMode) -> ModeOutcome {
        info!(%mode, "testing mode");

        if !self.host.set_toggle(&self.config.feature_label, true).await {
            let reason =
                SweepError::control_not_found(format!("toggle '{}'", self.config.feature_label));
            warn!(%mode, "failed to activate feature: {reason}");
            return ModeOutcome::Aborted { mode, reason };
        }

        if !self.host.set_mode(mode.as_str()).await {
            let reason = SweepError::control_not_found(format!("mode '{mode}'"));
            warn!(%mode, "{reason}");
            return ModeOutcome::Skipped { mode, reason };
        }
        sleep(self.config.mode_settle()).await;

        if let Err(reason) = self.refresh_after_mode_switch().await {
            warn!(%mode, "{reason}");
            return ModeOutcome::Aborted { mode, reason };
        }

        let mut run = SweepRun::start(mode);
        if let Err(reason) = self.iterate(&mut run).await {
            warn!(
                %mode,
                discarded = run.results.len(),
                "aborting mode: {reason}"
            );
            return ModeOutcome::Aborted { mode, reason };
        }
        run.finish();
        info!(
            %mode,
            recorded = run.results.len(),
            skipped = run.skipped.len(),
            "mode finished"
        );
        ModeOutcome::Completed(run)
    }

    // Only the fast-period input is re-committed after a mode switch. One
    // genuine edit is enough to make the host recompute under the new mode.
    async fn refresh_after_mode_switch(&mut self) -> Result<(), SweepError> {
        let fast = self
            .last_fast
            .or_else(|| self.config.fast_periods.first().copied());
        match fast {
            Some(v) => self.commit(FieldId::FastPeriod, v).await,
            None => Ok(()),
        }
    }

    async fn iterate(&mut self, run: &mut SweepRun) -> Result<(), SweepError> {
        let config = self.config.clone();
        let space = config.space();
        let total = space.len();
        let mut prev_channel = None;

        for (idx, combo) in space.iter(run.mode).enumerate() {
            if prev_channel != Some(combo.channel_length) {
                info!(channel = combo.channel_length, "testing channel length");
                self.commit(FieldId::ChannelLength, combo.channel_length)
                    .await?;
                sleep(config.settle_delay()).await;
                prev_channel = Some(combo.channel_length);
            }

            self.commit(FieldId::FastPeriod, combo.fast_period).await?;
            self.commit(FieldId::SlowPeriod, combo.slow_period).await?;
            sleep(config.settle_delay()).await;

            match self.capture(&combo, &config).await {
                Ok(record) => {
                    debug!(
                        "[{}/{}] {} profit={:.2} pf={:.3}",
                        idx + 1,
                        total,
                        combo,
                        record.profit,
                        record.profit_factor
                    );
                    run.record(record);
                }
                Err(reason) => {
                    warn!("[{}/{}] skipping {}: {}", idx + 1, total, combo, reason);
                    run.skip(combo, reason);
                }
            }
        }
        Ok(())
    }

    async fn capture(
        &mut self,
        combo: &ParameterCombination,
        config: &SweepConfig,
    ) -> Result<ResultRecord, SweepError> {
        let baseline = self.host.read_profit();
        let host = &mut self.host;
        let profit = await_change(
            || host.read_profit(),
            baseline.as_ref(),
            config.change_timeout(),
            config.poll_interval(),
        )
        .await?;

        let snapshot = self
            .host
            .read_metrics()
            .ok_or(SweepError::MetricReadFailure)?;
        ResultRecord::from_snapshot(combo, profit, &snapshot)
    }

    async fn commit(&mut self, field: FieldId, value: i64) -> Result<(), SweepError> {
        if !self.host.set_value(field, value).await {
            return Err(SweepError::control_not_found(field.to_string()));
        }
        if field == FieldId::FastPeriod {
            self.last_fast = Some(value);
        }
        Ok(())
    }
}
