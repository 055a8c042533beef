use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::error::SweepError;
use crate::params::MaMode;
use crate::records::{PersistedEntry, ResultRecord, SummaryRecord, SweepRun};

#[derive(Clone, Debug, PartialEq)]
pub struct Artifact {
    pub name: String,
    pub location: String,
    pub entries: Vec<PersistedEntry>,
}

impl Artifact {
    pub fn summary(&self) -> Option<&SummaryRecord> {
        match self.entries.first() {
            Some(PersistedEntry::Summary(s)) => Some(s),
            _ => None,
        }
    }

    pub fn results(&self) -> impl Iterator<Item = &ResultRecord> {
        self.entries.iter().filter_map(PersistedEntry::as_result)
    }
}

/// Persistence collaborator. Returns a human-readable location for the stored artifact.
pub trait ArtifactSink {
    fn persist(&mut self, name: &str, entries: &[PersistedEntry]) -> Result<String>;
}

#[derive(Clone, Debug)]
pub struct JsonFileSink {
    dir: PathBuf,
    write_csv: bool,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>, write_csv: bool) -> Self {
        Self {
            dir: dir.into(),
            write_csv,
        }
    }

    fn export_csv(&self, name: &str, entries: &[PersistedEntry]) -> Result<PathBuf> {
        let path = self.dir.join(format!("{name}.csv"));
        let mut wtr = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        for rec in entries.iter().filter_map(PersistedEntry::as_result) {
            wtr.serialize(rec)?;
        }
        wtr.flush()
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

impl ArtifactSink for JsonFileSink {
    fn persist(&mut self, name: &str, entries: &[PersistedEntry]) -> Result<String> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.dir.join(format!("{name}.json"));
        fs::write(&path, serde_json::to_string_pretty(entries)?)
            .with_context(|| format!("failed to write {}", path.display()))?;

        if self.write_csv {
            let csv_path = self.export_csv(name, entries)?;
            info!(path = %csv_path.display(), "csv export written");
        }
        Ok(path.display().to_string())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub artifacts: Vec<(String, Vec<PersistedEntry>)>,
}

impl ArtifactSink for MemorySink {
    fn persist(&mut self, name: &str, entries: &[PersistedEntry]) -> Result<String> {
        self.artifacts.push((name.to_string(), entries.to_vec()));
        Ok(format!("memory:{name}"))
    }
}

pub fn read_artifact(path: &Path) -> Result<Vec<PersistedEntry>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read artifact: {}", path.display()))?;
    let entries = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse artifact: {}", path.display()))?;
    Ok(entries)
}

pub fn artifact_name(host_id: &str, mode: MaMode) -> String {
    format!("{host_id}_{mode}_results")
}

pub fn total_time_minutes(elapsed: Duration) -> f64 {
    round_to(elapsed.as_millis() as f64 / 60_000.0, 2)
}

/// Stable descending sort by profit factor; unreadable (NaN) factors go last.
pub fn rank_results(results: &mut [ResultRecord]) {
    results.sort_by(|a, b| rank_key(b.profit_factor).total_cmp(&rank_key(a.profit_factor)));
}

fn rank_key(pf: f64) -> f64 {
    if pf.is_nan() { f64::NEG_INFINITY } else { pf }
}

fn round_to(v: f64, digits: i32) -> f64 {
    let f = 10_f64.powi(digits);
    (v * f).round() / f
}

#[derive(Clone, Copy, Debug)]
pub struct ResultAggregator {
    preview_len: usize,
}

impl ResultAggregator {
    pub fn new(preview_len: usize) -> Self {
        Self { preview_len }
    }

    /// Ranks a finished run and hands it to `sink`. An empty run produces no artifact.
    pub fn finalize(
        &self,
        run: SweepRun,
        host_id: &str,
        sink: &mut dyn ArtifactSink,
    ) -> Result<Option<Artifact>> {
        let minutes = total_time_minutes(run.elapsed());
        let mode = run.mode;
        let mut results = run.results;
        let before = results.len();
        results.retain(ResultRecord::is_finite);
        if results.len() < before {
            warn!(%mode, dropped = before - results.len(), "dropping results with non-finite metrics");
        }

        if results.is_empty() {
            let err = SweepError::EmptyResultSet { mode };
            warn!(%mode, skipped = run.skipped.len(), "{err}");
            return Ok(None);
        }
        info!(%mode, started = %run.start_time, minutes, "total time taken");

        rank_results(&mut results);

        let mut entries = Vec::with_capacity(results.len() + 1);
        entries.push(PersistedEntry::Summary(SummaryRecord {
            total_time_minutes: minutes,
        }));
        entries.extend(results.into_iter().map(PersistedEntry::Result));

        let name = artifact_name(host_id, mode);
        let location = sink
            .persist(&name, &entries)
            .with_context(|| format!("failed to persist {name}"))?;
        info!(artifact = %name, %location, "results saved");

        let artifact = Artifact {
            name,
            location,
            entries,
        };
        self.print_preview(&artifact);
        Ok(Some(artifact))
    }

    pub fn preview<'a>(&self, artifact: &'a Artifact) -> Vec<&'a ResultRecord> {
        artifact.results().take(self.preview_len).collect()
    }

    fn print_preview(&self, artifact: &Artifact) {
        let rows = self.preview(artifact);
        println!("\nTop {} for {}:", rows.len(), artifact.name);
        println!(
            "{:>4} {:>8} {:>6} {:>6} {:>12} {:>10} {:>10} {:>8}",
            "#", "channel", "fast", "slow", "profit", "drawdown", "win%", "pf"
        );
        for (i, r) in rows.iter().enumerate() {
            println!(
                "{:>4} {:>8} {:>6} {:>6} {:>12.2} {:>10.2} {:>10.2} {:>8.3}",
                i + 1,
                r.channel_length,
                r.fast_period,
                r.slow_period,
                r.profit,
                r.drawdown,
                r.percent_profitable,
                r.profit_factor
            );
        }
    }
}
