use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;

use sweep_optimizer::config::SweepConfig;
use sweep_optimizer::engine::{ModeStatus, SweepEngine};
use sweep_optimizer::logging;
use sweep_optimizer::notify::{CompletionNotifier, LogNotifier, TerminalBell};
use sweep_optimizer::params::MaMode;
use sweep_optimizer::report::JsonFileSink;
use sweep_optimizer::sim::{SimConfig, SimulatedHost};

#[derive(Parser, Debug)]
#[command(author, version, about = "Exhaustive channel/MA crossover sweep against a strategy tester")]
struct Args {
    /// JSON file with sweep settings; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_delimiter = ',')]
    modes: Option<Vec<MaMode>>,
    #[arg(long, value_delimiter = ',')]
    channel_lengths: Option<Vec<i64>>,
    #[arg(long, value_delimiter = ',')]
    fast_periods: Option<Vec<i64>>,
    #[arg(long, value_delimiter = ',')]
    slow_periods: Option<Vec<i64>>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[arg(long)]
    poll_ms: Option<u64>,
    #[arg(long)]
    settle_ms: Option<u64>,
    #[arg(long, default_value = "results")]
    out_dir: PathBuf,
    /// Also write the ranked results as CSV.
    #[arg(long)]
    csv: bool,
    #[arg(long, default_value_t = 20260226)]
    seed: u64,
    #[arg(long, default_value = "BTCUSDT Perpetual")]
    title: String,
    #[arg(long, default_value_t = 0.02)]
    stall_probability: f64,
    #[arg(long, default_value_t = 600)]
    latency_min_ms: u64,
    #[arg(long, default_value_t = 1800)]
    latency_max_ms: u64,
    #[arg(long)]
    no_bell: bool,
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn sweep_config(&self) -> Result<SweepConfig> {
        let mut cfg = match &self.config {
            Some(path) => SweepConfig::from_file(path)?,
            None => SweepConfig::default(),
        };
        if let Some(v) = &self.modes {
            cfg.modes = v.clone();
        }
        if let Some(v) = &self.channel_lengths {
            cfg.channel_lengths = v.clone();
        }
        if let Some(v) = &self.fast_periods {
            cfg.fast_periods = v.clone();
        }
        if let Some(v) = &self.slow_periods {
            cfg.slow_periods = v.clone();
        }
        if let Some(v) = self.timeout_ms {
            cfg.change_timeout_ms = v;
        }
        if let Some(v) = self.poll_ms {
            cfg.poll_interval_ms = v;
        }
        if let Some(v) = self.settle_ms {
            cfg.settle_delay_ms = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    fn sim_config(&self, cfg: &SweepConfig) -> Result<SimConfig> {
        if !(0.0..=1.0).contains(&self.stall_probability) {
            bail!("--stall-probability must be within [0, 1]");
        }
        Ok(SimConfig {
            seed: self.seed,
            title: self.title.clone(),
            feature_label: cfg.feature_label.clone(),
            latency_min_ms: self.latency_min_ms,
            latency_max_ms: self.latency_max_ms,
            stall_probability: self.stall_probability,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let cfg = args.sweep_config()?;
    let space = cfg.space();
    println!(
        "modes={} channels={} fast={} slow={} combinations_per_mode={} timeout={}ms poll={}ms settle={}ms",
        cfg.modes
            .iter()
            .map(MaMode::as_str)
            .collect::<Vec<_>>()
            .join(","),
        cfg.channel_lengths.len(),
        cfg.fast_periods.len(),
        cfg.slow_periods.len(),
        space.len(),
        cfg.change_timeout_ms,
        cfg.poll_interval_ms,
        cfg.settle_delay_ms
    );

    let host = SimulatedHost::new(args.sim_config(&cfg)?);
    let mut sink = JsonFileSink::new(&args.out_dir, args.csv);
    let notifier: Box<dyn CompletionNotifier> = if args.no_bell {
        Box::new(LogNotifier)
    } else {
        Box::new(TerminalBell)
    };

    let mut engine = SweepEngine::new(cfg, host);
    let summaries = engine.run(&mut sink, notifier.as_ref()).await;

    println!();
    for s in &summaries {
        match s.status {
            ModeStatus::Completed => println!(
                "{}: recorded={} skipped={} artifact={}",
                s.mode,
                s.recorded,
                s.skipped.len(),
                s.artifact
                    .as_ref()
                    .map(|a| a.location.as_str())
                    .unwrap_or("-")
            ),
            ModeStatus::Skipped | ModeStatus::Aborted => println!(
                "{}: {:?} ({})",
                s.mode,
                s.status,
                s.error.as_deref().unwrap_or("unknown")
            ),
        }
    }

    if summaries.iter().all(|s| s.artifact.is_none()) {
        println!("WARNING: no mode produced a result artifact.");
    }

    Ok(())
}
