use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

/// Signalled once after every mode has finished. Failures are reported by the
/// caller and never change the outcome of the sweep.
pub trait CompletionNotifier {
    fn notify(&self) -> Result<()>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalBell;

impl CompletionNotifier for TerminalBell {
    fn notify(&self) -> Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(b"\x07")?;
        out.flush()?;
        info!("played completion bell");
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl CompletionNotifier for LogNotifier {
    fn notify(&self) -> Result<()> {
        info!("sweep complete");
        Ok(())
    }
}
