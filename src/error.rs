use thiserror::Error;

use crate::params::MaMode;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SweepError {
    #[error("control not found: {control}")]
    ControlNotFound { control: String },

    #[error("no feedback change after {waited_ms} ms")]
    ChangeTimeout { waited_ms: u64 },

    #[error("metric surface incomplete")]
    MetricReadFailure,

    #[error("no valid results for {mode}")]
    EmptyResultSet { mode: MaMode },
}

impl SweepError {
    pub fn control_not_found(control: impl Into<String>) -> Self {
        Self::ControlNotFound {
            control: control.into(),
        }
    }

    /// Only a missing control ends a mode; everything else skips a single combination.
    pub fn is_fatal_to_mode(&self) -> bool {
        matches!(self, Self::ControlNotFound { .. })
    }
}
