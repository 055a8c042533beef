pub mod awaiter;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod logging;
pub mod notify;
pub mod params;
pub mod records;
pub mod report;
pub mod sim;

pub use awaiter::await_change;
pub use config::SweepConfig;
pub use engine::{ModeOutcome, ModeStatus, ModeSummary, SweepEngine};
pub use error::SweepError;
pub use host::{ControlInterface, FeedbackChannel, FieldId, Host, MetricSnapshot};
pub use params::{MaMode, ParameterCombination, ParameterSpace};
pub use records::{PersistedEntry, ResultRecord, SummaryRecord, SweepRun};
pub use report::{ArtifactSink, JsonFileSink, MemorySink, ResultAggregator};
