use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::error::SweepError;

/// Polls `read_current` until it yields a value that is present and differs
/// from `previous`, or until `timeout` elapses.
///
/// The first qualifying read is returned without sleeping. The host gives no
/// completion signal, so a changed output is the only evidence it finished
/// recomputing.
pub async fn await_change<T, F>(
    mut read_current: F,
    previous: Option<&T>,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<T, SweepError>
where
    T: PartialEq,
    F: FnMut() -> Option<T>,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if let Some(value) = read_current() {
            if previous != Some(&value) {
                return Ok(value);
            }
        }
        sleep(poll_interval).await;
    }
    Err(SweepError::ChangeTimeout {
        waited_ms: start.elapsed().as_millis() as u64,
    })
}
