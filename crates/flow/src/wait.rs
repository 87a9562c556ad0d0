//! Bounded waits. Every suspension point in the flow is one of these: a
//! predicate, a timeout and a poll interval. Nothing blocks indefinitely.

use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::FlowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied,
    TimedOut,
}

/// Poll `check` until it reports true or the timeout lapses. The predicate
/// runs once more at the deadline before the wait gives up.
pub async fn wait_until<F>(
    timeout: Duration,
    poll: Duration,
    mut check: F,
) -> Result<WaitOutcome, FlowError>
where
    F: FnMut() -> Result<bool, FlowError>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check()? {
            return Ok(WaitOutcome::Satisfied);
        }
        if Instant::now() >= deadline {
            return Ok(WaitOutcome::TimedOut);
        }
        sleep(poll).await;
    }
}
