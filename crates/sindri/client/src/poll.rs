//! Polling of asynchronous server jobs.

use std::{future::Future, time::Duration};

use sindri_types::JobState;
use tracing::debug;

/// Interval between two status queries unless configured otherwise.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(1000);

/// Calls `fetch` until it returns a terminal status, sleeping `interval` between calls.
///
/// There is no deadline; callers that need one should wrap the returned future in
/// [`tokio::time::timeout`]. Errors from `fetch` are returned immediately without retrying.
pub async fn poll_until_terminal<T, E, F, Fut>(interval: Duration, mut fetch: F) -> Result<T, E>
where
    T: JobState,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1u64;
    loop {
        let response = fetch().await?;
        let status = response.status();
        if status.is_terminal() {
            return Ok(response);
        }
        debug!(attempt, %status, "Job not finished yet");
        tokio::time::sleep(interval).await;
        attempt += 1;
    }
}
