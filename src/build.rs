//! Build-completion waiter: poll a build until it reaches a terminal state.

use std::time::Duration;

use tracing::{debug, info};

use crate::client::{CatalogClient, Result};
use crate::state::{BuildId, BuildStatus};

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// What: Poll a build's status until it is terminal.
///
/// Inputs:
/// - `client`: Remote service client
/// - `build`: Build to watch
/// - `interval`: Delay between polls (see [`DEFAULT_POLL_INTERVAL`])
/// - `on_pending`: Invoked once per observed non-terminal status, so a shell
///   can surface a pending state
///
/// Output:
/// - The terminal [`BuildStatus`] (`Completed` or `Failed`), or the first
///   transport error.
///
/// Details:
/// - No retry cap or timeout is enforced here; termination relies on the
///   service eventually reaching a terminal state. Callers treat `Failed`
///   as an error condition and do not retry.
pub async fn final_build_status<C: CatalogClient>(
    client: &C,
    build: BuildId,
    interval: Duration,
    mut on_pending: impl FnMut(BuildStatus),
) -> Result<BuildStatus> {
    loop {
        let status = client.poll_build_status(build).await?;
        debug!(build, status = %status, "build status polled");
        if status.is_terminal() {
            info!(build, status = %status, "build reached terminal state");
            return Ok(status);
        }
        on_pending(status);
        tokio::time::sleep(interval).await;
    }
}
