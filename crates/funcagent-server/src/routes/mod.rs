pub mod agent;
pub mod benchmarks;
pub mod config;
pub mod wizards;

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A cancellation token that fires once the request deadline passes.
///
/// The timer is stopped when the deadline is dropped.
pub(crate) struct Deadline {
    token: CancellationToken,
    timer: JoinHandle<()>,
}

impl Deadline {
    pub(crate) fn start(timeout: Duration) -> Self {
        let token = CancellationToken::new();
        let child = token.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            tracing::warn!(?timeout, "request deadline passed, cancelling");
            child.cancel();
        });
        Self { token, timer }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
