//! Shutdown coordination.

use crate::error::Result;
use std::time::Duration;

use super::MediaDownloader;

/// How long shutdown waits for cancelled jobs to settle
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between registry checks while waiting
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

impl MediaDownloader {
    /// Cancel every active download and wait for the tasks to settle
    ///
    /// Jobs are flagged exactly like [`cancel`](Self::cancel) would; each task
    /// then records its own terminal state. Waiting is bounded, so a transfer
    /// stuck in a slow write cannot block shutdown forever.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` leaves room for persistence hooks.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating shutdown");

        let flagged = self.registry.cancel_all().await;
        tracing::info!(jobs = flagged, "Signalled cancellation to active downloads");

        if flagged == 0 {
            return Ok(());
        }

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_jobs()).await {
            Ok(()) => tracing::info!("All active downloads settled"),
            Err(_) => tracing::warn!(
                timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                "Timeout waiting for downloads to settle, proceeding with shutdown"
            ),
        }

        Ok(())
    }

    async fn wait_for_active_jobs(&self) {
        loop {
            let active = self
                .registry
                .list()
                .await
                .iter()
                .filter(|j| !j.status.is_terminal())
                .count();
            if active == 0 {
                return;
            }
            tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
        }
    }
}
