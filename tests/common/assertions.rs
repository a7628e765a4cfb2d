//! Wait helpers for asserting on job outcomes

use media_dl::{Event, JobId, MediaDownloader};
use std::time::Duration;

/// Result of waiting for a job to finish
#[derive(Debug, PartialEq)]
pub enum WaitResult {
    /// Completed event received
    Completed,
    /// Failed event received with its error
    Failed(String),
    /// Cancelled event received
    Cancelled,
    /// Event channel closed
    ChannelClosed,
    /// Nothing terminal within the timeout
    Timeout,
}

/// Wait for a terminal event for `id` on an existing subscription
pub async fn wait_for_terminal_event(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    id: JobId,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::Completed { id: event_id, .. }) if event_id == id => {
                    return WaitResult::Completed;
                }
                Ok(Event::Failed { id: event_id, error }) if event_id == id => {
                    return WaitResult::Failed(error);
                }
                Ok(Event::Cancelled { id: event_id }) if event_id == id => {
                    return WaitResult::Cancelled;
                }
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Poll until the job leaves `initializing`/`downloading`
pub async fn wait_for_settled(downloader: &MediaDownloader, id: JobId, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        match downloader.poll(id).await {
            Ok(job) if job.status.is_terminal() => return true,
            Ok(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            Err(_) => return false,
        }
    }
    false
}
