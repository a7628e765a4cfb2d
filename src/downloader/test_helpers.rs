//! Shared test helpers for creating MediaDownloader instances in tests.

use crate::config::Config;
use crate::downloader::{JobRegistry, MediaDownloader};
use crate::extraction::NoOpResolver;
use crate::ranking::normalize;
use crate::types::{DiscoveryMethod, DownloadJob, JobId, JobStatus, RankedSource, RawCandidate};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Helper to create a test MediaDownloader writing into a temp directory.
/// Returns the downloader and the tempdir (which must be kept alive).
///
/// No external resolver, short timeouts and unthrottled progress events.
pub(crate) async fn create_test_downloader() -> (MediaDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.download.scratch_dir = temp_dir.path().join("downloads");
    config.download.request_timeout = Duration::from_secs(5);
    config.download.connect_timeout = Duration::from_secs(5);
    config.download.progress_interval_ms = 0;
    config.extraction.page_timeout = Duration::from_secs(5);
    config.extraction.iframe_timeout = Duration::from_secs(5);
    config.extraction.api_timeout = Duration::from_secs(5);

    let downloader =
        MediaDownloader::with_parts(config, Arc::new(NoOpResolver), JobRegistry::new())
            .await
            .unwrap();

    (downloader, temp_dir)
}

/// A ranked source for a direct URL
pub(crate) fn ranked_source(url: &str) -> RankedSource {
    normalize(vec![RawCandidate::from_url(url, DiscoveryMethod::DirectPattern)])
        .pop()
        .unwrap()
}

/// A fresh `initializing` record, as `start` would register it
pub(crate) fn job_record(source: RankedSource) -> DownloadJob {
    DownloadJob {
        id: JobId::new(),
        source,
        status: JobStatus::Initializing,
        progress_percent: 0.0,
        bytes_downloaded: 0,
        total_bytes: 0,
        started_at: Utc::now(),
        completed_at: None,
        cancel_requested: false,
        error_detail: None,
        message: "Initializing download...".to_string(),
        output_path: PathBuf::from("/nonexistent/output.mp4"),
        strategy: None,
    }
}

/// Poll until the job is terminal (panics after 10 seconds)
pub(crate) async fn wait_for_terminal(downloader: &MediaDownloader, id: JobId) -> DownloadJob {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let job = downloader.poll(id).await.unwrap();
        if job.status.is_terminal() {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {} still {} after 10s",
            id,
            job.status
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
