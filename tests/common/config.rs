//! Test configuration helpers for creating downloaders against local fixtures

use media_dl::{Config, JobRegistry, MediaDownloader, NoOpResolver};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Configuration with short timeouts and a scratch directory inside `temp_dir`
pub fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.download.scratch_dir = temp_dir.path().join("downloads");
    config.download.request_timeout = Duration::from_secs(5);
    config.download.connect_timeout = Duration::from_secs(5);
    config.download.progress_interval_ms = 0;
    config.extraction.page_timeout = Duration::from_secs(5);
    config.extraction.iframe_timeout = Duration::from_secs(5);
    config.extraction.api_timeout = Duration::from_secs(5);
    config.extraction.resolver.enabled = false;
    config
}

/// Create a downloader that never shells out to yt-dlp
///
/// Returns the downloader and the tempdir (which must be kept alive).
pub async fn create_downloader() -> Result<(MediaDownloader, TempDir), String> {
    let temp_dir = tempfile::tempdir().map_err(|e| format!("Failed to create temp dir: {}", e))?;
    let config = test_config(&temp_dir);
    let downloader =
        MediaDownloader::with_parts(config, Arc::new(NoOpResolver), JobRegistry::new())
            .await
            .map_err(|e| format!("Failed to create downloader: {}", e))?;
    Ok((downloader, temp_dir))
}
