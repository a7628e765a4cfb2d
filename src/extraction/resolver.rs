//! Delegated extraction through an external media-resolution tool
//!
//! The [`MediaResolver`] trait hides the tool. [`YtDlpResolver`] runs the
//! `yt-dlp` binary; [`NoOpResolver`] stands in when no binary is available so
//! the pipeline keeps running with one strategy fewer.

use super::{Page, Strategy};
use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::types::{DiscoveryMethod, RawCandidate, StrategyKind};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Metadata reported by a resolver for one page
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResolvedMedia {
    /// Media title
    pub title: Option<String>,
    /// Duration in seconds
    pub duration: Option<f64>,
    /// Uploader or channel
    pub uploader: Option<String>,
    /// Top-level media URL, present when the tool reports a single stream
    pub url: Option<String>,
    /// Container extension of the top-level URL
    pub ext: Option<String>,
    /// Every format the tool found
    pub formats: Vec<ResolvedFormat>,
}

/// One format entry
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResolvedFormat {
    /// Direct URL of this format
    pub url: Option<String>,
    /// Container extension
    pub ext: Option<String>,
    /// Vertical resolution
    pub height: Option<u32>,
    /// Frames per second
    pub fps: Option<f64>,
    /// Video codec (`"none"` for audio-only formats)
    pub vcodec: Option<String>,
    /// Audio codec
    pub acodec: Option<String>,
    /// Exact size in bytes
    pub filesize: Option<f64>,
    /// Estimated size in bytes
    pub filesize_approx: Option<f64>,
}

/// Trait for external media resolution
///
/// Implementations turn a page URL into the formats an external tool can see.
/// Any error is treated by the pipeline as "no candidates".
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resolve a page URL
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be executed, times out, exits
    /// unsuccessfully or prints output that is not valid JSON.
    async fn resolve(&self, url: &str) -> Result<ResolvedMedia>;

    /// Whether this resolver can do any work at all
    fn is_available(&self) -> bool;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Resolver backed by the `yt-dlp` binary
pub struct YtDlpResolver {
    binary_path: PathBuf,
    timeout: Duration,
}

impl YtDlpResolver {
    /// Create a resolver with an explicit binary path
    pub fn new(binary_path: PathBuf, timeout: Duration) -> Self {
        Self {
            binary_path,
            timeout,
        }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path(timeout: Duration) -> Option<Self> {
        which::which("yt-dlp")
            .ok()
            .map(|path| Self::new(path, timeout))
    }

    /// Pick the resolver a configuration asks for
    ///
    /// Explicit path first, then PATH search, then [`NoOpResolver`].
    pub fn from_config(config: &ResolverConfig) -> Arc<dyn MediaResolver> {
        if !config.enabled {
            return Arc::new(NoOpResolver);
        }

        if let Some(path) = &config.ytdlp_path {
            return Arc::new(Self::new(path.clone(), config.timeout));
        }

        if config.search_path
            && let Some(resolver) = Self::from_path(config.timeout)
        {
            return Arc::new(resolver);
        }

        Arc::new(NoOpResolver)
    }

    fn args(url: &str) -> [&str; 5] {
        [
            "--dump-json",
            "--no-playlist",
            "--no-warnings",
            "--skip-download",
            url,
        ]
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, url: &str) -> Result<ResolvedMedia> {
        let child = Command::new(&self.binary_path)
            .args(Self::args(url))
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                Error::ExternalTool(format!(
                    "yt-dlp timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ExternalTool(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// Resolver used when no external tool is available
pub struct NoOpResolver;

#[async_trait]
impl MediaResolver for NoOpResolver {
    async fn resolve(&self, _url: &str) -> Result<ResolvedMedia> {
        Err(Error::NotSupported(
            "delegated extraction requires the yt-dlp binary. \
             Configure resolver.ytdlp_path or ensure yt-dlp is in PATH."
                .into(),
        ))
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Turn resolver output into candidates
///
/// Every format with a URL and a video track becomes a candidate. A result
/// without formats falls back to its top-level URL.
pub fn candidates_from(media: ResolvedMedia) -> Vec<RawCandidate> {
    let title = media.title.unwrap_or_else(|| "Unknown".to_string());
    let uploader = media.uploader.unwrap_or_else(|| "Unknown".to_string());
    let duration = media.duration.map(|d| d.max(0.0) as u64).unwrap_or(0);

    let base = |url: String| RawCandidate {
        url,
        method: DiscoveryMethod::YtDlp,
        quality: 0,
        format: "unknown".to_string(),
        filesize: 0,
        duration,
        title: title.clone(),
        fps: 0,
        vcodec: "unknown".to_string(),
        acodec: "unknown".to_string(),
        uploader: uploader.clone(),
    };

    if !media.formats.is_empty() {
        return media
            .formats
            .into_iter()
            .filter(|f| f.vcodec.as_deref() != Some("none"))
            .filter_map(|f| {
                let url = f.url?;
                Some(RawCandidate {
                    quality: f.height.unwrap_or(0),
                    format: f.ext.unwrap_or_else(|| "unknown".to_string()),
                    filesize: f
                        .filesize
                        .or(f.filesize_approx)
                        .map(|v| v.max(0.0) as u64)
                        .unwrap_or(0),
                    fps: f.fps.map(|v| v.round().max(0.0) as u32).unwrap_or(0),
                    vcodec: f.vcodec.unwrap_or_else(|| "unknown".to_string()),
                    acodec: f.acodec.unwrap_or_else(|| "unknown".to_string()),
                    ..base(url)
                })
            })
            .collect();
    }

    match media.url {
        Some(url) => vec![RawCandidate {
            format: media.ext.unwrap_or_else(|| "unknown".to_string()),
            ..base(url)
        }],
        None => Vec::new(),
    }
}

/// Strategy wrapping a [`MediaResolver`]
pub struct DelegatedStrategy {
    resolver: Arc<dyn MediaResolver>,
}

impl DelegatedStrategy {
    /// Wrap a resolver
    pub fn new(resolver: Arc<dyn MediaResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Strategy for DelegatedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Delegated
    }

    async fn probe(&self, page: &Page) -> Result<Vec<RawCandidate>> {
        if !self.resolver.is_available() {
            tracing::debug!(resolver = self.resolver.name(), "delegated resolver unavailable");
            return Ok(Vec::new());
        }

        let media = self.resolver.resolve(page.url.as_str()).await?;
        Ok(candidates_from(media))
    }
}
