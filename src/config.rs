//! Configuration types for media-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Desktop Chrome identity used for page fetches and the first header strategies
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Page probing configuration (timeouts, iframe/API toggles, delegated resolver)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// User-Agent sent with page, iframe and API requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for the main page fetch (default: 15 seconds)
    #[serde(default = "default_page_timeout", with = "duration_serde")]
    pub page_timeout: Duration,

    /// Timeout for each followed iframe (default: 10 seconds)
    #[serde(default = "default_iframe_timeout", with = "duration_serde")]
    pub iframe_timeout: Duration,

    /// Timeout for each probed AJAX endpoint (default: 5 seconds)
    #[serde(default = "default_api_timeout", with = "duration_serde")]
    pub api_timeout: Duration,

    /// Fetch player-looking iframes and scan their content (default: true)
    #[serde(default = "default_true")]
    pub follow_iframes: bool,

    /// Fetch AJAX endpoints referenced by inline scripts (default: true)
    #[serde(default = "default_true")]
    pub probe_api_endpoints: bool,

    /// Delegated resolver (yt-dlp) settings
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            page_timeout: default_page_timeout(),
            iframe_timeout: default_iframe_timeout(),
            api_timeout: default_api_timeout(),
            follow_iframes: true,
            probe_api_endpoints: true,
            resolver: ResolverConfig::default(),
        }
    }
}

/// External media-resolution tool settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Run the delegated resolver at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Whether to search PATH for yt-dlp if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Upper bound on one resolver invocation (default: 60 seconds)
    #[serde(default = "default_resolver_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ytdlp_path: None,
            search_path: true,
            timeout: default_resolver_timeout(),
        }
    }
}

/// Transfer configuration (scratch directory, chunking, timeouts)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory output files are written to (default: "./downloads")
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Write granularity in bytes (default: 8192)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Per-request timeout; bounds the response head and every body chunk (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// TCP/TLS connect timeout (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Minimum milliseconds between progress events (default: 250)
    ///
    /// The pollable job record is updated on every chunk; only broadcast
    /// [`Event::Progress`](crate::types::Event::Progress) emission is throttled.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            chunk_size: default_chunk_size(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

/// How equal-quality candidates are ordered when selecting the best source
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Prefer a single-file container over an HLS/DASH manifest
    #[default]
    FileOverManifest,
    /// Prefer URLs containing `.<ext>` (e.g. `mp4`)
    Extension(String),
    /// Keep ranked order (first wins)
    RankOrder,
}

/// Selection policy settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Tie-break among sources of equal top quality
    #[serde(default)]
    pub tie_break: TieBreak,
}

/// Main configuration for [`MediaDownloader`](crate::MediaDownloader)
///
/// Every field has a default, so `Config::default()` and an empty JSON object
/// both produce a working configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Page probing
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Transfers
    #[serde(default)]
    pub download: DownloadConfig,

    /// Source selection
    #[serde(default)]
    pub selection: SelectionConfig,
}

impl Config {
    /// Reject settings the downloader cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.download.chunk_size == 0 {
            return Err(config_error("chunk size must be positive", "chunk_size"));
        }

        let timeouts = [
            ("page_timeout", self.extraction.page_timeout),
            ("iframe_timeout", self.extraction.iframe_timeout),
            ("api_timeout", self.extraction.api_timeout),
            ("resolver.timeout", self.extraction.resolver.timeout),
            ("request_timeout", self.download.request_timeout),
            ("connect_timeout", self.download.connect_timeout),
        ];
        if let Some((key, _)) = timeouts.iter().find(|(_, d)| d.is_zero()) {
            return Err(config_error(format!("{} must be positive", key), key));
        }

        if self.extraction.user_agent.trim().is_empty() {
            return Err(config_error("user agent must not be empty", "user_agent"));
        }

        Ok(())
    }

    /// Scratch directory for output files
    pub fn scratch_dir(&self) -> &PathBuf {
        &self.download.scratch_dir
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_page_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_iframe_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_resolver_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_chunk_size() -> usize {
    8192
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_progress_interval_ms() -> u64 {
    250
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
