//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils;

/// Unique identifier for a download job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub uuid::Uuid);

impl JobId {
    /// Create a new random JobId
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// First eight characters of the id, used in output file names
    pub fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Download job status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Registered, transfer task not yet running
    Initializing,
    /// Transfer in progress
    Downloading,
    /// Output file written successfully
    Completed,
    /// All header strategies exhausted
    Failed,
    /// Cancelled by the caller
    Cancelled,
}

impl JobStatus {
    /// Whether the job has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Initializing => "initializing",
            JobStatus::Downloading => "downloading",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Which extraction strategy a candidate came from
///
/// Declaration order is the order strategy outputs are concatenated in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Session-aware page fetch plus one level of iframe following
    PageWalk,
    /// External media-resolution library
    Delegated,
    /// Raw page-source pattern scan
    PageScan,
    /// Host-specific handlers
    Platform,
}

/// The heuristic that discovered a candidate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    /// Direct-match pattern inside a followed iframe
    IframeExtraction,
    /// Inline script variable
    JavascriptExtraction,
    /// Response of a probed AJAX endpoint
    ApiExtraction,
    /// Streaming/player markup on the page
    StreamingPattern,
    /// Decoded `atob()` payload
    Base64Extraction,
    /// Delegated resolver (yt-dlp)
    #[serde(rename = "yt-dlp")]
    YtDlp,
    /// Absolute media URL in page source
    DirectPattern,
    /// Embedded JSON object or player config
    JsonExtraction,
    /// `<video>`/`<source>` elements and data attributes
    HtmlElement,
    /// JW Player setup block
    #[serde(rename = "jwplayer")]
    JwPlayer,
    /// Video.js options block
    #[serde(rename = "videojs")]
    VideoJs,
    /// Vimeo player config
    VimeoConfig,
    /// Generic hosting-site pattern
    GenericHosting,
}

impl DiscoveryMethod {
    /// The strategy that owns this method
    pub fn strategy(&self) -> StrategyKind {
        match self {
            DiscoveryMethod::IframeExtraction
            | DiscoveryMethod::JavascriptExtraction
            | DiscoveryMethod::ApiExtraction
            | DiscoveryMethod::StreamingPattern
            | DiscoveryMethod::Base64Extraction => StrategyKind::PageWalk,
            DiscoveryMethod::YtDlp => StrategyKind::Delegated,
            DiscoveryMethod::DirectPattern
            | DiscoveryMethod::JsonExtraction
            | DiscoveryMethod::HtmlElement
            | DiscoveryMethod::JwPlayer
            | DiscoveryMethod::VideoJs => StrategyKind::PageScan,
            DiscoveryMethod::VimeoConfig | DiscoveryMethod::GenericHosting => {
                StrategyKind::Platform
            }
        }
    }
}

/// An unverified media location produced by one strategy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    /// Media URL
    pub url: String,
    /// Discovery heuristic
    pub method: DiscoveryMethod,
    /// Vertical resolution (0 = unknown)
    pub quality: u32,
    /// Container or stream format (`mp4`, `hls`, `dash`, `unknown`, ...)
    pub format: String,
    /// Size in bytes (0 = unknown)
    pub filesize: u64,
    /// Duration in seconds (0 = unknown)
    pub duration: u64,
    /// Display title
    pub title: String,
    /// Frames per second (0 = unknown)
    pub fps: u32,
    /// Video codec
    pub vcodec: String,
    /// Audio codec
    pub acodec: String,
    /// Uploader or channel name
    pub uploader: String,
}

impl RawCandidate {
    /// Candidate for a URL matched by a page pattern, with metadata inferred from the URL
    pub fn from_url(url: impl Into<String>, method: DiscoveryMethod) -> Self {
        let url = url.into();
        Self {
            quality: utils::infer_quality(&url),
            format: utils::format_from_url(&url).to_string(),
            url,
            method,
            filesize: 0,
            duration: 0,
            title: "Extracted Video".to_string(),
            fps: 0,
            vcodec: "unknown".to_string(),
            acodec: "unknown".to_string(),
            uploader: "Unknown".to_string(),
        }
    }

    /// Whether the URL points at an adaptive-streaming manifest rather than a file
    pub fn is_manifest(&self) -> bool {
        matches!(self.format.as_str(), "hls" | "dash")
    }
}

/// A deduplicated, quality-annotated candidate
///
/// Only [`crate::ranking::normalize`] constructs these.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedSource(RawCandidate);

impl RankedSource {
    pub(crate) fn new(candidate: RawCandidate) -> Self {
        Self(candidate)
    }

    /// Unwrap into the underlying candidate record
    pub fn into_inner(self) -> RawCandidate {
        self.0
    }
}

impl std::ops::Deref for RankedSource {
    type Target = RawCandidate;

    fn deref(&self) -> &RawCandidate {
        &self.0
    }
}

/// Requested quality for selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreference {
    /// Highest quality
    #[default]
    Best,
    /// Lowest quality
    Worst,
    /// Closest to the given height
    Target(u32),
}

impl QualityPreference {
    /// Parse a request token (`best`, `worst`, `720`, `720p`)
    ///
    /// Unrecognised tokens select [`QualityPreference::Best`].
    pub fn from_token(token: &str) -> Self {
        let token = token.trim().to_lowercase();
        match token.as_str() {
            "" | "best" => Self::Best,
            "worst" => Self::Worst,
            other => other
                .trim_end_matches('p')
                .parse()
                .map(Self::Target)
                .unwrap_or(Self::Best),
        }
    }
}

/// Snapshot of one managed download
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    /// Job identifier
    pub id: JobId,
    /// The source being downloaded
    pub source: RankedSource,
    /// Current status
    pub status: JobStatus,
    /// Progress percentage (0.0 to 100.0); stays 0 when the size is unknown
    pub progress_percent: f32,
    /// Bytes written so far
    pub bytes_downloaded: u64,
    /// Declared total size (0 if unknown)
    pub total_bytes: u64,
    /// When the job was accepted
    pub started_at: DateTime<Utc>,
    /// When the job reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
    /// Whether a cancel was requested
    pub cancel_requested: bool,
    /// Last error for failed jobs
    pub error_detail: Option<String>,
    /// Human-readable status message
    pub message: String,
    /// Where the output is written
    pub output_path: PathBuf,
    /// Header strategy that produced the data, once known
    pub strategy: Option<String>,
}

/// Result of [`crate::MediaDownloader::select_and_start`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartedDownload {
    /// The new job
    pub job_id: JobId,
    /// The source chosen by the selection policy
    pub selected_source: RankedSource,
    /// Candidates after normalization
    pub total_sources_found: usize,
    /// Candidates that passed structural validation
    pub valid_sources_found: usize,
}

/// Events emitted by the downloader
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job accepted and task spawned
    Started {
        /// Job ID
        id: JobId,
        /// Source URL
        url: String,
    },

    /// Transfer progress
    Progress {
        /// Job ID
        id: JobId,
        /// Bytes written so far
        bytes: u64,
        /// Declared size (0 if unknown)
        total: u64,
        /// Percentage (0.0 when size unknown)
        percent: f32,
    },

    /// Transfer finished
    Completed {
        /// Job ID
        id: JobId,
        /// Output file
        path: PathBuf,
        /// Final size in bytes
        bytes: u64,
    },

    /// All strategies failed
    Failed {
        /// Job ID
        id: JobId,
        /// Error message
        error: String,
    },

    /// Cancelled by the caller
    Cancelled {
        /// Job ID
        id: JobId,
    },
}
