//! Error types for media-dl
//!
//! This module provides the error handling for the library:
//! - A top-level [`Error`] covering extraction, selection and orchestration failures
//! - `TransferError` describing why a header-strategy attempt failed, kept as job detail
//! - HTTP status code mapping for the API layer that embeds this crate
//! - Structured error responses with machine-readable error codes

use crate::types::{JobId, JobStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// Strategy-level failures never reach callers as this type; they are logged and
/// swallowed inside the extraction pipeline. Transfer failures are recorded on the
/// job instead of being returned. What remains here is what a caller can act on.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "chunk_size")
        key: Option<String>,
    },

    /// The supplied page URL could not be parsed or is not http(s)
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Extraction and normalization produced no candidates
    #[error("no media sources found for {0}")]
    NoSources(String),

    /// Candidates exist but none of them is structurally usable
    #[error("no valid media sources for {url}: all {extracted} extracted URLs are malformed")]
    NoValidSources {
        /// The page URL that was probed
        url: String,
        /// How many candidates extraction produced before filtering
        extracted: usize,
    },

    /// Unknown job id, or a job without a usable output file
    #[error("not found: {0}")]
    NotFound(String),

    /// Cancel was requested for a job that is no longer active
    #[error("job {id} is not active (status: {status})")]
    NotActive {
        /// The job that was targeted
        id: JobId,
        /// Its current (terminal) status
        status: JobStatus,
    },

    /// Eviction was requested for a job that has not finished yet
    #[error("job {id} is still {status}")]
    JobActive {
        /// The job that was targeted
        id: JobId,
        /// Its current (non-terminal) status
        status: JobStatus,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (yt-dlp)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, not implemented, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Reasons a single transfer attempt can fail
///
/// The final error of a transfer becomes the job's `error_detail`.
#[derive(Debug, Error)]
pub(crate) enum TransferError {
    /// Server answered with a non-2xx status
    #[error("HTTP error: {status}")]
    Status {
        /// The HTTP status code returned
        status: u16,
    },

    /// Request could not be sent or the body stream broke
    #[error("request error: {0}")]
    Request(String),

    /// No response or chunk arrived within the per-request timeout
    #[error("timed out after {secs}s")]
    Timeout {
        /// The timeout that elapsed, in seconds
        secs: u64,
    },

    /// The response completed without a single byte
    #[error("no data downloaded")]
    Empty,

    /// Writing to the output file failed
    #[error("write error: {0}")]
    Write(String),

    /// A resumed request got a `206` that does not continue the file
    #[error("range response does not continue at byte {requested} (starts at {returned:?})")]
    RangeMismatch {
        /// Bytes already on disk
        requested: u64,
        /// Start declared by `Content-Range`, if any
        returned: Option<u64>,
    },

    /// Every header strategy was tried and none produced a complete transfer
    #[error("all {attempts} download strategies failed; last error: {last}")]
    AllStrategiesFailed {
        /// Number of strategies attempted
        attempts: usize,
        /// The last error observed
        last: String,
    },
}

/// API error response format
///
/// Returned to the embedding HTTP layer so it can answer with a structured body
/// rather than a raw transport or parsing error.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "not found: job 5f0c...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "no_sources", "not_active")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidUrl(_) => 400,
            Error::NotActive { .. } => 400,

            // 409 Conflict
            Error::JobActive { .. } => 409,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::NoSources(_) => 404,
            Error::NoValidSources { .. } => 404,

            // 500 Internal Server Error - Server-side issues
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - Upstream site errors
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::ExternalTool(_) => 503,

            // 501 Not Implemented - Feature not supported
            Error::NotSupported(_) => 501,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidUrl(_) => "invalid_url",
            Error::NoSources(_) => "no_sources",
            Error::NoValidSources { .. } => "no_valid_sources",
            Error::NotFound(_) => "not_found",
            Error::NotActive { .. } => "not_active",
            Error::JobActive { .. } => "job_active",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::NoSources(url) => Some(serde_json::json!({
                "url": url,
                "sources": [],
            })),
            Error::NoValidSources { url, extracted } => Some(serde_json::json!({
                "url": url,
                "extracted_sources": extracted,
                "valid_sources": 0,
            })),
            Error::NotActive { id, status } | Error::JobActive { id, status } => Some(serde_json::json!({
                "job_id": id,
                "status": status,
            })),
            _ => None,
        };

        let mut api = ApiError::new(code, message);
        api.error.details = details;
        api
    }
}
