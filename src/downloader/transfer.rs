//! Streaming transfer with a fallback chain of request-header strategies.
//!
//! Each strategy is one attempt at fetching the media with a different
//! identity. The first attempt that writes at least one byte and reaches the
//! end of the body wins. When an attempt dies after writing data, the next one
//! asks for the remainder with `Range: bytes=<written>-` and keeps the file if
//! the server answers `206` from that exact byte.

use super::tasks::ProgressReporter;
use crate::config::DownloadConfig;
use crate::error::TransferError;
use crate::session;
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderName};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// iPhone Safari identity used by the `mobile` strategy
pub(crate) const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_7_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.2 Mobile/15E148 Safari/604.1";

/// Minimal command-line identity used by the `generic_client` strategy
pub(crate) const GENERIC_USER_AGENT: &str = "curl/7.68.0";

/// Desktop identity of the cookie-less `fresh_session` strategy
pub(crate) const FRESH_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// One request identity in the fallback chain
pub(crate) struct HeaderStrategy {
    /// Name recorded on the job once this strategy produced the data
    pub(crate) name: &'static str,
    /// Use a brand-new client with no cookies and no default headers
    fresh_client: bool,
    /// Send `Range: bytes=0-` on a first attempt
    ranged: bool,
    /// Per-request headers; the shared client adds its defaults underneath
    headers: fn(Option<&str>) -> HeaderMap,
}

/// Header strategies in the order they are tried
pub(crate) const HEADER_STRATEGIES: &[HeaderStrategy] = &[
    HeaderStrategy {
        name: "protected",
        fresh_client: false,
        ranged: true,
        headers: protected_headers,
    },
    HeaderStrategy {
        name: "mobile",
        fresh_client: false,
        ranged: true,
        headers: mobile_headers,
    },
    HeaderStrategy {
        name: "generic_client",
        fresh_client: false,
        ranged: false,
        headers: generic_headers,
    },
    HeaderStrategy {
        name: "fresh_session",
        fresh_client: true,
        ranged: false,
        headers: fresh_headers,
    },
];

fn protected_headers(referer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    session::insert(&mut headers, header::ACCEPT, "*/*");
    session::insert(&mut headers, header::ACCEPT_ENCODING, "identity");
    session::insert(&mut headers, HeaderName::from_static("sec-fetch-dest"), "video");
    session::insert(&mut headers, HeaderName::from_static("sec-fetch-mode"), "no-cors");
    session::insert(&mut headers, HeaderName::from_static("sec-fetch-site"), "cross-site");
    with_referer(headers, referer)
}

fn mobile_headers(referer: Option<&str>) -> HeaderMap {
    let mut headers = protected_headers(referer);
    session::insert(&mut headers, header::USER_AGENT, MOBILE_USER_AGENT);
    headers
}

fn generic_headers(referer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    session::insert(&mut headers, header::USER_AGENT, GENERIC_USER_AGENT);
    session::insert(&mut headers, header::ACCEPT, "*/*");
    session::insert(&mut headers, header::ACCEPT_ENCODING, "identity");
    with_referer(headers, referer)
}

fn fresh_headers(referer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    session::insert(&mut headers, header::USER_AGENT, FRESH_USER_AGENT);
    session::insert(&mut headers, header::ACCEPT, "*/*");
    session::insert(&mut headers, header::ACCEPT_ENCODING, "identity");
    with_referer(headers, referer)
}

fn with_referer(mut headers: HeaderMap, referer: Option<&str>) -> HeaderMap {
    if let Some(referer) = referer.filter(|r| !r.is_empty()) {
        session::insert(&mut headers, header::REFERER, referer);
    }
    headers
}

/// Full per-request header set for an attempt starting at `offset`
pub(crate) fn request_headers(
    strategy: &HeaderStrategy,
    referer: Option<&str>,
    offset: u64,
) -> HeaderMap {
    let mut headers = (strategy.headers)(referer);
    if offset > 0 {
        session::insert(&mut headers, header::RANGE, &format!("bytes={}-", offset));
    } else if strategy.ranged {
        session::insert(&mut headers, header::RANGE, "bytes=0-");
    }
    headers
}

/// How an attempt writes its body
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WriteMode {
    /// Continue after the bytes already on disk
    Append,
    /// Start the file over
    Truncate,
}

/// Where the body of a `206` starts, from `Content-Range: bytes a-b/total`
pub(crate) fn range_start(response_headers: &HeaderMap) -> Option<u64> {
    response_headers
        .get(header::CONTENT_RANGE)?
        .to_str()
        .ok()?
        .trim()
        .strip_prefix("bytes ")?
        .split('-')
        .next()?
        .trim()
        .parse()
        .ok()
}

/// Decide how a response continues the file holding `offset` bytes
///
/// Only a `206` that starts exactly at `offset` extends the file. A body
/// starting at zero replaces it; a body starting anywhere else is refused.
pub(crate) fn write_mode(
    offset: u64,
    status: StatusCode,
    response_headers: &HeaderMap,
) -> Result<WriteMode, TransferError> {
    if status != StatusCode::PARTIAL_CONTENT {
        return Ok(WriteMode::Truncate);
    }
    match range_start(response_headers) {
        Some(0) => Ok(WriteMode::Truncate),
        Some(start) if start == offset => Ok(WriteMode::Append),
        None if offset == 0 => Ok(WriteMode::Truncate),
        returned => Err(TransferError::RangeMismatch {
            requested: offset,
            returned,
        }),
    }
}

/// Size of the whole resource, if the response declares it
///
/// For a `206`, `Content-Range: bytes a-b/total` wins; otherwise the body
/// length is added to where the body starts.
pub(crate) fn declared_total(response_headers: &HeaderMap, start: u64, body_len: Option<u64>) -> u64 {
    let from_range = response_headers
        .get(header::CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit('/').next())
        .and_then(|total| total.trim().parse::<u64>().ok());

    match (from_range, body_len) {
        (Some(total), _) => total,
        (None, Some(len)) if len > 0 => start + len,
        _ => 0,
    }
}

/// How a whole transfer ended, short of failing
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// The body was fully written
    Completed {
        /// Final file size
        bytes: u64,
        /// Strategy that produced the data
        strategy: &'static str,
    },
    /// The cancellation token fired
    Cancelled {
        /// Bytes on disk when the cancel was observed
        bytes: u64,
    },
}

enum Step {
    Finished,
    Cancelled,
}

/// Everything one download needs
pub(crate) struct Transfer<'a> {
    pub(crate) url: &'a str,
    pub(crate) referer: Option<&'a str>,
    pub(crate) output_path: &'a Path,
    pub(crate) client: &'a reqwest::Client,
    pub(crate) config: &'a DownloadConfig,
    pub(crate) cancel: &'a CancellationToken,
}

impl Transfer<'_> {
    /// Try every header strategy in order until one completes
    pub(crate) async fn run(
        &self,
        reporter: &mut ProgressReporter,
    ) -> Result<Outcome, TransferError> {
        let mut written = 0u64;
        let mut attempts = 0usize;
        let mut last = TransferError::Empty;

        for strategy in HEADER_STRATEGIES {
            if self.cancel.is_cancelled() {
                return Ok(Outcome::Cancelled { bytes: written });
            }

            attempts += 1;
            tracing::debug!(
                job_id = %reporter.id(),
                strategy = strategy.name,
                offset = written,
                "trying header strategy"
            );

            match self.attempt(strategy, &mut written, reporter).await {
                Ok(Step::Cancelled) => return Ok(Outcome::Cancelled { bytes: written }),
                Ok(Step::Finished) if self.cancel.is_cancelled() => {
                    return Ok(Outcome::Cancelled { bytes: written });
                }
                Ok(Step::Finished) => {
                    return Ok(Outcome::Completed {
                        bytes: written,
                        strategy: strategy.name,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %reporter.id(),
                        strategy = strategy.name,
                        written,
                        error = %e,
                        "header strategy failed"
                    );
                    last = e;
                }
            }
        }

        Err(TransferError::AllStrategiesFailed {
            attempts,
            last: last.to_string(),
        })
    }

    async fn attempt(
        &self,
        strategy: &HeaderStrategy,
        written: &mut u64,
        reporter: &mut ProgressReporter,
    ) -> Result<Step, TransferError> {
        let timeout = self.config.request_timeout;
        let offset = *written;

        let fresh;
        let client = if strategy.fresh_client {
            fresh = reqwest::Client::builder()
                .no_gzip()
                .connect_timeout(self.config.connect_timeout)
                .build()
                .map_err(|e| TransferError::Request(e.to_string()))?;
            &fresh
        } else {
            self.client
        };

        let request = client
            .get(self.url)
            .headers(request_headers(strategy, self.referer, offset));

        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(Step::Cancelled),
            sent = tokio::time::timeout(timeout, request.send()) => sent
                .map_err(|_| timed_out(timeout))?
                .map_err(|e| TransferError::Request(e.to_string()))?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status {
                status: status.as_u16(),
            });
        }

        let mode = write_mode(offset, status, response.headers())?;
        let start = match mode {
            WriteMode::Append => offset,
            WriteMode::Truncate => 0,
        };
        let total = declared_total(response.headers(), start, response.content_length());

        let mut file = match mode {
            WriteMode::Append => {
                tokio::fs::OpenOptions::new()
                    .append(true)
                    .open(self.output_path)
                    .await
            }
            WriteMode::Truncate => tokio::fs::File::create(self.output_path).await,
        }
        .map_err(|e| TransferError::Write(e.to_string()))?;
        *written = start;

        reporter.begin(strategy.name, total).await;

        let chunk_size = self.config.chunk_size.max(1);
        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => None,
                next = tokio::time::timeout(timeout, stream.next()) => {
                    Some(next.map_err(|_| timed_out(timeout))?)
                }
            };
            let Some(next) = next else {
                return self.stop(&mut file).await;
            };
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| TransferError::Request(e.to_string()))?;

            for piece in chunk.chunks(chunk_size) {
                if self.cancel.is_cancelled() {
                    return self.stop(&mut file).await;
                }
                file.write_all(piece)
                    .await
                    .map_err(|e| TransferError::Write(e.to_string()))?;
                *written += piece.len() as u64;
                reporter.report(*written, total).await;
            }
        }

        file.flush()
            .await
            .map_err(|e| TransferError::Write(e.to_string()))?;

        if *written == 0 {
            return Err(TransferError::Empty);
        }
        Ok(Step::Finished)
    }

    async fn stop(&self, file: &mut tokio::fs::File) -> Result<Step, TransferError> {
        file.flush()
            .await
            .map_err(|e| TransferError::Write(e.to_string()))?;
        Ok(Step::Cancelled)
    }
}

fn timed_out(timeout: Duration) -> TransferError {
    TransferError::Timeout {
        secs: timeout.as_secs(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn strategy(name: &str) -> &'static HeaderStrategy {
        HEADER_STRATEGIES.iter().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn test_strategy_order() {
        let names: Vec<&str> = HEADER_STRATEGIES.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["protected", "mobile", "generic_client", "fresh_session"]
        );
    }

    #[test]
    fn test_protected_headers() {
        let headers = request_headers(strategy("protected"), Some("https://site.example/watch"), 0);
        assert_eq!(headers[header::RANGE], "bytes=0-");
        assert_eq!(headers[header::ACCEPT], "*/*");
        assert_eq!(headers[header::ACCEPT_ENCODING], "identity");
        assert_eq!(headers["sec-fetch-dest"], "video");
        assert_eq!(headers["sec-fetch-mode"], "no-cors");
        assert_eq!(headers["sec-fetch-site"], "cross-site");
        assert_eq!(headers[header::REFERER], "https://site.example/watch");
        // the shared client supplies the desktop user agent
        assert!(!headers.contains_key(header::USER_AGENT));
    }

    #[test]
    fn test_mobile_and_generic_identities() {
        let mobile = request_headers(strategy("mobile"), None, 0);
        assert_eq!(mobile[header::USER_AGENT], MOBILE_USER_AGENT);
        assert_eq!(mobile["sec-fetch-dest"], "video");
        assert!(!mobile.contains_key(header::REFERER));

        let generic = request_headers(strategy("generic_client"), Some("https://site.example/"), 0);
        assert_eq!(generic[header::USER_AGENT], GENERIC_USER_AGENT);
        assert!(!generic.contains_key(header::RANGE));
        assert!(!generic.contains_key("sec-fetch-dest"));
    }

    #[test]
    fn test_resume_offset_requests_remainder() {
        for s in HEADER_STRATEGIES {
            let headers = request_headers(s, None, 4096);
            assert_eq!(headers[header::RANGE], "bytes=4096-", "strategy {}", s.name);
        }
    }

    fn content_range(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_RANGE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_write_mode() {
        let none = HeaderMap::new();
        assert_eq!(write_mode(0, StatusCode::OK, &none).unwrap(), WriteMode::Truncate);
        assert_eq!(
            write_mode(0, StatusCode::PARTIAL_CONTENT, &content_range("bytes 0-99/100")).unwrap(),
            WriteMode::Truncate
        );
        assert_eq!(
            write_mode(512, StatusCode::PARTIAL_CONTENT, &content_range("bytes 512-999/1000")).unwrap(),
            WriteMode::Append
        );
        // server ignored the range: start over
        assert_eq!(write_mode(512, StatusCode::OK, &none).unwrap(), WriteMode::Truncate);
        assert_eq!(
            write_mode(512, StatusCode::PARTIAL_CONTENT, &content_range("bytes 0-999/1000")).unwrap(),
            WriteMode::Truncate
        );
    }

    #[test]
    fn test_write_mode_refuses_misaligned_ranges() {
        let err = write_mode(512, StatusCode::PARTIAL_CONTENT, &content_range("bytes 256-999/1000"))
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::RangeMismatch {
                requested: 512,
                returned: Some(256)
            }
        ));
        assert!(matches!(
            write_mode(512, StatusCode::PARTIAL_CONTENT, &HeaderMap::new()),
            Err(TransferError::RangeMismatch { returned: None, .. })
        ));
    }

    #[test]
    fn test_range_start() {
        assert_eq!(range_start(&content_range("bytes 400-999/1000")), Some(400));
        assert_eq!(range_start(&content_range("bytes 0-99/*")), Some(0));
        assert_eq!(range_start(&content_range("bytes */1000")), None);
        assert_eq!(range_start(&HeaderMap::new()), None);
    }

    #[test]
    fn test_declared_total() {
        let mut headers = HeaderMap::new();
        assert_eq!(declared_total(&headers, 0, Some(1000)), 1000);
        assert_eq!(declared_total(&headers, 400, Some(600)), 1000);
        assert_eq!(declared_total(&headers, 0, None), 0);

        headers.insert(
            header::CONTENT_RANGE,
            HeaderValue::from_static("bytes 400-999/1000"),
        );
        assert_eq!(declared_total(&headers, 400, Some(600)), 1000);

        headers.insert(header::CONTENT_RANGE, HeaderValue::from_static("bytes 0-99/*"));
        assert_eq!(declared_total(&headers, 0, Some(100)), 100);
    }
}
