//! Session-aware page walk
//!
//! Works on the fetched page the way a browser session would: follows
//! player-looking iframes one level deep, reads inline script variables,
//! replays AJAX endpoints with XHR headers and scans streaming-player markup.

use super::shared;
use super::{Page, Strategy};
use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::patterns::{PatternKind, PatternLibrary};
use crate::session::{self, SessionContext};
use crate::types::{DiscoveryMethod, RawCandidate, StrategyKind};
use crate::utils;
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::header::{HeaderMap, HeaderName};
use std::time::Duration;
use url::Url;

/// Iframe targets containing one of these are followed
const IFRAME_KEYWORDS: &[&str] = &["player", "embed", "video", "stream"];

/// AJAX endpoints containing one of these are probed
const ENDPOINT_KEYWORDS: &[&str] = &["video", "stream", "play", "media"];

/// Page walk strategy
pub struct PageWalkStrategy {
    patterns: &'static PatternLibrary,
    follow_iframes: bool,
    probe_api_endpoints: bool,
    iframe_timeout: Duration,
    api_timeout: Duration,
}

impl PageWalkStrategy {
    /// Create from extraction settings
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            patterns: PatternLibrary::global(),
            follow_iframes: config.follow_iframes,
            probe_api_endpoints: config.probe_api_endpoints,
            iframe_timeout: config.iframe_timeout,
            api_timeout: config.api_timeout,
        }
    }

    /// Absolute URLs of iframes that look like embedded players
    fn player_iframes(&self, body: &str, page_url: &Url) -> Vec<Url> {
        let mut seen = Vec::new();
        for m in self.patterns.find_all(PatternKind::IframeTag, body) {
            if !contains_any(&m.text, IFRAME_KEYWORDS) {
                continue;
            }
            let cleaned = utils::clean_url(&m.text);
            let Some(resolved) = utils::resolve_url(page_url, &cleaned) else {
                continue;
            };
            if let Ok(url) = Url::parse(&resolved)
                && !seen.contains(&url)
            {
                seen.push(url);
            }
        }
        seen
    }

    async fn walk_iframes(&self, session: &SessionContext, body: &str) -> Vec<RawCandidate> {
        let iframes = self.player_iframes(body, session.page_url());
        let probes = iframes.iter().map(|iframe| self.probe_iframe(session, iframe));
        join_all(probes).await.into_iter().flatten().collect()
    }

    async fn probe_iframe(&self, session: &SessionContext, iframe: &Url) -> Vec<RawCandidate> {
        tracing::debug!(iframe = %iframe, "following iframe");

        let content = match session
            .fetch_text(iframe.as_str(), self.iframe_timeout, HeaderMap::new())
            .await
        {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(iframe = %iframe, error = %e, "iframe fetch failed");
                return Vec::new();
            }
        };

        let matches = self.patterns.find_all(PatternKind::IframeMedia, &content);
        shared::candidates(&matches, iframe, DiscoveryMethod::IframeExtraction)
    }

    fn script_variables(&self, body: &str, page_url: &Url) -> Vec<RawCandidate> {
        let matches = self.patterns.find_all(PatternKind::ScriptVariable, body);
        shared::candidates(&matches, page_url, DiscoveryMethod::JavascriptExtraction)
    }

    /// Absolute endpoint URLs referenced by AJAX/fetch/XHR calls
    fn endpoints(&self, body: &str, page_url: &Url) -> Vec<Url> {
        let mut seen = Vec::new();
        for m in self.patterns.find_all(PatternKind::AjaxEndpoint, body) {
            if !contains_any(&m.text, ENDPOINT_KEYWORDS) {
                continue;
            }
            let cleaned = utils::clean_url(&m.text);
            if let Some(resolved) = utils::resolve_url(page_url, &cleaned)
                && let Ok(url) = Url::parse(&resolved)
                && !seen.contains(&url)
            {
                seen.push(url);
            }
        }
        seen
    }

    async fn probe_endpoints(&self, session: &SessionContext, body: &str) -> Vec<RawCandidate> {
        let endpoints = self.endpoints(body, session.page_url());
        let probes = endpoints
            .iter()
            .map(|endpoint| self.probe_endpoint(session, endpoint));
        join_all(probes).await.into_iter().flatten().collect()
    }

    async fn probe_endpoint(&self, session: &SessionContext, endpoint: &Url) -> Vec<RawCandidate> {
        let mut headers = HeaderMap::new();
        session::insert(
            &mut headers,
            HeaderName::from_static("x-requested-with"),
            "XMLHttpRequest",
        );

        let content = match session
            .fetch_text(endpoint.as_str(), self.api_timeout, headers)
            .await
        {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(endpoint = %endpoint, error = %e, "API probe failed");
                return Vec::new();
            }
        };

        let matches = self.patterns.find_all(PatternKind::ApiMedia, &content);
        shared::candidates(&matches, endpoint, DiscoveryMethod::ApiExtraction)
    }

    fn streaming_patterns(&self, body: &str, page_url: &Url) -> Vec<RawCandidate> {
        let matches = self.patterns.find_all(PatternKind::Streaming, body);
        shared::candidates(&matches, page_url, DiscoveryMethod::StreamingPattern)
    }
}

#[async_trait]
impl Strategy for PageWalkStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PageWalk
    }

    async fn probe(&self, page: &Page) -> Result<Vec<RawCandidate>> {
        let Some(body) = page.body() else {
            return Ok(Vec::new());
        };
        let session = &page.session;
        let page_url = session.page_url();

        let mut candidates = Vec::new();
        if self.follow_iframes {
            candidates.extend(self.walk_iframes(session, body).await);
        }
        candidates.extend(self.script_variables(body, page_url));
        if self.probe_api_endpoints {
            candidates.extend(self.probe_endpoints(session, body).await);
        }
        candidates.extend(self.streaming_patterns(body, page_url));

        tracing::debug!(found = candidates.len(), "page walk finished");
        Ok(candidates)
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}
