//! Raw page-source scan
//!
//! Pure pattern work over the already-fetched page body: absolute media URLs,
//! embedded JSON and player configs, media elements, and JW Player / Video.js
//! setup blocks.

use super::shared::{self, media_url};
use super::{Page, Strategy};
use crate::error::Result;
use crate::patterns::{PatternKind, PatternLibrary};
use crate::types::{DiscoveryMethod, RawCandidate, StrategyKind};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// Page-source scan strategy
pub struct PageScanStrategy {
    patterns: &'static PatternLibrary,
}

impl Default for PageScanStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl PageScanStrategy {
    /// Create using the global pattern library
    pub fn new() -> Self {
        Self {
            patterns: PatternLibrary::global(),
        }
    }

    /// Run every scan over a body, in discovery order
    pub fn scan(&self, body: &str, base: &Url) -> Vec<RawCandidate> {
        let mut out = Vec::new();

        let direct = self.patterns.find_all(PatternKind::DirectUrl, body);
        out.extend(shared::candidates(&direct, base, DiscoveryMethod::DirectPattern));

        let mut json = self.patterns.find_all(PatternKind::JsonBlob, body);
        json.extend(self.patterns.find_all(PatternKind::PlayerConfig, body));
        out.extend(shared::candidates(&json, base, DiscoveryMethod::JsonExtraction));

        let elements = self.patterns.find_all(PatternKind::VideoElement, body);
        out.extend(shared::candidates(&elements, base, DiscoveryMethod::HtmlElement));

        out.extend(self.jwplayer(body, base));
        out.extend(self.videojs(body, base));
        out
    }

    /// `jwplayer(…).setup({…})`: top-level `file`, else `sources[].file`
    fn jwplayer(&self, body: &str, base: &Url) -> Vec<RawCandidate> {
        let mut out = Vec::new();
        for m in self.patterns.find_all(PatternKind::JwPlayer, body) {
            let Some(config) = shared::parse_json(&m) else {
                continue;
            };
            let urls: Vec<&str> = match config.get("file").and_then(Value::as_str) {
                Some(file) => vec![file],
                None => source_fields(&config, "file"),
            };
            out.extend(
                urls.into_iter()
                    .filter_map(|u| media_url(u, base))
                    .map(|u| RawCandidate::from_url(u, DiscoveryMethod::JwPlayer)),
            );
        }
        out
    }

    /// `videojs(…, {…})`: `sources[].src`
    fn videojs(&self, body: &str, base: &Url) -> Vec<RawCandidate> {
        let mut out = Vec::new();
        for m in self.patterns.find_all(PatternKind::VideoJs, body) {
            let Some(config) = shared::parse_json(&m) else {
                continue;
            };
            out.extend(
                source_fields(&config, "src")
                    .into_iter()
                    .filter_map(|u| media_url(u, base))
                    .map(|u| RawCandidate::from_url(u, DiscoveryMethod::VideoJs)),
            );
        }
        out
    }
}

/// String values of `field` in each object of a config's `sources` array
fn source_fields<'a>(config: &'a Value, field: &str) -> Vec<&'a str> {
    config
        .get("sources")
        .and_then(Value::as_array)
        .map(|sources| {
            sources
                .iter()
                .filter_map(|s| s.get(field).and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Strategy for PageScanStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PageScan
    }

    async fn probe(&self, page: &Page) -> Result<Vec<RawCandidate>> {
        Ok(page
            .body()
            .map(|body| self.scan(body, page.session.page_url()))
            .unwrap_or_default())
    }
}
