//! Host-specific probes
//!
//! The page host picks one handler. Vimeo exposes its renditions through a
//! player config; Dailymotion and Twitch are registered but yield nothing
//! (they need the delegated resolver); every other host gets the generic
//! hosting-site table.

use super::shared;
use super::{Page, Strategy};
use crate::error::Result;
use crate::patterns::{PatternKind, PatternLibrary};
use crate::session::SessionContext;
use crate::types::{DiscoveryMethod, RawCandidate, StrategyKind};
use crate::utils;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::time::Duration;

/// Sites with a dedicated handler
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    /// vimeo.com
    Vimeo,
    /// dailymotion.com
    Dailymotion,
    /// twitch.tv
    Twitch,
    /// Anything else
    Generic,
}

/// Registered domains; a host matches its domain exactly or as a subdomain
const REGISTERED: &[(&str, Platform)] = &[
    ("vimeo.com", Platform::Vimeo),
    ("dailymotion.com", Platform::Dailymotion),
    ("twitch.tv", Platform::Twitch),
];

impl Platform {
    /// Dispatch on a host name
    pub fn for_host(host: &str) -> Self {
        let host = host.trim_end_matches('.').to_lowercase();
        REGISTERED
            .iter()
            .find(|(domain, _)| {
                host == *domain
                    || host
                        .strip_suffix(domain)
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
            .map(|&(_, platform)| platform)
            .unwrap_or(Platform::Generic)
    }
}

/// Platform-specific probe strategy
pub struct PlatformStrategy {
    patterns: &'static PatternLibrary,
    config_timeout: Duration,
}

impl PlatformStrategy {
    /// Create with the timeout used for fetching remote player configs
    pub fn new(config_timeout: Duration) -> Self {
        Self {
            patterns: PatternLibrary::global(),
            config_timeout,
        }
    }

    async fn vimeo(&self, session: &SessionContext, body: &str) -> Vec<RawCandidate> {
        let mut out = Vec::new();

        for m in self.patterns.find_all(PatternKind::VimeoInlineConfig, body) {
            if let Some(config) = shared::parse_json(&m) {
                out.extend(vimeo_files(&config));
            }
        }

        for m in self.patterns.find_all(PatternKind::VimeoConfigUrl, body) {
            let config_url = utils::clean_url(&m.text);
            let Some(config_url) = utils::resolve_url(session.page_url(), &config_url) else {
                continue;
            };
            match session
                .fetch_json(&config_url, self.config_timeout, HeaderMap::new())
                .await
            {
                Ok(config) => out.extend(vimeo_files(&config)),
                Err(e) => {
                    tracing::debug!(config_url = %config_url, error = %e, "vimeo config fetch failed");
                }
            }
        }

        out
    }

    fn generic(&self, body: &str, page: &Page) -> Vec<RawCandidate> {
        let matches = self.patterns.find_all(PatternKind::GenericHosting, body);
        shared::candidates(
            &matches,
            page.session.page_url(),
            DiscoveryMethod::GenericHosting,
        )
    }
}

/// Renditions listed under `request.files` of a Vimeo player config
///
/// Keyed entries with a `url` use the key as their quality label; entries of
/// the `progressive` array use their own `height` or `quality`.
fn vimeo_files(config: &Value) -> Vec<RawCandidate> {
    let Some(files) = config.pointer("/request/files").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (label, info) in files {
        if let Some(url) = info.get("url").and_then(Value::as_str) {
            out.extend(vimeo_candidate(url, utils::infer_quality(label)));
        }
        if let Some(entries) = info.as_array() {
            for entry in entries {
                let Some(url) = entry.get("url").and_then(Value::as_str) else {
                    continue;
                };
                let quality = entry
                    .get("height")
                    .and_then(Value::as_u64)
                    .map(|h| h as u32)
                    .or_else(|| {
                        entry
                            .get("quality")
                            .and_then(Value::as_str)
                            .map(utils::infer_quality)
                    })
                    .unwrap_or(0);
                out.extend(vimeo_candidate(url, quality));
            }
        }
    }
    out
}

fn vimeo_candidate(url: &str, quality: u32) -> Option<RawCandidate> {
    let url = utils::clean_url(url);
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return None;
    }
    Some(RawCandidate {
        quality,
        format: "mp4".to_string(),
        title: "Vimeo Video".to_string(),
        ..RawCandidate::from_url(url, DiscoveryMethod::VimeoConfig)
    })
}

#[async_trait]
impl Strategy for PlatformStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Platform
    }

    async fn probe(&self, page: &Page) -> Result<Vec<RawCandidate>> {
        let Some(body) = page.body() else {
            return Ok(Vec::new());
        };

        let platform = page
            .session
            .page_url()
            .host_str()
            .map(Platform::for_host)
            .unwrap_or(Platform::Generic);

        let candidates = match platform {
            Platform::Vimeo => self.vimeo(&page.session, body).await,
            Platform::Dailymotion | Platform::Twitch => {
                tracing::debug!(?platform, "no dedicated extraction for platform");
                Vec::new()
            }
            Platform::Generic => self.generic(body, page),
        };
        Ok(candidates)
    }
}
