//! Fan-out/fan-in over the extraction strategies

use super::{
    DelegatedStrategy, MediaResolver, Page, PageScanStrategy, PageWalkStrategy, PlatformStrategy,
    Strategy, YtDlpResolver,
};
use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::session::SessionContext;
use crate::types::{RawCandidate, StrategyKind};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Runs every strategy against one page and merges the results
pub struct ExtractionPipeline {
    client: reqwest::Client,
    page_timeout: Duration,
    strategies: Vec<Box<dyn Strategy>>,
}

impl ExtractionPipeline {
    /// Build the standard strategy set, resolving yt-dlp from the configuration
    pub fn new(client: reqwest::Client, config: &ExtractionConfig) -> Self {
        let resolver = YtDlpResolver::from_config(&config.resolver);
        Self::with_resolver(client, config, resolver)
    }

    /// Build the standard strategy set around a given resolver
    pub fn with_resolver(
        client: reqwest::Client,
        config: &ExtractionConfig,
        resolver: Arc<dyn MediaResolver>,
    ) -> Self {
        tracing::debug!(resolver = resolver.name(), "building extraction pipeline");

        let strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(PageWalkStrategy::new(config)),
            Box::new(DelegatedStrategy::new(resolver)),
            Box::new(PageScanStrategy::new()),
            Box::new(PlatformStrategy::new(config.page_timeout)),
        ];
        Self::with_strategies(client, config.page_timeout, strategies)
    }

    /// Build from an explicit strategy list
    ///
    /// Strategies are kept in [`StrategyKind`] order regardless of how they are
    /// passed; several strategies of one kind keep their relative order.
    pub fn with_strategies(
        client: reqwest::Client,
        page_timeout: Duration,
        mut strategies: Vec<Box<dyn Strategy>>,
    ) -> Self {
        strategies.sort_by_key(|s| s.kind());
        Self {
            client,
            page_timeout,
            strategies,
        }
    }

    /// Kinds of the configured strategies, in output order
    pub fn strategy_kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Parse and check a page URL
    pub fn parse_page_url(url: &str) -> Result<Url> {
        let parsed = Url::parse(url.trim()).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(Error::InvalidUrl(url.to_string()));
        }
        Ok(parsed)
    }

    /// Extract raw candidates from a page
    ///
    /// Only an unusable URL is an error. Network and parse failures reduce the
    /// output; a page with nothing on it yields an empty vector.
    pub async fn extract(&self, url: &str) -> Result<Vec<RawCandidate>> {
        let page_url = Self::parse_page_url(url)?;
        let session = SessionContext::new(self.client.clone(), page_url.clone());

        tracing::info!(url = %page_url, "extracting media sources");

        let body = match session.fetch_page(self.page_timeout).await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(url = %page_url, error = %e, "page fetch failed, continuing with URL-only strategies");
                None
            }
        };

        let page = Page {
            url: page_url,
            body,
            session,
        };

        let probes = self.strategies.iter().map(|strategy| {
            let page = &page;
            async move {
                let kind = strategy.kind();
                match strategy.probe(page).await {
                    Ok(found) => {
                        tracing::debug!(strategy = ?kind, found = found.len(), "strategy finished");
                        found
                    }
                    Err(e) => {
                        tracing::warn!(strategy = ?kind, error = %e, "strategy failed");
                        Vec::new()
                    }
                }
            }
        });

        let candidates: Vec<RawCandidate> = join_all(probes).await.into_iter().flatten().collect();

        tracing::info!(url = %page.url, candidates = candidates.len(), "extraction finished");
        Ok(candidates)
    }
}
