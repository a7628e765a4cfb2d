//! Media source extraction
//!
//! A page is fetched once and handed to a fixed set of independent strategies:
//!
//! - [`PageWalkStrategy`]: iframes, script variables, AJAX endpoints, streaming markup
//! - [`DelegatedStrategy`]: an external [`MediaResolver`] such as yt-dlp
//! - [`PageScanStrategy`]: absolute URLs, embedded JSON, media elements, player setups
//! - [`PlatformStrategy`]: host-specific handlers
//!
//! [`ExtractionPipeline`] runs them concurrently and concatenates their output
//! in that order. A strategy that fails contributes nothing; it never fails the
//! extraction.

use crate::error::Result;
use crate::session::SessionContext;
use crate::types::{RawCandidate, StrategyKind};
use async_trait::async_trait;
use url::Url;

mod page_scan;
mod page_walk;
mod pipeline;
mod platform;
mod resolver;
mod shared;

pub use page_scan::PageScanStrategy;
pub use page_walk::PageWalkStrategy;
pub use pipeline::ExtractionPipeline;
pub use platform::{Platform, PlatformStrategy};
pub use resolver::{
    DelegatedStrategy, MediaResolver, NoOpResolver, ResolvedFormat, ResolvedMedia, YtDlpResolver,
    candidates_from,
};

/// The probed page as every strategy sees it
#[derive(Clone, Debug)]
pub struct Page {
    /// URL the caller asked for
    pub url: Url,
    /// Page body, `None` if the fetch failed
    pub body: Option<String>,
    /// Session bound to this page
    pub session: SessionContext,
}

impl Page {
    /// Page body, if it could be fetched
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// One independent extraction heuristic
///
/// Implementations must not panic on malformed pages; anything unexpected is
/// either skipped or returned as an error, which the pipeline logs and drops.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Which strategy this is; decides its position in the output
    fn kind(&self) -> StrategyKind;

    /// Produce candidates for a page
    async fn probe(&self, page: &Page) -> Result<Vec<RawCandidate>>;
}

#[cfg(test)]
mod tests;
