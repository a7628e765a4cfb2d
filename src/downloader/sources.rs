//! Source discovery entry points: extract, rank, select, start.

use crate::error::{Error, Result};
use crate::ranking;
use crate::selection;
use crate::types::{QualityPreference, RankedSource, StartedDownload};

use super::MediaDownloader;

impl MediaDownloader {
    /// Extract and rank the media sources of a page
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if `url` is not an http(s) URL
    /// - [`Error::NoSources`] if nothing was found
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use media_dl::*;
    /// # async fn example(downloader: MediaDownloader) -> Result<()> {
    /// for source in downloader.extract("https://example.com/watch/42").await? {
    ///     println!("{}p {} via {:?}", source.quality, source.url, source.method);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn extract(&self, url: &str) -> Result<Vec<RankedSource>> {
        let candidates = self.pipeline.extract(url).await?;
        let ranked = ranking::normalize(candidates);
        if ranked.is_empty() {
            return Err(Error::NoSources(url.to_string()));
        }
        tracing::debug!(url, sources = ranked.len(), "sources ranked");
        Ok(ranked)
    }

    /// Extract, pick one source by quality token and start downloading it
    ///
    /// `quality` accepts `best`, `worst`, `720` or `720p`; `None` and
    /// unrecognised tokens mean best. The page URL is sent as `Referer`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if `url` is not an http(s) URL
    /// - [`Error::NoSources`] if nothing was found
    /// - [`Error::NoValidSources`] if every candidate is malformed
    pub async fn select_and_start(
        &self,
        url: &str,
        quality: Option<&str>,
    ) -> Result<StartedDownload> {
        let preference = quality
            .map(QualityPreference::from_token)
            .unwrap_or_default();
        let ranked = self.extract(url).await?;

        let chosen = selection::select(
            &ranked,
            preference,
            &self.config.selection.tie_break,
            url,
        )?
        .clone();
        let valid_sources_found = selection::valid_sources(&ranked).len();

        tracing::info!(
            url,
            ?preference,
            quality = chosen.quality,
            source = %chosen.url,
            "source selected"
        );

        let job_id = self.start_from_page(chosen.clone(), url).await;

        Ok(StartedDownload {
            job_id,
            selected_source: chosen,
            total_sources_found: ranked.len(),
            valid_sources_found,
        })
    }
}
