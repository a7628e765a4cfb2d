//! Source normalization and ranking

use crate::types::{RankedSource, RawCandidate};
use crate::utils;
use std::collections::HashSet;

/// Turn raw candidates into a ranked source list
///
/// Unknown qualities are inferred from URL tokens, duplicate URLs are dropped
/// (first occurrence wins) and the result is stable-sorted by descending
/// quality, so equal-quality sources keep their discovery order.
///
/// # Examples
///
/// ```
/// use media_dl::ranking::normalize;
/// use media_dl::{DiscoveryMethod, RawCandidate};
///
/// let ranked = normalize(vec![
///     RawCandidate::from_url("https://cdn.example/a.mp4", DiscoveryMethod::DirectPattern),
///     RawCandidate::from_url("https://cdn.example/b_720p.mp4", DiscoveryMethod::DirectPattern),
///     RawCandidate::from_url("https://cdn.example/a.mp4", DiscoveryMethod::HtmlElement),
/// ]);
///
/// assert_eq!(ranked.len(), 2);
/// assert_eq!(ranked[0].quality, 720);
/// ```
pub fn normalize(candidates: Vec<RawCandidate>) -> Vec<RankedSource> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<RankedSource> = candidates
        .into_iter()
        .filter(|c| seen.insert(c.url.clone()))
        .map(|mut c| {
            if c.quality == 0 {
                c.quality = utils::infer_quality(&c.url);
            }
            RankedSource::new(c)
        })
        .collect();

    ranked.sort_by(|a, b| b.quality.cmp(&a.quality));
    ranked
}
