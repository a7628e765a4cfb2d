//! Selection policy: pick one ranked source for a quality preference

use crate::config::TieBreak;
use crate::error::{Error, Result};
use crate::types::{QualityPreference, RankedSource};
use crate::utils;

/// Sources that pass structural validation, in ranked order
pub fn valid_sources(ranked: &[RankedSource]) -> Vec<&RankedSource> {
    ranked
        .iter()
        .filter(|s| utils::is_structurally_valid(&s.url))
        .collect()
}

/// Choose a source
///
/// `page_url` only labels the error when nothing valid remains.
///
/// - [`QualityPreference::Best`]: highest quality, ties settled by `tie_break`
/// - [`QualityPreference::Worst`]: lowest quality, first among ties
/// - [`QualityPreference::Target`]: smallest distance to the target, first among ties
pub fn select<'a>(
    ranked: &'a [RankedSource],
    preference: QualityPreference,
    tie_break: &TieBreak,
    page_url: &str,
) -> Result<&'a RankedSource> {
    let valid = valid_sources(ranked);
    if valid.is_empty() {
        return Err(Error::NoValidSources {
            url: page_url.to_string(),
            extracted: ranked.len(),
        });
    }

    let chosen = match preference {
        QualityPreference::Best => best(&valid, tie_break),
        QualityPreference::Worst => first_min_by_key(&valid, |s| s.quality),
        QualityPreference::Target(target) => {
            first_min_by_key(&valid, |s| s.quality.abs_diff(target))
        }
    };

    chosen.ok_or_else(|| Error::NoValidSources {
        url: page_url.to_string(),
        extracted: ranked.len(),
    })
}

fn best<'a>(valid: &[&'a RankedSource], tie_break: &TieBreak) -> Option<&'a RankedSource> {
    let top = valid.iter().map(|s| s.quality).max()?;
    let mut tied = valid.iter().copied().filter(|s| s.quality == top);

    match tie_break {
        TieBreak::RankOrder => tied.next(),
        TieBreak::FileOverManifest => {
            let tied: Vec<_> = tied.collect();
            tied.iter()
                .copied()
                .find(|s| !s.is_manifest())
                .or_else(|| tied.first().copied())
        }
        TieBreak::Extension(ext) => {
            let needle = format!(".{}", ext.trim_start_matches('.').to_lowercase());
            let tied: Vec<_> = tied.collect();
            tied.iter()
                .copied()
                .find(|s| s.url.to_lowercase().contains(&needle))
                .or_else(|| tied.first().copied())
        }
    }
}

/// Element with the smallest key; the earliest one wins ties
fn first_min_by_key<'a, K: Ord>(
    valid: &[&'a RankedSource],
    key: impl Fn(&RankedSource) -> K,
) -> Option<&'a RankedSource> {
    valid.iter().copied().fold(None, |acc, s| match acc {
        Some(current) if key(current) <= key(s) => Some(current),
        _ => Some(s),
    })
}
