//! Match-to-candidate plumbing shared by the page strategies

use crate::patterns::{Capture, PatternMatch};
use crate::types::{DiscoveryMethod, RawCandidate};
use crate::utils;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use serde_json::Value;
use url::Url;

/// JSON keys whose string values are treated as media references
const MEDIA_KEYS: &[&str] = &["url", "src", "file", "video", "stream"];

/// Decode, resolve and validate one raw reference
///
/// Returns the absolute URL, or `None` if the reference is not a plausible media URL.
pub(crate) fn media_url(raw: &str, base: &Url) -> Option<String> {
    let cleaned = utils::clean_url(raw);
    if cleaned.is_empty() {
        return None;
    }
    let resolved = utils::resolve_url(base, &cleaned)?;
    utils::is_plausible_media_url(&resolved).then_some(resolved)
}

/// Decode an `atob()` payload into a media URL
pub(crate) fn decode_base64_url(payload: &str, base: &Url) -> Option<String> {
    let payload = payload.trim();
    let bytes = STANDARD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    media_url(&decoded, base)
}

/// Parse a JSON capture, stripping escaping first when the capture asks for it
pub(crate) fn parse_json(m: &PatternMatch) -> Option<Value> {
    let text = match m.capture {
        Capture::EscapedJson => utils::unescape_blob(&m.text),
        _ => m.text.clone(),
    };
    serde_json::from_str(&text).ok()
}

/// Collect media URLs from a JSON tree
///
/// Object values under a media key are taken when they are strings; every
/// other nested object or array is walked. Bare strings inside arrays count too.
pub(crate) fn json_media_urls(value: &Value, base: &Url, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                let is_media_key = MEDIA_KEYS.contains(&key.to_lowercase().as_str());
                match v {
                    Value::String(s) if is_media_key => out.extend(media_url(s, base)),
                    Value::Object(_) | Value::Array(_) => json_media_urls(v, base, out),
                    _ => {}
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(s) => out.extend(media_url(s, base)),
                    Value::Object(_) | Value::Array(_) => json_media_urls(item, base, out),
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

/// Turn raw pattern matches into candidates
///
/// URL captures are tagged `method`, base64 captures `base64_extraction`, and
/// JSON captures are walked for media keys and tagged `method`.
pub(crate) fn candidates(
    matches: &[PatternMatch],
    base: &Url,
    method: DiscoveryMethod,
) -> Vec<RawCandidate> {
    let mut out = Vec::new();
    for m in matches {
        match m.capture {
            Capture::Url => {
                if let Some(url) = media_url(&m.text, base) {
                    out.push(RawCandidate::from_url(url, method));
                }
            }
            Capture::Base64 => {
                if let Some(url) = decode_base64_url(&m.text, base) {
                    out.push(RawCandidate::from_url(
                        url,
                        DiscoveryMethod::Base64Extraction,
                    ));
                }
            }
            Capture::Json | Capture::EscapedJson => {
                let Some(value) = parse_json(m) else {
                    continue;
                };
                let mut urls = Vec::new();
                json_media_urls(&value, base, &mut urls);
                out.extend(urls.into_iter().map(|u| RawCandidate::from_url(u, method)));
            }
        }
    }
    out
}
