//! Pattern library: regex tables used by the page strategies
//!
//! Tables are plain data (`PatternKind → &[PatternSpec]`). Each entry says how
//! its first capture group is meant to be read (a URL, a JSON document, or a
//! base64 payload). [`PatternLibrary::global`] compiles every table once.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// How a pattern's capture should be interpreted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capture {
    /// The capture is a (possibly escaped or relative) URL
    Url,
    /// The capture is a JSON document
    Json,
    /// The capture is JSON with one level of backslash escaping to strip first
    EscapedJson,
    /// The capture is base64 that should decode to a URL
    Base64,
}

/// A named group of patterns applied together
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// `<iframe src=…>` tags on the page
    IframeTag,
    /// Media references inside a followed iframe
    IframeMedia,
    /// Inline script variables holding media URLs
    ScriptVariable,
    /// AJAX/fetch/XHR endpoints referenced by scripts
    AjaxEndpoint,
    /// Media references inside an AJAX response body
    ApiMedia,
    /// Streaming-site player markup, manifests and `atob()` payloads
    Streaming,
    /// Absolute media URLs anywhere in the source
    DirectUrl,
    /// JSON objects and arrays that mention a media file
    JsonBlob,
    /// Assigned player config objects and `sources`/`playlist` arrays
    PlayerConfig,
    /// `<video>`/`<source>` elements and data attributes
    VideoElement,
    /// `jwplayer(…).setup({…})`
    JwPlayer,
    /// `videojs(…, {…})`
    VideoJs,
    /// Inline `window.vimeoPlayerConfig = {…};`
    VimeoInlineConfig,
    /// `"config_url":"…"` pointing at the Vimeo player config
    VimeoConfigUrl,
    /// JSON and JS keys used by generic hosting sites
    GenericHosting,
}

impl PatternKind {
    /// Every kind, in table order
    pub const ALL: [PatternKind; 15] = [
        PatternKind::IframeTag,
        PatternKind::IframeMedia,
        PatternKind::ScriptVariable,
        PatternKind::AjaxEndpoint,
        PatternKind::ApiMedia,
        PatternKind::Streaming,
        PatternKind::DirectUrl,
        PatternKind::JsonBlob,
        PatternKind::PlayerConfig,
        PatternKind::VideoElement,
        PatternKind::JwPlayer,
        PatternKind::VideoJs,
        PatternKind::VimeoInlineConfig,
        PatternKind::VimeoConfigUrl,
        PatternKind::GenericHosting,
    ];

    /// The source table for this kind
    pub fn specs(self) -> &'static [PatternSpec] {
        match self {
            PatternKind::IframeTag => IFRAME_TAG,
            PatternKind::IframeMedia => IFRAME_MEDIA,
            PatternKind::ScriptVariable => SCRIPT_VARIABLE,
            PatternKind::AjaxEndpoint => AJAX_ENDPOINT,
            PatternKind::ApiMedia => API_MEDIA,
            PatternKind::Streaming => STREAMING,
            PatternKind::DirectUrl => DIRECT_URL,
            PatternKind::JsonBlob => JSON_BLOB,
            PatternKind::PlayerConfig => PLAYER_CONFIG,
            PatternKind::VideoElement => VIDEO_ELEMENT,
            PatternKind::JwPlayer => JWPLAYER,
            PatternKind::VideoJs => VIDEOJS,
            PatternKind::VimeoInlineConfig => VIMEO_INLINE_CONFIG,
            PatternKind::VimeoConfigUrl => VIMEO_CONFIG_URL,
            PatternKind::GenericHosting => GENERIC_HOSTING,
        }
    }
}

/// One uncompiled pattern
#[derive(Clone, Copy, Debug)]
pub struct PatternSpec {
    /// Regex source; group 1 (or the whole match if absent) is the capture
    pub source: &'static str,
    /// How to read the capture
    pub capture: Capture,
}

const fn url(source: &'static str) -> PatternSpec {
    PatternSpec {
        source,
        capture: Capture::Url,
    }
}

const fn json(source: &'static str) -> PatternSpec {
    PatternSpec {
        source,
        capture: Capture::Json,
    }
}

const IFRAME_TAG: &[PatternSpec] = &[url(r#"(?i)<iframe[^>]*src=["']([^"']+)["'][^>]*>"#)];

const IFRAME_MEDIA: &[PatternSpec] = &[
    url(r#"(?i)"file":\s*"([^"]+\.(?:mp4|m3u8|mpd))""#),
    url(r#"(?i)"src":\s*"([^"]+\.(?:mp4|m3u8|mpd))""#),
    url(r#"(?i)"url":\s*"([^"]+\.(?:mp4|m3u8|mpd))""#),
    url(r#"(?i)source:\s*["']([^"']+\.(?:mp4|m3u8|mpd))["']"#),
    url(r#"(?i)file:\s*["']([^"']+\.(?:mp4|m3u8|mpd))["']"#),
];

const SCRIPT_VARIABLE: &[PatternSpec] = &[
    url(r#"(?i)var\s+\w+\s*=\s*["']([^"']+\.(?:mp4|m3u8|mpd))["']"#),
    url(r#"(?i)let\s+\w+\s*=\s*["']([^"']+\.(?:mp4|m3u8|mpd))["']"#),
    url(r#"(?i)const\s+\w+\s*=\s*["']([^"']+\.(?:mp4|m3u8|mpd))["']"#),
    url(r#"(?i)videoUrl\s*[:=]\s*["']([^"']+)["']"#),
    url(r#"(?i)streamUrl\s*[:=]\s*["']([^"']+)["']"#),
    url(r#"(?i)playUrl\s*[:=]\s*["']([^"']+)["']"#),
];

const AJAX_ENDPOINT: &[PatternSpec] = &[
    url(r#"(?i)ajax\([^)]*url:\s*["']([^"']+)["']"#),
    url(r#"(?i)fetch\(["']([^"']+)["']"#),
    url(r#"(?i)XMLHttpRequest.*open\([^,]*,\s*["']([^"']+)["']"#),
];

const API_MEDIA: &[PatternSpec] = &[
    url(r#"(?i)"url":\s*"([^"]+\.(?:mp4|m3u8|mpd))""#),
    url(r#"(?i)"file":\s*"([^"]+\.(?:mp4|m3u8|mpd))""#),
    url(r#"(?i)"src":\s*"([^"]+\.(?:mp4|m3u8|mpd))""#),
];

const STREAMING: &[PatternSpec] = &[
    url(r#"(?i)data-src=["']([^"']*(?:mp4|m3u8|mpd)[^"']*)["']"#),
    url(r#"(?i)data-video=["']([^"']*)["']"#),
    PatternSpec {
        source: r#"(?i)atob\(["']([^"']+)["']"#,
        capture: Capture::Base64,
    },
    url(r#"(?i)player\.setup\(\{[^}]*file:\s*["']([^"']+)["']"#),
    url(r#"(?i)new\s+Plyr\([^,]*,\s*\{[^}]*sources:\s*\[\{[^}]*src:\s*["']([^"']+)["']"#),
    url(r#"(?i)([^"'\s<>]+\.m3u8(?:\?[^"'\s<>]*)?)"#),
    url(r#"(?i)([^"'\s<>]+\.mpd(?:\?[^"'\s<>]*)?)"#),
    url(r#"(?i)(https?://[^"'\s<>]+\.(?:mp4|avi|mkv|mov|wmv|flv|webm|m4v)(?:\?[^"'\s<>]*)?)"#),
];

const DIRECT_URL: &[PatternSpec] = &[
    url(r#"(?i)https?://[^"'\s<>]+\.(?:mp4|avi|mkv|mov|wmv|flv|webm|m4v)(?:\?[^"'\s<>]*)?"#),
    url(r#"(?i)https?://[^"'\s<>]+/videoplayback\?[^"'\s<>]*"#),
    url(r#"(?i)https?://[^"'\s<>]+\.m3u8(?:\?[^"'\s<>]*)?"#),
    url(r#"(?i)https?://[^"'\s<>]+\.mpd(?:\?[^"'\s<>]*)?"#),
];

const JSON_BLOB: &[PatternSpec] = &[
    PatternSpec {
        source: r#"(?is)(\{[^{}]*(?:"url"|"src"|"file"|"video")[^{}]*\.(?:mp4|m3u8|mpd)[^{}]*\})"#,
        capture: Capture::EscapedJson,
    },
    PatternSpec {
        source: r#"(?is)(\[[^\[\]]*"[^"]*\.(?:mp4|m3u8|mpd)"[^\[\]]*\])"#,
        capture: Capture::EscapedJson,
    },
];

const PLAYER_CONFIG: &[PatternSpec] = &[
    json(r#"(?is)window\.playerConfig\s*=\s*(\{.+?\});"#),
    json(r#"(?is)var\s+config\s*=\s*(\{.+?\});"#),
    json(r#"(?is)"sources":\s*(\[.+?\])"#),
    json(r#"(?is)"playlist":\s*(\[.+?\])"#),
];

const VIDEO_ELEMENT: &[PatternSpec] = &[
    url(r#"(?i)<video[^>]*src=["']([^"']+)["'][^>]*>"#),
    url(r#"(?i)<source[^>]*src=["']([^"']+)["'][^>]*>"#),
    url(r#"(?i)data-src=["']([^"']+\.(?:mp4|webm|m4v))["']"#),
    url(r#"(?i)data-video=["']([^"']+)["']"#),
];

const JWPLAYER: &[PatternSpec] = &[json(r#"(?is)jwplayer\([^)]*\)\.setup\((\{.+?\})\)"#)];

const VIDEOJS: &[PatternSpec] = &[json(r#"(?is)videojs\([^)]*,\s*(\{.+?\})\)"#)];

const VIMEO_INLINE_CONFIG: &[PatternSpec] =
    &[json(r#"(?s)window\.vimeoPlayerConfig\s*=\s*(\{.+?\});"#)];

const VIMEO_CONFIG_URL: &[PatternSpec] = &[url(r#""config_url":"([^"]+)""#)];

const GENERIC_HOSTING: &[PatternSpec] = &[
    url(r#"(?i)"file":\s*"([^"]+\.(?:mp4|avi|mkv|mov|wmv|flv|webm|m4v))""#),
    url(r#"(?i)"src":\s*"([^"]+\.(?:mp4|avi|mkv|mov|wmv|flv|webm|m4v))""#),
    url(r#"(?i)"url":\s*"([^"]+\.(?:mp4|avi|mkv|mov|wmv|flv|webm|m4v))""#),
    url(r#"(?i)file:\s*["']([^"']+\.(?:mp4|avi|mkv|mov|wmv|flv|webm|m4v))["']"#),
    url(r#"(?i)src:\s*["']([^"']+\.(?:mp4|avi|mkv|mov|wmv|flv|webm|m4v))["']"#),
];

/// A compiled pattern
#[derive(Debug)]
pub struct Pattern {
    regex: Regex,
    capture: Capture,
}

impl Pattern {
    /// How this pattern's captures should be read
    pub fn capture(&self) -> Capture {
        self.capture
    }
}

/// One capture produced by [`PatternLibrary::find_all`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternMatch {
    /// The captured text, untouched
    pub text: String,
    /// How to read it
    pub capture: Capture,
}

/// Every pattern table, compiled
#[derive(Debug)]
pub struct PatternLibrary {
    tables: HashMap<PatternKind, Vec<Pattern>>,
}

static LIBRARY: LazyLock<PatternLibrary> = LazyLock::new(PatternLibrary::compile);

impl PatternLibrary {
    /// The process-wide compiled library
    pub fn global() -> &'static PatternLibrary {
        &LIBRARY
    }

    /// Compile every table; entries that fail to compile are logged and skipped
    pub fn compile() -> Self {
        let tables = PatternKind::ALL
            .iter()
            .map(|&kind| {
                let patterns = kind
                    .specs()
                    .iter()
                    .filter_map(|entry| match Regex::new(entry.source) {
                        Ok(regex) => Some(Pattern {
                            regex,
                            capture: entry.capture,
                        }),
                        Err(e) => {
                            tracing::error!(?kind, pattern = entry.source, error = %e, "invalid pattern");
                            None
                        }
                    })
                    .collect();
                (kind, patterns)
            })
            .collect();

        Self { tables }
    }

    /// Compiled patterns for a kind
    pub fn patterns(&self, kind: PatternKind) -> &[Pattern] {
        self.tables.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Apply every pattern of a kind, in table order then match order
    pub fn find_all(&self, kind: PatternKind, haystack: &str) -> Vec<PatternMatch> {
        self.patterns(kind)
            .iter()
            .flat_map(|pattern| {
                pattern.regex.captures_iter(haystack).filter_map(move |caps| {
                    caps.get(1).or_else(|| caps.get(0)).map(|m| PatternMatch {
                        text: m.as_str().to_string(),
                        capture: pattern.capture,
                    })
                })
            })
            .collect()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn texts(kind: PatternKind, haystack: &str) -> Vec<String> {
        PatternLibrary::global()
            .find_all(kind, haystack)
            .into_iter()
            .map(|m| m.text)
            .collect()
    }

    #[test]
    fn test_every_table_compiles() {
        let library = PatternLibrary::compile();
        for kind in PatternKind::ALL {
            assert_eq!(
                library.patterns(kind).len(),
                kind.specs().len(),
                "{kind:?} lost a pattern at compile time"
            );
        }
    }

    #[test]
    fn test_iframe_tag() {
        let html = r#"<div><IFRAME width="640" src="//player.example.com/embed/9"></iframe></div>"#;
        assert_eq!(
            texts(PatternKind::IframeTag, html),
            vec!["//player.example.com/embed/9"]
        );
    }

    #[test]
    fn test_script_variables() {
        let js = r#"var src = "https://cdn.example.com/a.mp4"; const videoUrl = 'https://x.example/play?id=1';"#;
        let found = texts(PatternKind::ScriptVariable, js);
        assert!(found.contains(&"https://cdn.example.com/a.mp4".to_string()));
        assert!(found.contains(&"https://x.example/play?id=1".to_string()));
    }

    #[test]
    fn test_atob_is_base64_capture() {
        let found = PatternLibrary::global()
            .find_all(PatternKind::Streaming, r#"var u = atob("aHR0cHM6Ly94LmV4YW1wbGUvdi5tcDQ=");"#);
        assert!(
            found
                .iter()
                .any(|m| m.capture == Capture::Base64 && m.text.starts_with("aHR0cHM6"))
        );
    }

    #[test]
    fn test_direct_url_has_no_group_and_uses_whole_match() {
        let html = r#"<a href="https://cdn.example.com/clip.mp4?sig=1">x</a>"#;
        assert_eq!(
            texts(PatternKind::DirectUrl, html),
            vec!["https://cdn.example.com/clip.mp4?sig=1"]
        );
    }

    #[test]
    fn test_jwplayer_setup_spans_lines() {
        let js = "jwplayer(\"p\").setup({\n  \"file\": \"https://cdn.example.com/v.m3u8\"\n})";
        let found = PatternLibrary::global().find_all(PatternKind::JwPlayer, js);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].capture, Capture::Json);
        assert!(found[0].text.starts_with('{'));
    }

    #[test]
    fn test_vimeo_patterns() {
        let html = r#"{"config_url":"https:\/\/player.vimeo.com\/video\/1\/config"}"#;
        assert_eq!(
            texts(PatternKind::VimeoConfigUrl, html),
            vec![r"https:\/\/player.vimeo.com\/video\/1\/config"]
        );
    }
}
