//! URL and file-name helpers shared by extraction, ranking and the downloader

use url::Url;

/// Shortest string that can be a plausible media reference
const MIN_MEDIA_URL_LEN: usize = 10;

/// Shortest URL accepted by the selection policy
const MIN_SELECTABLE_URL_LEN: usize = 20;

/// Longest title fragment kept in output file names
const MAX_TITLE_LEN: usize = 50;

/// File extensions that mark a media resource (containers and manifests)
pub const MEDIA_EXTENSIONS: &[&str] = &[
    ".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".m4v", ".m3u8", ".mpd",
];

/// Keywords that mark a streaming endpoint without a file extension
pub const STREAMING_KEYWORDS: &[&str] = &[
    "videoplayback",
    "manifest",
    "playlist",
    "stream",
    "/video/",
    "player",
];

/// Resolution tokens, checked in order; the first hit wins
const QUALITY_TOKENS: &[(&str, u32)] = &[
    ("2160", 2160),
    ("4k", 2160),
    ("1440", 1440),
    ("1080", 1080),
    ("hd", 1080),
    ("720", 720),
    ("480", 480),
    ("360", 360),
    ("240", 240),
];

/// Extension → format name, checked in order
const FORMAT_MAP: &[(&str, &str)] = &[
    (".mp4", "mp4"),
    (".avi", "avi"),
    (".mkv", "mkv"),
    (".mov", "mov"),
    (".wmv", "wmv"),
    (".flv", "flv"),
    (".webm", "webm"),
    (".m4v", "m4v"),
    (".m3u8", "hls"),
    (".mpd", "dash"),
];

/// Undo the escaping commonly found around URLs embedded in HTML and scripts
///
/// Handles `\/`, `/`, `&amp;` and surrounding quotes/whitespace.
///
/// # Examples
///
/// ```
/// use media_dl::utils::clean_url;
///
/// assert_eq!(
///     clean_url(r#" "https:\/\/cdn.example.com\/a.mp4?x=1&amp;y=2" "#),
///     "https://cdn.example.com/a.mp4?x=1&y=2"
/// );
/// ```
#[must_use]
pub fn clean_url(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .replace("\\/", "/")
        .replace("\\u002F", "/")
        .replace("\\u002f", "/")
        .replace("&amp;", "&")
}

/// Strip one level of backslash escaping (`\x` → `x`) from a JSON-looking blob
#[must_use]
pub fn unescape_blob(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Resolve a (possibly relative or protocol-relative) reference against its document
///
/// Returns `None` when the result is not an http(s) URL.
///
/// # Examples
///
/// ```
/// use media_dl::utils::resolve_url;
/// use url::Url;
///
/// let base = Url::parse("https://site.example/watch/42").unwrap();
/// assert_eq!(
///     resolve_url(&base, "//cdn.example/v.mp4").as_deref(),
///     Some("https://cdn.example/v.mp4")
/// );
/// assert_eq!(
///     resolve_url(&base, "/media/v.m3u8").as_deref(),
///     Some("https://site.example/media/v.m3u8")
/// );
/// assert_eq!(resolve_url(&base, "javascript:void(0)"), None);
/// ```
#[must_use]
pub fn resolve_url(base: &Url, reference: &str) -> Option<String> {
    let reference = reference.trim();
    let resolved = if let Some(rest) = reference.strip_prefix("//") {
        Url::parse(&format!("https://{}", rest)).ok()?
    } else {
        base.join(reference).ok()?
    };

    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Check whether a URL plausibly points at a media resource
///
/// Requires a minimum length, an http(s) scheme and either a media file
/// extension or a streaming keyword anywhere in the URL.
#[must_use]
pub fn is_plausible_media_url(url: &str) -> bool {
    if url.len() < MIN_MEDIA_URL_LEN {
        return false;
    }

    let lower = url.to_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return false;
    }

    has_media_indicator(&lower)
}

/// Whether a lowercased string contains a media extension or streaming keyword
pub(crate) fn has_media_indicator(lower: &str) -> bool {
    MEDIA_EXTENSIONS.iter().any(|ext| lower.contains(ext))
        || STREAMING_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Infer vertical resolution from resolution tokens in a URL or label
///
/// A URL's port is ignored; `:41080` says nothing about the media.
///
/// # Examples
///
/// ```
/// use media_dl::utils::infer_quality;
///
/// assert_eq!(infer_quality("https://cdn.example/clip_720p.mp4"), 720);
/// assert_eq!(infer_quality("https://cdn.example/4K/master.m3u8"), 2160);
/// assert_eq!(infer_quality("https://cdn.example/clip.mp4"), 0);
/// ```
#[must_use]
pub fn infer_quality(text: &str) -> u32 {
    let lower = match Url::parse(text) {
        Ok(mut url) if url.port().is_some() => {
            if url.set_port(None).is_ok() {
                url.as_str().to_lowercase()
            } else {
                text.to_lowercase()
            }
        }
        _ => text.to_lowercase(),
    };
    QUALITY_TOKENS
        .iter()
        .find(|(token, _)| lower.contains(token))
        .map(|&(_, quality)| quality)
        .unwrap_or(0)
}

/// Format name for a URL (`mp4`, `hls`, `dash`, ... or `unknown`)
#[must_use]
pub fn format_from_url(url: &str) -> &'static str {
    let lower = url.to_lowercase();
    FORMAT_MAP
        .iter()
        .find(|(ext, _)| lower.contains(ext))
        .map(|&(_, format)| format)
        .unwrap_or("unknown")
}

/// Structural check applied before selection
///
/// Rejects anything that is not http(s), starts with `,//`, contains an embedded
/// delimiter (`|`, whitespace, quotes, angle brackets) or is implausibly short.
#[must_use]
pub fn is_structurally_valid(url: &str) -> bool {
    (url.starts_with("http://") || url.starts_with("https://"))
        && !url.starts_with(",//")
        && !url
            .chars()
            .any(|c| matches!(c, '|' | '"' | '\'' | '<' | '>') || c.is_whitespace())
        && url.len() > MIN_SELECTABLE_URL_LEN
}

/// Build the output file name for a job
///
/// Spaces become underscores, everything but alphanumerics and `-_.` is dropped
/// and the title is capped at 50 characters.
///
/// # Examples
///
/// ```
/// use media_dl::utils::output_file_name;
///
/// assert_eq!(
///     output_file_name("My Clip: part 1/2", "1a2b3c4d", "mp4"),
///     "My_Clip_part_12_1a2b3c4d.mp4"
/// );
/// assert_eq!(output_file_name("", "1a2b3c4d", ""), "video_1a2b3c4d.mp4");
/// ```
#[must_use]
pub fn output_file_name(title: &str, short_id: &str, format: &str) -> String {
    let mut clean: String = title
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .take(MAX_TITLE_LEN)
        .collect();
    if clean.trim_matches('.').is_empty() {
        clean = "video".to_string();
    }

    let ext: String = format
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let ext = if ext.is_empty() { "mp4".to_string() } else { ext };

    format!("{}_{}.{}", clean, short_id, ext)
}
