//! Line-oriented HLS playlist rewriting.
//!
//! Every reference in the manifest — bare segment/variant lines and
//! `URI="…"` attributes inside tags — is resolved against the manifest's own
//! base URL and replaced with a same-origin proxy URL, so the player's next
//! request comes straight back here. Rewriting is line-preserving: tags the
//! proxy does not understand pass through byte-for-byte.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::Url;

/// Route of the proxy endpoint all rewritten references point at.
pub const PROXY_ENDPOINT: &str = "/api/proxy/video";

static LINE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n").expect("line break pattern is valid"));

static URI_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"URI="([^"]+)""#).expect("URI attribute pattern is valid"));

static STREAM_INF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#EXT-X-STREAM-INF:(.*)").expect("STREAM-INF pattern is valid"));

/// Read-only context for one rewriting pass, built once per request.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    /// Scheme + host of this proxy (e.g. `https://proxy.example`), derived
    /// from forwarded headers.
    pub proxy_origin: String,
    /// `referer` query parameter, propagated into every generated URL.
    pub referer: Option<String>,
    /// Subtitle track URL to inject into master playlists.
    pub subtitle_url: Option<String>,
}

impl RewriteContext {
    /// Build a proxy URL for an absolute target reference.
    pub fn proxy_url(&self, target: &str) -> String {
        let mut out = format!(
            "{}{}?url={}",
            self.proxy_origin,
            PROXY_ENDPOINT,
            urlencoding::encode(target)
        );
        if let Some(referer) = &self.referer {
            out.push_str("&referer=");
            out.push_str(&urlencoding::encode(referer));
        }
        out
    }
}

/// A manifest listing variant streams rather than media segments.
pub fn is_master_playlist(text: &str) -> bool {
    text.contains("#EXT-X-STREAM-INF")
}

/// Rewrite every reference in `text` to route through the proxy, optionally
/// injecting a subtitle track into master playlists.
pub fn rewrite_playlist(text: &str, base_url: &Url, ctx: &RewriteContext) -> String {
    let lines: Vec<String> = LINE_BREAK_RE
        .split(text)
        .map(|line| rewrite_line(line, base_url, ctx))
        .collect();
    let rewritten = lines.join("\n");

    match &ctx.subtitle_url {
        Some(subtitle_url) if is_master_playlist(text) => {
            inject_subtitle_track(&rewritten, subtitle_url, ctx)
        }
        _ => rewritten,
    }
}

fn rewrite_line(line: &str, base_url: &Url, ctx: &RewriteContext) -> String {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        // Blank lines pass through verbatim.
        return line.to_string();
    }

    if trimmed.starts_with('#') {
        // Tags can carry references in URI attributes (EXT-X-KEY,
        // EXT-X-MEDIA, EXT-X-MAP, ...).
        return URI_ATTR_RE
            .replace_all(line, |caps: &Captures| match base_url.join(&caps[1]) {
                Ok(absolute) => format!(r#"URI="{}""#, ctx.proxy_url(absolute.as_str())),
                // A value that is not a resolvable URL stays untouched.
                Err(_) => caps[0].to_string(),
            })
            .into_owned();
    }

    // A non-comment line is one reference, relative or absolute.
    match base_url.join(trimmed) {
        Ok(absolute) => ctx.proxy_url(absolute.as_str()),
        Err(_) => line.to_string(),
    }
}

/// Insert an `#EXT-X-MEDIA` subtitle rendition after the `#EXTM3U` header and
/// attach the `subs` group to every variant that does not already declare one.
fn inject_subtitle_track(playlist: &str, subtitle_url: &str, ctx: &RewriteContext) -> String {
    let media_line = format!(
        "#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"subs\",NAME=\"Subtitles\",DEFAULT=YES,AUTOSELECT=YES,URI=\"{}\"",
        ctx.proxy_url(subtitle_url)
    );
    let with_media = playlist.replacen("#EXTM3U", &format!("#EXTM3U\n{media_line}"), 1);

    STREAM_INF_RE
        .replace_all(&with_media, |caps: &Captures| {
            let attrs = &caps[1];
            if attrs.contains("SUBTITLES=") {
                caps[0].to_string()
            } else {
                format!("#EXT-X-STREAM-INF:{attrs},SUBTITLES=\"subs\"")
            }
        })
        .into_owned()
}
