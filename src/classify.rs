//! Two-stage content classification.
//!
//! Stage one looks only at response headers and the final URL and decides
//! whether the body can be relayed as-is (binary) or must be buffered.
//! Stage two sniffs a sample of the buffered text and can upgrade a response
//! that failed the header check into playlist or subtitle handling. Once
//! confirmed, a classification is never revisited.

use once_cell::sync::Lazy;
use regex::Regex;

/// Bytes of decoded text inspected during content sniffing.
pub const SNIFF_SAMPLE_BYTES: usize = 1024;

/// Subtitle source format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

/// Provisional decision from headers and URL suffix alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderClass {
    Playlist,
    Subtitle(SubtitleFormat),
    /// Relay the byte stream without buffering.
    Binary,
    /// No header signal matched; buffer and sniff.
    Unknown,
}

/// Final routing decision for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Binary,
    Playlist,
    Subtitle(SubtitleFormat),
    Fallback,
}

/// SRT cue opener: sequence number, line break, comma-millisecond timestamps.
static SRT_CUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\d+\s*[\r\n]+\d{2}:\d{2}:\d{2},\d{3}\s*-->\s*\d{2}:\d{2}:\d{2},\d{3}")
        .expect("SRT cue pattern is valid")
});

/// Stage one: classify from the Content-Type header and the final URL.
///
/// Playlist and subtitle signals take precedence over binary ones, so a
/// `.m3u8` served as `video/mp2t` still buffers for rewriting.
pub fn classify_headers(content_type: &str, final_url: &str) -> HeaderClass {
    let ct = content_type.to_ascii_lowercase();
    let low_url = final_url.to_ascii_lowercase();

    let is_playlist = ct.contains("application/vnd.apple.mpegurl")
        || ct.contains("application/x-mpegurl")
        || low_url.contains(".m3u8");
    let is_vtt = ct.contains("text/vtt")
        || (ct.contains("text/plain") && low_url.contains("vtt"))
        || low_url.ends_with(".vtt");
    let is_srt = ct.contains("text/srt")
        || (ct.contains("text/plain") && low_url.contains("srt"))
        || low_url.ends_with(".srt");

    if is_playlist {
        return HeaderClass::Playlist;
    }
    if is_vtt {
        return HeaderClass::Subtitle(SubtitleFormat::Vtt);
    }
    if is_srt {
        return HeaderClass::Subtitle(SubtitleFormat::Srt);
    }
    if low_url.contains(".mp4") || low_url.contains(".ts") || ct.contains("video/") {
        return HeaderClass::Binary;
    }
    HeaderClass::Unknown
}

/// Decode the sniffing sample from the start of a buffered body.
/// Lenient: invalid sequences become replacement characters.
pub fn sample(body: &[u8]) -> String {
    let len = body.len().min(SNIFF_SAMPLE_BYTES);
    String::from_utf8_lossy(&body[..len]).into_owned()
}

/// Returns `true` when the text opens like an SRT cue block.
pub fn looks_like_srt(text: &str) -> bool {
    SRT_CUE_RE.is_match(text)
}

/// Stage two: confirm a provisional class against a content sample.
///
/// Sniffing can upgrade an `Unknown` response into playlist or subtitle
/// handling, and can correct the subtitle format, but never downgrades a
/// header-matched class to `Fallback`.
pub fn confirm(header: HeaderClass, sample: &str) -> Classification {
    if sample.contains("#EXTM3U") || header == HeaderClass::Playlist {
        return Classification::Playlist;
    }
    if looks_like_srt(sample) {
        return Classification::Subtitle(SubtitleFormat::Srt);
    }
    if sample.trim_start().starts_with("WEBVTT") {
        return Classification::Subtitle(SubtitleFormat::Vtt);
    }
    match header {
        HeaderClass::Subtitle(format) => Classification::Subtitle(format),
        HeaderClass::Binary => Classification::Binary,
        HeaderClass::Playlist => Classification::Playlist,
        HeaderClass::Unknown => Classification::Fallback,
    }
}
