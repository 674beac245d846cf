//! Subtitle normalization to WebVTT.
//!
//! Browsers only render WebVTT, but upstream subtitle files are frequently
//! SRT (or VTT missing its header). Decoding is lenient: bad byte sequences
//! become replacement characters rather than errors.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Cue line position appended to timings that carry no explicit layout:
/// near the bottom of the frame without being cut off.
const DEFAULT_LINE_POSITION: &str = " line:90%";

/// SRT timestamp with comma milliseconds (`00:01:02,345`).
static SRT_TIMESTAMP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2}:\d{2}:\d{2}),(\d{3})").expect("SRT timestamp pattern is valid"));

/// VTT cue timing line, with optional hour component, plus the rest of the
/// line (where positioning settings live).
static CUE_TIMING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"((?:\d{2}:)?\d{2}:\d{2}\.\d{3}\s*-->\s*(?:\d{2}:)?\d{2}:\d{2}\.\d{3})([^\n]*)",
    )
    .expect("cue timing pattern is valid")
});

/// Normalize raw subtitle bytes into a WebVTT document.
///
/// `treat_as_srt` comes from classification; conversion is skipped when the
/// content already opens with `WEBVTT`.
pub fn normalize(raw: &[u8], treat_as_srt: bool) -> String {
    let mut text = String::from_utf8_lossy(raw).into_owned();

    if treat_as_srt && !text.trim_start().starts_with("WEBVTT") {
        text = convert_srt_to_vtt(&text);
    }

    // Independent of the conversion branch: the header must be present.
    if !text.trim_start().starts_with("WEBVTT") {
        text = format!("WEBVTT\n\n{text}");
    }

    inject_positioning(&text)
}

/// Convert SRT cue text to VTT: unify line endings, switch timestamp commas
/// to periods, and prepend the `WEBVTT` header.
pub fn convert_srt_to_vtt(srt: &str) -> String {
    let unified = srt.replace("\r\n", "\n").replace('\r', "\n");
    let converted = SRT_TIMESTAMP_RE
        .replace_all(&unified, "$1.$2")
        .trim()
        .to_string();

    if converted.starts_with("WEBVTT") {
        converted
    } else {
        format!("WEBVTT\n\n{converted}")
    }
}

/// Append the default line position to every cue timing that has no
/// explicit `line:`, `position:`, or `align:` setting. Idempotent.
pub fn inject_positioning(vtt: &str) -> String {
    CUE_TIMING_RE
        .replace_all(vtt, |caps: &Captures| {
            let rest = &caps[2];
            if rest.contains("line:") || rest.contains("position:") || rest.contains("align:") {
                caps[0].to_string()
            } else {
                format!("{}{}{}", &caps[1], DEFAULT_LINE_POSITION, rest)
            }
        })
        .into_owned()
}
