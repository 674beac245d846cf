//! vidproxy — a streaming media proxy.
//!
//! Fetches remote video resources (segments, HLS playlists, subtitles) on
//! behalf of a browser client, rewrites playlist references so every
//! sub-request routes back through the proxy, and normalizes subtitles to
//! WebVTT.

pub mod classify;
pub mod config;
pub mod error;
pub mod fetch;
pub mod hls;
pub mod metrics;
pub mod server;
pub mod subtitle;
