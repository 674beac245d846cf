//! HLS manifest handling.

pub mod rewrite;

pub use rewrite::{RewriteContext, rewrite_playlist};
