//! SSRF guard for user-supplied proxy targets.
//!
//! The `url` query parameter is attacker-controlled, so in production the
//! proxy refuses to fetch private or reserved address space. Hostnames are
//! accepted without resolution; DNS-rebinding mitigation would need an async
//! lookup and is out of scope here.

use crate::error::ProxyError;
use std::net::IpAddr;
use url::{Host, Url};

/// Validate a proxy target before fetching it.
///
/// Always enforces http/https. IP-literal checks are skipped when
/// `allow_private` is set (dev mode, tests, trusted deployments).
///
/// # Errors
/// Returns [`ProxyError::TargetNotAllowed`] for non-HTTP(S) schemes, hostless
/// URLs, and IP literals in private/reserved ranges.
pub fn validate_target_url(url: &Url, allow_private: bool) -> Result<(), ProxyError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ProxyError::TargetNotAllowed(format!(
                "scheme '{scheme}' is not supported"
            )));
        }
    }

    let host = url
        .host()
        .ok_or_else(|| ProxyError::TargetNotAllowed("URL has no host".to_string()))?;

    if allow_private {
        return Ok(());
    }

    let blocked = match host {
        Host::Ipv4(ip) => !is_public(IpAddr::V4(ip)),
        Host::Ipv6(ip) => !is_public(IpAddr::V6(ip)),
        Host::Domain(_) => false,
    };

    if blocked {
        return Err(ProxyError::TargetNotAllowed(format!(
            "private or reserved address: {host}"
        )));
    }

    Ok(())
}

/// Routable on the public internet, as far as the address itself tells us.
fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_unspecified()
                || v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                // 0.0.0.0/8 beyond the unspecified address itself
                || v4.octets()[0] == 0)
        }
        IpAddr::V6(v6) => {
            let head = v6.segments()[0];
            !(v6.is_unspecified()
                || v6.is_loopback()
                // fe80::/10 link-local
                || (head & 0xffc0) == 0xfe80
                // fc00::/7 unique-local
                || (head & 0xfe00) == 0xfc00)
        }
    }
}
