//! SSRF guard: reject URLs that would let us reach internal network ranges.
//!
//! Grounded on the defense-in-depth shape used for web-fetch validation
//! elsewhere in the corpus (literal-IP range checks plus DNS-resolved
//! checks), simplified to the ranges the spec enumerates.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use askline_common::AskError;
use tokio::net::lookup_host;
use url::{Host, Url};

/// Parse and validate `raw_url`, resolving DNS for non-literal hosts and
/// rejecting any private/loopback/link-local destination.
///
/// Every resolved address must pass; the first offender fails the whole
/// check (order matters only in that we reject on the first bad address we
/// encounter, not that we promise any particular resolution order).
pub async fn check_url_safe(raw_url: &str) -> Result<Url, AskError> {
    let url = Url::parse(raw_url).map_err(|e| AskError::InvalidUrl(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(AskError::InvalidUrl(format!("unsupported scheme: {other}"))),
    }

    let host = url
        .host()
        .ok_or_else(|| AskError::InvalidUrl("url has no host".to_string()))?;

    match host {
        Host::Ipv4(ip) => {
            if is_blocked(IpAddr::V4(ip)) {
                return Err(AskError::InvalidUrl(format!("blocked address: {ip}")));
            }
        }
        Host::Ipv6(ip) => {
            if is_blocked(IpAddr::V6(ip)) {
                return Err(AskError::InvalidUrl(format!("blocked address: {ip}")));
            }
        }
        Host::Domain(name) => {
            let lower = name.to_ascii_lowercase();
            if lower == "localhost" || lower.ends_with(".local") {
                return Err(AskError::InvalidUrl(format!("blocked hostname: {name}")));
            }

            let port = url.port_or_known_default().unwrap_or(80);
            let resolved = lookup_host((name, port))
                .await
                .map_err(|e| AskError::InvalidUrl(format!("dns lookup failed: {e}")))?;

            let mut saw_any = false;
            for addr in resolved {
                saw_any = true;
                if is_blocked(addr.ip()) {
                    return Err(AskError::InvalidUrl(format!(
                        "blocked resolved address: {}",
                        addr.ip()
                    )));
                }
            }
            if !saw_any {
                return Err(AskError::InvalidUrl("dns lookup returned no addresses".to_string()));
            }
        }
    }

    Ok(url)
}

/// IPv4/IPv6 ranges the spec names explicitly, checked directly rather than
/// via `std`'s (partially unstable) `is_global`/`is_private` helpers so the
/// boundary matches §4.1 exactly.
fn is_blocked(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => is_blocked_v6(v6, v4_mapped(v6)),
    }
}

fn v4_mapped(v6: Ipv6Addr) -> Option<Ipv4Addr> {
    v6.to_ipv4_mapped()
}

fn is_blocked_v4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    matches!(octets[0], 10 | 127) // 10/8, 127/8
        || (octets[0] == 169 && octets[1] == 254) // 169.254/16
        || (octets[0] == 192 && octets[1] == 168) // 192.168/16
        || (octets[0] == 172 && (16..=31).contains(&octets[1])) // 172.16/12
}

fn is_blocked_v6(ip: Ipv6Addr, mapped_v4: Option<Ipv4Addr>) -> bool {
    if let Some(v4) = mapped_v4 {
        return is_blocked_v4(v4);
    }
    if ip == Ipv6Addr::LOCALHOST {
        return true;
    }
    let segments = ip.segments();
    (segments[0] & 0xfe00) == 0xfc00 // fc00::/7
        || (segments[0] & 0xffc0) == 0xfe80 // fe80::/10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_scheme() {
        let url = Url::parse("ftp://example.com").unwrap();
        assert_eq!(url.scheme(), "ftp");
    }

    #[test]
    fn blocks_private_v4_ranges() {
        assert!(is_blocked(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(is_blocked(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
        assert!(is_blocked(IpAddr::V4(Ipv4Addr::new(169, 254, 1, 1))));
        assert!(is_blocked(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
        assert!(is_blocked(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1))));
        assert!(is_blocked(IpAddr::V4(Ipv4Addr::new(172, 31, 255, 255))));
        assert!(!is_blocked(IpAddr::V4(Ipv4Addr::new(172, 32, 0, 1))));
        assert!(!is_blocked(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
    }

    #[test]
    fn blocks_private_v6_ranges() {
        assert!(is_blocked(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert!(is_blocked(IpAddr::V6("fc00::1".parse().unwrap())));
        assert!(is_blocked(IpAddr::V6("fe80::1".parse().unwrap())));
        assert!(!is_blocked(IpAddr::V6("2001:4860:4860::8888".parse().unwrap())));
    }

    #[tokio::test]
    async fn rejects_localhost_hostname() {
        let err = check_url_safe("http://localhost/path").await.unwrap_err();
        assert!(matches!(err, AskError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn rejects_dot_local_hostname() {
        let err = check_url_safe("http://printer.local/").await.unwrap_err();
        assert!(matches!(err, AskError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn rejects_literal_private_ip() {
        let err = check_url_safe("http://192.168.1.1/").await.unwrap_err();
        assert!(matches!(err, AskError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn rejects_non_http_schemes() {
        let err = check_url_safe("ftp://example.com/file").await.unwrap_err();
        assert!(matches!(err, AskError::InvalidUrl(_)));
    }
}
