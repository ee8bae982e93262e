//! Client IP extraction from proxy headers with trust validation.
//!
//! Falls back to the socket peer address whenever headers are absent or the
//! configured trust mode rejects them.

use axum::http::HeaderMap;
use std::net::IpAddr;
use tracing::warn;

use crate::config::{EnrichmentConfig, TrustedProxyMode};

pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: IpAddr,
    config: &EnrichmentConfig,
) -> IpAddr {
    match config.trusted_proxy_mode {
        TrustedProxyMode::None => socket_addr,
        TrustedProxyMode::Cloudflare => cloudflare_ip(headers).unwrap_or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => {
            forwarded_for_ip(headers, config.num_trusted_proxies).unwrap_or(socket_addr)
        }
    }
}

fn cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// Parse X-Forwarded-For. With `num_trusted` set, skip that many entries
/// from the right (our own proxy hops); otherwise take the rightmost entry,
/// the only one a client cannot spoof.
fn forwarded_for_ip(headers: &HeaderMap, num_trusted: Option<usize>) -> Option<IpAddr> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;

    let ips: Vec<IpAddr> = xff
        .split(',')
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect();

    if ips.is_empty() {
        return None;
    }

    match num_trusted {
        Some(n) if ips.len() > n => Some(ips[ips.len() - n - 1]),
        Some(_) => ips.first().copied(),
        None => ips.last().copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config(mode: TrustedProxyMode, num_trusted: Option<usize>) -> EnrichmentConfig {
        EnrichmentConfig {
            geoip_db_path: None,
            trusted_proxy_mode: mode,
            num_trusted_proxies: num_trusted,
        }
    }

    fn socket() -> IpAddr {
        "192.168.1.1".parse().unwrap()
    }

    #[test]
    fn test_none_mode_ignores_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        let ip = extract_client_ip(&headers, socket(), &config(TrustedProxyMode::None, None));
        assert_eq!(ip, socket());
    }

    #[test]
    fn test_cloudflare_header() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.1"));
        let ip = extract_client_ip(&headers, socket(), &config(TrustedProxyMode::Cloudflare, None));
        assert_eq!(ip, "203.0.113.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_cloudflare_mode_missing_header_falls_back() {
        let headers = HeaderMap::new();
        let ip = extract_client_ip(&headers, socket(), &config(TrustedProxyMode::Cloudflare, None));
        assert_eq!(ip, socket());
    }

    #[test]
    fn test_standard_takes_rightmost_without_trust_config() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1"),
        );
        let ip = extract_client_ip(&headers, socket(), &config(TrustedProxyMode::Standard, None));
        assert_eq!(ip, "198.51.100.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_standard_skips_trusted_proxy_hops() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1, 10.0.0.2"),
        );
        let ip = extract_client_ip(
            &headers,
            socket(),
            &config(TrustedProxyMode::Standard, Some(2)),
        );
        assert_eq!(ip, "203.0.113.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_standard_short_chain_uses_leftmost() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        let ip = extract_client_ip(
            &headers,
            socket(),
            &config(TrustedProxyMode::Standard, Some(3)),
        );
        assert_eq!(ip, "203.0.113.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_garbage_header_falls_back_to_socket() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        let ip = extract_client_ip(&headers, socket(), &config(TrustedProxyMode::Standard, None));
        assert_eq!(ip, socket());
    }
}
