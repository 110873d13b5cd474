//! Client address and browser fingerprint extraction.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderMap, header::USER_AGENT, request::Parts};
use sha2::{Digest, Sha256};

/// Proxy headers consulted for the client address, in order.
const ADDRESS_HEADERS: [&str; 4] = [
    "X-Forwarded-For",
    "Proxy-Client-IP",
    "WL-Proxy-Client-IP",
    "X-Real-IP",
];

/// Address used when nothing better is known.
pub const UNKNOWN_ADDRESS: &str = "0.0.0.0";

/// Hex characters kept from the fingerprint digest.
const FINGERPRINT_LEN: usize = 32;

/// Where a request came from, as far as the session layer cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub address: String,
    pub user_agent: String,
    /// Browser fingerprint derived from user agent and address.
    pub fingerprint: String,
}

impl ClientInfo {
    /// Resolve client info from request headers and the socket peer.
    pub fn from_headers(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let address = client_address(headers, peer);
        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("Unknown")
            .to_string();
        let fingerprint = fingerprint(&user_agent, &address);
        Self {
            address,
            user_agent,
            fingerprint,
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self::from_headers(&parts.headers, peer))
    }
}

fn usable(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty() && !value.eq_ignore_ascii_case("unknown")).then_some(value)
}

fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    for name in ADDRESS_HEADERS {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        // X-Forwarded-For is a chain; the first hop is the client.
        let first = value.split(',').next().unwrap_or_default();
        if let Some(address) = usable(first) {
            return address.to_string();
        }
    }
    peer.map(|p| p.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string())
}

fn fingerprint(user_agent: &str, address: &str) -> String {
    let digest = Sha256::digest(format!("{user_agent}|{address}").as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(FINGERPRINT_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, value.parse().unwrap());
        }
        map
    }

    #[test]
    fn test_forwarded_for_first_hop_wins() {
        let h = headers(&[
            ("x-forwarded-for", "198.51.100.7, 10.0.0.1"),
            ("x-real-ip", "10.0.0.2"),
        ]);
        assert_eq!(client_address(&h, None), "198.51.100.7");
    }

    #[test]
    fn test_unknown_values_are_skipped() {
        let h = headers(&[
            ("x-forwarded-for", "unknown"),
            ("proxy-client-ip", ""),
            ("wl-proxy-client-ip", "203.0.113.4"),
        ]);
        assert_eq!(client_address(&h, None), "203.0.113.4");
    }

    #[test]
    fn test_falls_back_to_peer_then_default() {
        let peer: SocketAddr = "192.0.2.10:51234".parse().unwrap();
        assert_eq!(client_address(&HeaderMap::new(), Some(peer)), "192.0.2.10");
        assert_eq!(client_address(&HeaderMap::new(), None), UNKNOWN_ADDRESS);
    }

    #[test]
    fn test_fingerprint() {
        let info = ClientInfo::from_headers(&headers(&[("x-real-ip", "10.0.0.1")]), None);
        assert_eq!(info.user_agent, "Unknown");
        assert_eq!(info.fingerprint.len(), FINGERPRINT_LEN);
        assert_eq!(info.fingerprint, fingerprint("Unknown", "10.0.0.1"));

        let other = ClientInfo::from_headers(
            &headers(&[("x-real-ip", "10.0.0.1"), ("user-agent", "curl/8.0")]),
            None,
        );
        assert_ne!(info.fingerprint, other.fingerprint);
    }

    #[test]
    fn test_fingerprint_is_sha256_prefix() {
        // sha256("Unknown|0.0.0.0")
        let full = format!("{:x}", Sha256::digest(b"Unknown|0.0.0.0"));
        assert_eq!(fingerprint("Unknown", "0.0.0.0"), full[..32]);
    }
}
