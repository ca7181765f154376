//! HTTP header names and header-map utilities.
//!
//! Centralizes the header names Decoy inspects and the three transformations
//! applied around a forwarded hop: copying, hop-by-hop stripping and
//! `X-Forwarded-For` chaining.
//!
//! `http::HeaderMap` stores names in lowercase and normalizes `&str` lookups,
//! so every operation here matches names regardless of the casing a client
//! used on the wire.

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};

/// X-Forwarded-For header - chain of client addresses seen by each proxy.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Authorization header.
pub const AUTHORIZATION: &str = "authorization";

/// WWW-Authenticate header.
pub const WWW_AUTHENTICATE: &str = "www-authenticate";

/// Content-Type header.
pub const CONTENT_TYPE: &str = "content-type";

/// Host header.
pub const HOST: &str = "host";

/// Connection header (hop-by-hop).
pub const CONNECTION: &str = "connection";

/// Keep-Alive header (hop-by-hop).
pub const KEEP_ALIVE: &str = "keep-alive";

/// Proxy-Authenticate header (hop-by-hop).
pub const PROXY_AUTHENTICATE: &str = "proxy-authenticate";

/// Proxy-Authorization header (hop-by-hop, and an authentication header).
pub const PROXY_AUTHORIZATION: &str = "proxy-authorization";

/// TE header (hop-by-hop).
pub const TE: &str = "te";

/// Trailers header (hop-by-hop).
pub const TRAILERS: &str = "trailers";

/// Transfer-Encoding header (hop-by-hop).
pub const TRANSFER_ENCODING: &str = "transfer-encoding";

/// Upgrade header (hop-by-hop).
pub const UPGRADE: &str = "upgrade";

/// Headers that never cross from one hop to the next, in either direction.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    CONNECTION,
    KEEP_ALIVE,
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    TE,
    TRAILERS,
    TRANSFER_ENCODING,
    UPGRADE,
];

/// Headers whose presence makes Decoy refuse the request.
pub const AUTHENTICATION_HEADERS: &[&str] = &[WWW_AUTHENTICATE, AUTHORIZATION, PROXY_AUTHORIZATION];

/// Check if a header is a hop-by-hop header that shouldn't be forwarded.
///
/// The comparison ignores ASCII case.
///
/// # Example
///
/// ```
/// use decoy_core::headers::is_hop_by_hop;
///
/// assert!(is_hop_by_hop("Connection"));
/// assert!(is_hop_by_hop("transfer-encoding"));
/// assert!(is_hop_by_hop("TE"));
/// assert!(!is_hop_by_hop("content-type"));
/// ```
pub fn is_hop_by_hop(header_name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|hop| hop.eq_ignore_ascii_case(header_name))
}

/// Appends every value of every header in `src` to `dst`.
///
/// Values already present in `dst` are kept; nothing is overwritten or
/// deduplicated, and per-name ordering of `src` is preserved.
pub fn copy_headers(dst: &mut HeaderMap, src: &HeaderMap) {
    for (name, value) in src.iter() {
        dst.append(name.clone(), value.clone());
    }
}

/// Removes every hop-by-hop header (all of its values) from `headers`.
///
/// Stripping an already stripped map is a no-op.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Computes the `X-Forwarded-For` value to send after adding `host`.
///
/// When the header is already present, all prior values are folded into one
/// comma+space separated list and `host` is appended at the end. Otherwise the
/// result is just `host`. Prior values are copied byte for byte, so obs-text
/// survives the round trip.
///
/// # Example
///
/// ```
/// use decoy_core::headers::{X_FORWARDED_FOR, chain_forwarded_for};
/// use http::HeaderMap;
///
/// let mut headers = HeaderMap::new();
/// assert_eq!(chain_forwarded_for(&headers, "5.6.7.8"), b"5.6.7.8");
///
/// headers.insert(X_FORWARDED_FOR, "1.2.3.4".parse().unwrap());
/// assert_eq!(chain_forwarded_for(&headers, "5.6.7.8"), b"1.2.3.4, 5.6.7.8");
/// ```
pub fn chain_forwarded_for(headers: &HeaderMap, host: &str) -> Vec<u8> {
    let mut chained = Vec::new();
    for value in headers.get_all(X_FORWARDED_FOR) {
        chained.extend_from_slice(value.as_bytes());
        chained.extend_from_slice(b", ");
    }
    chained.extend_from_slice(host.as_bytes());
    chained
}

/// Replaces `X-Forwarded-For` with the chained value for `host`.
///
/// Returns `false` (leaving the map untouched) when the chained value is not a
/// valid header value.
pub fn append_forwarded_for(headers: &mut HeaderMap, host: &str) -> bool {
    let chained = chain_forwarded_for(headers, host);
    match HeaderValue::from_bytes(&chained) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(X_FORWARDED_FOR), value);
            true
        }
        Err(_) => false,
    }
}

/// Returns `true` when any authentication header carries a non-empty value.
pub fn has_authentication(headers: &HeaderMap) -> bool {
    AUTHENTICATION_HEADERS.iter().any(|name| {
        headers
            .get_all(*name)
            .iter()
            .any(|value| !value.as_bytes().is_empty())
    })
}

/// Renders all headers on one line for the request log.
///
/// Each distinct name appears once, followed by its values joined with `,`:
/// `accept: */*; x-multi: a,b`.
pub fn flatten_headers(headers: &HeaderMap) -> String {
    headers
        .keys()
        .map(|name| {
            let values: Vec<String> = headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect();
            format!("{}: {}", name, values.join(","))
        })
        .collect::<Vec<_>>()
        .join("; ")
}
