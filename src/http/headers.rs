//! Allow-list header filtering.
//!
//! # Responsibilities
//! - Drop every header not on a fixed allow-list
//! - Collapse multi-valued headers into one `", "`-joined value
//!
//! # Design Decisions
//! - Same filter for client → target and target → client traffic, so
//!   cookies, authorization and AWS-internal headers never cross the proxy
//! - Signing headers are added after filtering and are not subject to it
//! - The allow-list is an immutable process-wide constant

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

/// Header names allowed through the proxy, in either direction.
pub static HEADER_ALLOWLIST: [HeaderName; 9] = [
    header::CACHE_CONTROL,
    header::CONTENT_LANGUAGE,
    header::CONTENT_LENGTH,
    header::CONTENT_TYPE,
    header::EXPIRES,
    header::LAST_MODIFIED,
    header::PRAGMA,
    header::ACCEPT,
    header::ACCEPT_LANGUAGE,
];

/// True if `name` is on the allow-list. `HeaderName` is already lowercase.
pub fn is_allowed(name: &HeaderName) -> bool {
    HEADER_ALLOWLIST.contains(name)
}

/// Keep only allow-listed headers, joining repeated values with `", "`.
pub fn filter_headers(input: &HeaderMap) -> HeaderMap {
    let mut output = HeaderMap::new();

    for name in input.keys().filter(|name| is_allowed(name)) {
        let mut values = input.get_all(name).iter();
        let Some(first) = values.next() else {
            continue;
        };

        let mut joined = first.as_bytes().to_vec();
        for value in values {
            joined.extend_from_slice(b", ");
            joined.extend_from_slice(value.as_bytes());
        }

        // joining valid values with ", " keeps the value valid
        if let Ok(value) = HeaderValue::from_bytes(&joined) {
            output.insert(name.clone(), value);
        }
    }

    output
}
