//! Request-level helpers shared with the HTTP layer.

use chrono::{DateTime, Utc};
use http::HeaderMap;
use url::Url;

/// `ISO 8601` date with `Z` suffix, the wire format of every timestamp.
pub fn datetime_to_str(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

/// Reconstruct the outward URL of a request running behind a reverse proxy.
///
/// Only requests carrying `x-forwarded-prefix` are rewritten; for those, the
/// forwarded host, protocol and port replace the local ones and the prefix
/// is prepended to the path. Everything else passes through untouched.
pub fn proxy_aware_url(url: &Url, headers: &HeaderMap) -> Url {
    let prefix = match header_str(headers, "x-forwarded-prefix") {
        Some(prefix) => prefix.trim_end_matches('/').to_owned(),
        None => return url.clone(),
    };

    let mut rewritten = url.clone();
    if let Some(proto) = header_str(headers, "x-forwarded-proto") {
        let _ = rewritten.set_scheme(proto);
    }
    if let Some(host) = header_str(headers, "x-forwarded-host") {
        let _ = rewritten.set_host(Some(host));
    }
    if let Some(port) = header_str(headers, "x-forwarded-port") {
        if let Ok(port) = port.parse::<u16>() {
            let _ = rewritten.set_port(Some(port));
        }
    }
    rewritten.set_path(&format!("{prefix}{}", url.path()));
    rewritten
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok()).filter(|s| !s.is_empty())
}
