/// URL validation and filename sanitization for client input.
use std::net::IpAddr;

use url::{Host, Url};

use crate::errors::ValidationError;

/// Substrings that may not appear anywhere in a URL's host.
const BLOCKED_HOST_FRAGMENTS: &[&str] = &[
    "localhost", "127.0.0.1", "0.0.0.0", "::1", "internal", "private", "admin",
];

/// Characters that are never legitimate in a submitted URL.
const SUSPICIOUS_CHARS: &[char] = &['<', '>', '"', '\'', '\\'];

/// Characters replaced with `_` in file names.
const FILENAME_RESERVED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const MAX_FILENAME_CHARS: usize = 200;

/// Validate a client-supplied URL.
///
/// Accepts absolute `http`/`https` URLs whose host is a public-looking domain
/// or a routable IP literal.
pub fn validate_url(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw).map_err(|_| ValidationError::InvalidFormat)?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ValidationError::InvalidFormat);
    }

    let host = url.host().ok_or(ValidationError::InvalidFormat)?;
    if let Host::Domain(domain) = &host {
        if !looks_like_domain(domain) {
            return Err(ValidationError::InvalidFormat);
        }
    }

    let netloc = match url.port() {
        Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
        None => url.host_str().unwrap_or_default().to_string(),
    }
    .to_lowercase();
    if BLOCKED_HOST_FRAGMENTS.iter().any(|b| netloc.contains(b)) {
        return Err(ValidationError::BlockedDomain);
    }

    let ip = match host {
        Host::Ipv4(v4) => Some(IpAddr::V4(v4)),
        Host::Ipv6(v6) => Some(IpAddr::V6(v6)),
        Host::Domain(_) => None,
    };
    if let Some(ip) = ip {
        if !is_public_ip(&ip) {
            return Err(ValidationError::BlockedDomain);
        }
    }

    if raw.contains(SUSPICIOUS_CHARS) {
        return Err(ValidationError::InvalidCharacters);
    }

    Ok(url)
}

/// Make a string safe to use as a single path component.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if FILENAME_RESERVED.contains(&c) { '_' } else { c })
        .collect();
    replaced
        .trim_matches(|c| c == '.' || c == ' ')
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect()
}

fn looks_like_domain(domain: &str) -> bool {
    let labels: Vec<&str> = domain.trim_end_matches('.').split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let label_ok = |l: &&str| {
        !l.is_empty()
            && l.len() <= 63
            && !l.starts_with('-')
            && !l.ends_with('-')
            && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    };
    let tld = labels[labels.len() - 1];
    labels.iter().all(label_ok) && tld.len() >= 2 && !tld.chars().all(|c| c.is_ascii_digit())
}

fn is_public_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation())
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80)
        }
    }
}
