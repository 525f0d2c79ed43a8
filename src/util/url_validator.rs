use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors returned when a user-supplied feed URL is rejected.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    #[error("Localhost not allowed")]
    Localhost,
    #[error("URL has no host")]
    MissingHost,
}

/// Validates a URL submitted as a new feed source.
///
/// Rejects non-HTTP(S) schemes, localhost and private/link-local addresses so
/// the backend can't be pointed at internal services. Sources coming from the
/// deployment configuration are trusted and skip this check.
///
/// ```
/// use newsdesk::util::validate_feed_url;
///
/// assert!(validate_feed_url("https://www.example.com/rss").is_ok());
/// assert!(validate_feed_url("http://127.0.0.1/rss").is_err());
/// assert!(validate_feed_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlValidationError::UnsupportedScheme(url.scheme().to_owned()));
    }

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;
    if host.eq_ignore_ascii_case("localhost") {
        return Err(UrlValidationError::Localhost);
    }

    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if let Ok(ip) = bare.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_unspecified() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

/// Derives a display name for a feed source from its URL host.
///
/// A leading `www.` label is dropped: `https://www.haberler.com/rss` becomes
/// `haberler.com`. Returns `None` when the URL doesn't parse or has no host.
pub fn source_name_from_url(url_str: &str) -> Option<String> {
    let url = Url::parse(url_str.trim()).ok()?;
    let host = url.host_str()?;
    let name = host.strip_prefix("www.").unwrap_or(host);
    Some(name.to_string())
}
