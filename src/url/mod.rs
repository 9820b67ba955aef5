//! URL helpers shared by parsers and configuration validation

use crate::{UrlError, UrlResult};
use url::Url;

/// Parses an absolute HTTP(S) URL
///
/// # Errors
///
/// * `UrlError::Parse` - The string is not a valid absolute URL
/// * `UrlError::InvalidScheme` - The scheme is neither `http` nor `https`
/// * `UrlError::MissingHost` - The URL has no host
pub fn parse_http_url(input: &str) -> UrlResult<Url> {
    let url = Url::parse(input.trim()).map_err(|e| UrlError::Parse(format!("{input}: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::InvalidScheme(other.to_string())),
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

/// Returns `scheme://host[:port]` of a URL
///
/// # Examples
///
/// ```
/// use pagetrail::url::base_url;
///
/// assert_eq!(
///     base_url("https://somewebsite.org/page1/page2").unwrap(),
///     "https://somewebsite.org"
/// );
/// ```
pub fn base_url(input: &str) -> UrlResult<String> {
    let url = parse_http_url(input)?;
    // origin() drops default ports and keeps explicit ones
    Ok(url.origin().ascii_serialization())
}

/// Compares two URLs, ignoring leading and trailing slashes
pub fn same_page(a: &str, b: &str) -> bool {
    a.trim().trim_matches('/') == b.trim().trim_matches('/')
}
