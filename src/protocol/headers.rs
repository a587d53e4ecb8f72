//! Header parsing and formatting.
//!
//! | Header | Helper | Example |
//! |--------|--------|---------|
//! | Content-Type | [`is_form_content_type`] | `application/x-www-form-urlencoded; charset=UTF-8` |
//! | Cache-Control | [`parse_cache_control`] | `public, max-age=60` |
//! | Proxy-Authorization | [`basic_credentials`] | `Basic dXNlcjpwYXNz` |
//!
//! # Examples
//!
//! ```
//! use profile_http::protocol::{basic_credentials, is_form_content_type, parse_cache_control};
//!
//! assert!(is_form_content_type("application/x-www-form-urlencoded"));
//! assert_eq!(basic_credentials("user", "pass"), "Basic dXNlcjpwYXNz");
//!
//! let directives = parse_cache_control("no-cache, max-age=30");
//! assert_eq!(directives.max_age, Some(30));
//! assert!(directives.no_cache);
//! ```

use super::constants::media;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::HeaderMap;

/// Directives of a `Cache-Control` header relevant to the disk cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheDirectives {
    /// `max-age` in seconds
    pub max_age: Option<u64>,
    /// `no-store`
    pub no_store: bool,
    /// `no-cache`
    pub no_cache: bool,
}

/// Whether a content type denotes an url-encoded form body.
///
/// Parameters such as `charset` are ignored and the comparison is case-insensitive.
pub fn is_form_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(media::FORM))
        .unwrap_or(false)
}

/// Parse a `Cache-Control` header value.
///
/// Unknown directives are skipped; a malformed `max-age` is treated as absent.
pub fn parse_cache_control(value: &str) -> CacheDirectives {
    let mut directives = CacheDirectives::default();

    for part in value.split(',') {
        let part = part.trim();
        let (name, arg) = match part.split_once('=') {
            Some((name, arg)) => (name.trim(), Some(arg.trim().trim_matches('"'))),
            None => (part, None),
        };

        if name.eq_ignore_ascii_case("max-age") {
            directives.max_age = arg.and_then(|a| a.parse().ok());
        } else if name.eq_ignore_ascii_case("no-store") {
            directives.no_store = true;
        } else if name.eq_ignore_ascii_case("no-cache") {
            directives.no_cache = true;
        }
    }

    directives
}

/// Cache directives of a header map (`Cache-Control` may appear several times).
pub fn cache_directives(headers: &HeaderMap) -> CacheDirectives {
    let joined = headers
        .get_all(http::header::CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(",");
    parse_cache_control(&joined)
}

/// Format a `Basic` credential for `Authorization`/`Proxy-Authorization`.
pub fn basic_credentials(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

/// First value of a header as a string, if present and valid UTF-8.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &http::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_content_type_with_charset() {
        assert!(is_form_content_type("application/x-www-form-urlencoded; charset=UTF-8"));
        assert!(is_form_content_type("Application/X-WWW-Form-Urlencoded"));
    }

    #[test]
    fn test_non_form_content_types() {
        assert!(!is_form_content_type("application/json"));
        assert!(!is_form_content_type("multipart/form-data; boundary=abc"));
        assert!(!is_form_content_type(""));
    }

    #[test]
    fn test_parse_cache_control_max_age() {
        let d = parse_cache_control("public, max-age=60");
        assert_eq!(d.max_age, Some(60));
        assert!(!d.no_store);
    }

    #[test]
    fn test_parse_cache_control_no_store() {
        let d = parse_cache_control("no-store");
        assert!(d.no_store);
        assert_eq!(d.max_age, None);
    }

    #[test]
    fn test_parse_cache_control_invalid_max_age() {
        assert_eq!(parse_cache_control("max-age=soon").max_age, None);
    }

    #[test]
    fn test_cache_directives_joins_repeated_headers() {
        let mut headers = HeaderMap::new();
        headers.append(http::header::CACHE_CONTROL, "private".parse().unwrap());
        headers.append(http::header::CACHE_CONTROL, "max-age=5".parse().unwrap());
        assert_eq!(cache_directives(&headers).max_age, Some(5));
    }

    #[test]
    fn test_basic_credentials() {
        assert_eq!(basic_credentials("Aladdin", "open sesame"), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }
}
