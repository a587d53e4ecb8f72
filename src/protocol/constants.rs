//! Well-known protocol strings.

/// Content types.
pub mod media {
    /// `application/x-www-form-urlencoded`
    pub const FORM: &str = "application/x-www-form-urlencoded";
    /// JSON bodies created through [`crate::types::RequestBody::json`]
    pub const JSON_UTF8: &str = "application/json; charset=UTF-8";
}

/// Header names not covered by `http::header`.
pub mod headers {
    use http::HeaderName;

    /// `Proxy-Authorization`
    pub const PROXY_AUTHORIZATION: HeaderName = http::header::PROXY_AUTHORIZATION;
    /// `Proxy-Authenticate`
    pub const PROXY_AUTHENTICATE: HeaderName = http::header::PROXY_AUTHENTICATE;
    /// Set on responses served from the disk cache
    pub const CACHE_STATUS: HeaderName = HeaderName::from_static("x-cache-status");
}

/// Line markers exchanged between the wire log stage and transcript sinks.
pub mod markers {
    /// Prefix of outgoing request lines (`--> POST https://...`)
    pub const REQUEST_PREFIX: &str = "--> ";
    /// Prefix of incoming response lines
    pub const RESPONSE_PREFIX: &str = "<-- ";
    /// Final line of a completed exchange
    pub const END_OF_EXCHANGE: &str = "<-- END HTTP";
    /// Final line of an exchange that failed in transport
    pub const EXCHANGE_FAILED: &str = "<-- HTTP FAILED";
}

/// Size of the on-disk response cache of every built client (10 MiB).
pub const DISK_CACHE_BYTES: u64 = 10 * 1024 * 1024;

/// Subdirectory of the cache root holding response entries.
pub const CACHE_SUBDIR: &str = "profile_http";
