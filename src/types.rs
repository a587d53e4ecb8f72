//! Request and response values flowing through the stage chain.
//!
//! Requests are plain owned values so stages can rewrite them freely: a stage
//! receives an [`HttpRequest`], may rebuild it, and hands it to the next stage.
//! Responses are fully buffered.
//!
//! # Examples
//!
//! ```
//! use profile_http::types::{FormBody, HttpRequest, RequestBody};
//! use url::Url;
//!
//! let mut form = FormBody::new();
//! form.add("q", "rust lang");
//! form.add_encoded("page", "2");
//! assert_eq!(form.to_string(), "q=rust+lang&page=2");
//!
//! let request = HttpRequest::post(Url::parse("http://localhost/search").unwrap())
//!     .with_body(RequestBody::Form(form));
//! assert!(request.body.as_ref().unwrap().is_form());
//! ```

use crate::error::{ClientError, Result};
use crate::protocol::{self, constants::media};
use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use url::Url;

/// Url-encoded form body.
///
/// Pairs are stored already encoded, in insertion order. Pairs added through
/// [`FormBody::add_encoded`] are kept verbatim and never re-encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody {
    pairs: Vec<(String, String)>,
}

impl FormBody {
    /// Create an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode and append a pair.
    pub fn add(&mut self, name: &str, value: &str) -> &mut Self {
        let name = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
        let value = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
        self.pairs.push((name, value));
        self
    }

    /// Append an already-encoded pair.
    pub fn add_encoded(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.pairs.push((name.into(), value.into()));
        self
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the form has no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Encoded name of pair `index`.
    pub fn encoded_name(&self, index: usize) -> Option<&str> {
        self.pairs.get(index).map(|(n, _)| n.as_str())
    }

    /// Encoded value of pair `index`.
    pub fn encoded_value(&self, index: usize) -> Option<&str> {
        self.pairs.get(index).map(|(_, v)| v.as_str())
    }

    /// Iterate encoded pairs in order.
    pub fn encoded_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Wire payload.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.to_string())
    }
}

impl fmt::Display for FormBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Url-encoded form
    Form(FormBody),
    /// JSON text sent as `application/json; charset=UTF-8`
    Json(String),
    /// Any other payload with its own content type
    Raw {
        /// Declared content type
        content_type: String,
        /// Payload
        bytes: Bytes,
    },
}

impl RequestBody {
    /// JSON body from already-serialized text.
    pub fn json(content: impl Into<String>) -> Self {
        RequestBody::Json(content.into())
    }

    /// JSON body serialized from a value.
    pub fn json_value<T: serde::Serialize>(value: &T) -> Result<Self> {
        Ok(RequestBody::Json(serde_json::to_string(value)?))
    }

    /// Raw body with an explicit content type.
    pub fn raw(content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        RequestBody::Raw {
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Content type sent on the wire.
    pub fn content_type(&self) -> &str {
        match self {
            RequestBody::Form(_) => media::FORM,
            RequestBody::Json(_) => media::JSON_UTF8,
            RequestBody::Raw { content_type, .. } => content_type,
        }
    }

    /// Whether the body is url-encoded, either structurally or by declared type.
    pub fn is_form(&self) -> bool {
        match self {
            RequestBody::Form(_) => true,
            RequestBody::Raw { content_type, .. } => protocol::is_form_content_type(content_type),
            RequestBody::Json(_) => false,
        }
    }

    /// The structured form, if the body is one.
    pub fn as_form(&self) -> Option<&FormBody> {
        match self {
            RequestBody::Form(form) => Some(form),
            _ => None,
        }
    }

    /// Append already-encoded pairs to a form body.
    ///
    /// A structured form gains new pairs. A raw url-encoded payload keeps its
    /// bytes and declared content type and gets `&name=value` appended. Any
    /// other body is returned unchanged.
    pub fn append_encoded<'a, I>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        match self {
            RequestBody::Form(mut form) => {
                for (name, value) in pairs {
                    form.add_encoded(name, value);
                }
                RequestBody::Form(form)
            }
            RequestBody::Raw { content_type, bytes } if protocol::is_form_content_type(&content_type) => {
                let mut payload = BytesMut::from(&bytes[..]);
                for (name, value) in pairs {
                    if !payload.is_empty() {
                        payload.put_u8(b'&');
                    }
                    payload.put_slice(name.as_bytes());
                    payload.put_u8(b'=');
                    payload.put_slice(value.as_bytes());
                }
                RequestBody::Raw {
                    content_type,
                    bytes: payload.freeze(),
                }
            }
            other => other,
        }
    }

    /// Wire payload.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            RequestBody::Form(form) => form.to_bytes(),
            RequestBody::Json(text) => Bytes::from(text.clone()),
            RequestBody::Raw { bytes, .. } => bytes.clone(),
        }
    }
}

/// Outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Verb
    pub method: Method,
    /// Absolute target URL
    pub url: Url,
    /// Headers (body content type is derived from [`RequestBody`])
    pub headers: HeaderMap,
    /// Optional body
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    /// Create a body-less request.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// `GET url`
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// `POST url`
    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    /// Attach a body.
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a header, replacing any existing values of the same name.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Builder form of [`HttpRequest::set_header`].
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        self.set_header(name, value)?;
        Ok(self)
    }

    /// Key identifying the resource for caching purposes.
    pub fn cache_key(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

/// Buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: StatusCode,
    /// Final URL
    pub url: Url,
    /// Response headers
    pub headers: HeaderMap,
    /// Complete body
    pub body: Bytes,
}

impl HttpResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as text (lossy UTF-8).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Fail with [`ClientError::Http`] unless the status is 2xx.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::Http(format!("{} returned {}", self.url, self.status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_add_encodes_but_add_encoded_does_not() {
        let mut form = FormBody::new();
        form.add("a b", "c&d");
        form.add_encoded("e%20f", "g+h");
        assert_eq!(form.encoded_name(0), Some("a+b"));
        assert_eq!(form.encoded_value(0), Some("c%26d"));
        assert_eq!(form.encoded_name(1), Some("e%20f"));
        assert_eq!(form.encoded_value(1), Some("g+h"));
        assert_eq!(form.len(), 2);
    }

    #[test]
    fn test_raw_form_appends_without_rewriting() {
        let body = RequestBody::raw("application/x-www-form-urlencoded; charset=UTF-8", "a=1&&flag&b=%FF");
        assert!(body.is_form());
        assert!(body.as_form().is_none());

        let out = body.append_encoded([("k", "v%201")]);
        assert_eq!(out.content_type(), "application/x-www-form-urlencoded; charset=UTF-8");
        assert_eq!(out.to_bytes().as_ref(), b"a=1&&flag&b=%FF&k=v%201");
    }

    #[test]
    fn test_raw_form_keeps_non_utf8_bytes() {
        let body = RequestBody::raw("application/x-www-form-urlencoded", vec![b'a', b'=', 0xff]);
        let out = body.append_encoded([("k", "v")]);
        assert_eq!(out.to_bytes().as_ref(), &[b'a', b'=', 0xff, b'&', b'k', b'=', b'v'][..]);
    }

    #[test]
    fn test_empty_raw_form_gets_no_leading_separator() {
        let body = RequestBody::raw("application/x-www-form-urlencoded", Bytes::new());
        assert_eq!(body.append_encoded([("k", "v")]).to_bytes().as_ref(), b"k=v");
    }

    #[test]
    fn test_json_body_content_type() {
        let body = RequestBody::json("{}");
        assert!(!body.is_form());
        assert!(body.as_form().is_none());
        assert_eq!(body.content_type(), "application/json; charset=UTF-8");
    }

    #[test]
    fn test_set_header_replaces() {
        let mut request = HttpRequest::get(Url::parse("http://localhost/").unwrap());
        request.set_header("X-Token", "a").unwrap();
        request.set_header("x-token", "b").unwrap();
        assert_eq!(request.headers.get_all("x-token").iter().count(), 1);
        assert_eq!(request.headers["x-token"], "b");
    }

    #[test]
    fn test_invalid_header_name() {
        let mut request = HttpRequest::get(Url::parse("http://localhost/").unwrap());
        assert!(matches!(request.set_header("bad header", "x"), Err(ClientError::Header(_))));
    }

    #[test]
    fn test_response_json() {
        let response = HttpResponse {
            status: StatusCode::OK,
            url: Url::parse("http://localhost/").unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"{\"a\":1}"),
        };
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["a"], 1);
    }
}
