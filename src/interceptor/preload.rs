//! Default header and form parameter injection.
//!
//! [`RequestPreloadStage`] rewrites every outgoing request:
//!
//! 1. Every default header is set, replacing a same-named header already on the
//!    request. Default keys are applied in map order, so when two keys name the
//!    same header (e.g. `X-Id` and `x-id`) the later one wins.
//! 2. When the request has no body or an url-encoded form body, every default
//!    parameter is appended after the existing pairs, already encoded. A raw
//!    url-encoded payload keeps its exact bytes and declared content type. Any
//!    other body passes through untouched.
//! 3. A rebuilt form is attached by re-issuing the request as `POST`, unless the
//!    stage was configured with [`VerbPolicy::KeepOriginal`].
//!
//! # Examples
//!
//! ```
//! use profile_http::interceptor::RequestPreloadStage;
//!
//! let stage = RequestPreloadStage::new();
//! stage.add_header("X-Client", "cli").add_param("lang", "en");
//! assert_eq!(stage.defaults().params["lang"], "en");
//! ```

use super::{Interceptor, Next};
use crate::error::Result;
use crate::types::{FormBody, HttpRequest, HttpResponse, RequestBody};
use async_trait::async_trait;
use http::Method;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Verb used when a rebuilt form body is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerbPolicy {
    /// Always re-issue as `POST`
    #[default]
    ForcePost,
    /// Keep the request's own verb
    KeepOriginal,
}

/// Headers and parameters injected by the stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadDefaults {
    /// Default headers
    pub headers: BTreeMap<String, String>,
    /// Default form parameters (already encoded)
    pub params: BTreeMap<String, String>,
}

/// Stage merging default headers and form parameters into every request.
#[derive(Debug, Default)]
pub struct RequestPreloadStage {
    defaults: RwLock<PreloadDefaults>,
    verb_policy: VerbPolicy,
}

impl RequestPreloadStage {
    /// Empty stage with [`VerbPolicy::ForcePost`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage seeded with `defaults`.
    pub fn with_defaults(defaults: PreloadDefaults) -> Self {
        Self {
            defaults: RwLock::new(defaults),
            verb_policy: VerbPolicy::default(),
        }
    }

    /// Change the verb policy.
    pub fn verb_policy(mut self, policy: VerbPolicy) -> Self {
        self.verb_policy = policy;
        self
    }

    /// Add a default header.
    pub fn add_header(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        self.defaults.write().headers.insert(name.into(), value.into());
        self
    }

    /// Add several default headers.
    pub fn add_headers<I, K, V>(&self, headers: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut defaults = self.defaults.write();
        for (k, v) in headers {
            defaults.headers.insert(k.into(), v.into());
        }
        self
    }

    /// Add a default form parameter.
    pub fn add_param(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        self.defaults.write().params.insert(name.into(), value.into());
        self
    }

    /// Add several default form parameters.
    pub fn add_params<I, K, V>(&self, params: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut defaults = self.defaults.write();
        for (k, v) in params {
            defaults.params.insert(k.into(), v.into());
        }
        self
    }

    /// Snapshot of the current defaults.
    pub fn defaults(&self) -> PreloadDefaults {
        self.defaults.read().clone()
    }

    /// Apply the defaults to `request`.
    pub fn preload(&self, mut request: HttpRequest) -> Result<HttpRequest> {
        let defaults = self.defaults();

        for (name, value) in &defaults.headers {
            request.set_header(name, value)?;
        }

        let merge_form = request.body.as_ref().map_or(true, RequestBody::is_form);
        if merge_form {
            let body = request.body.take().unwrap_or_else(|| RequestBody::Form(FormBody::new()));
            let params = defaults.params.iter().map(|(name, value)| (name.as_str(), value.as_str()));
            request.body = Some(body.append_encoded(params));
            if self.verb_policy == VerbPolicy::ForcePost {
                request.method = Method::POST;
            }
        }

        Ok(request)
    }
}

#[async_trait]
impl Interceptor for RequestPreloadStage {
    async fn intercept(&self, request: HttpRequest, next: Next<'_>) -> Result<HttpResponse> {
        let request = self.preload(request)?;
        next.run(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::testing::RecordingTransport;
    use bytes::Bytes;
    use http::StatusCode;
    use std::sync::Arc;
    use url::Url;

    fn url() -> Url {
        Url::parse("http://localhost/api").unwrap()
    }

    #[test]
    fn test_form_pairs_then_defaults_in_order() {
        let stage = RequestPreloadStage::new();
        stage.add_param("k2", "v2");

        let mut form = FormBody::new();
        form.add_encoded("k1", "v1");
        let request = HttpRequest::post(url()).with_body(RequestBody::Form(form));

        let out = stage.preload(request).unwrap();
        let body = out.body.unwrap();
        let pairs: Vec<_> = body.as_form().unwrap().encoded_pairs().collect();
        assert_eq!(pairs, vec![("k1", "v1"), ("k2", "v2")]);
    }

    #[test]
    fn test_existing_pairs_are_not_reencoded() {
        let stage = RequestPreloadStage::new();
        stage.add_param("sig", "a%2Bb");
        let request = HttpRequest::post(url()).with_body(RequestBody::raw(
            "application/x-www-form-urlencoded",
            "q=hello%20world",
        ));

        let out = stage.preload(request).unwrap();
        assert_eq!(out.body.unwrap().to_bytes(), Bytes::from_static(b"q=hello%20world&sig=a%2Bb"));
    }

    #[test]
    fn test_raw_form_payload_and_charset_kept() {
        let stage = RequestPreloadStage::new();
        stage.add_param("k", "v");
        let content_type = "application/x-www-form-urlencoded; charset=UTF-8";
        let request = HttpRequest::post(url()).with_body(RequestBody::raw(content_type, "a=1&&flag&b=2"));

        let body = stage.preload(request).unwrap().body.unwrap();
        assert_eq!(body.content_type(), content_type);
        assert_eq!(body.to_bytes(), Bytes::from_static(b"a=1&&flag&b=2&k=v"));
    }

    #[test]
    fn test_json_body_untouched_headers_applied() {
        let stage = RequestPreloadStage::new();
        stage.add_header("X-App", "demo").add_param("lang", "en");
        let body = RequestBody::json(r#"{"a":1}"#);
        let request = HttpRequest::new(Method::PUT, url()).with_body(body.clone());

        let out = stage.preload(request).unwrap();
        assert_eq!(out.method, Method::PUT);
        assert_eq!(out.headers["x-app"], "demo");
        let out_body = out.body.unwrap();
        assert_eq!(out_body, body);
        assert_eq!(out_body.content_type(), body.content_type());
    }

    #[test]
    fn test_bodyless_request_gets_form_and_post() {
        let stage = RequestPreloadStage::new();
        stage.add_param("token", "t");
        let out = stage.preload(HttpRequest::get(url())).unwrap();
        assert_eq!(out.method, Method::POST);
        assert_eq!(out.body.unwrap().to_bytes(), Bytes::from_static(b"token=t"));
    }

    #[test]
    fn test_keep_original_verb() {
        let stage = RequestPreloadStage::new().verb_policy(VerbPolicy::KeepOriginal);
        stage.add_param("token", "t");
        let out = stage.preload(HttpRequest::get(url())).unwrap();
        assert_eq!(out.method, Method::GET);
    }

    #[test]
    fn test_default_header_shadows_existing() {
        let stage = RequestPreloadStage::new();
        stage.add_header("Authorization", "Bearer default");
        let request = HttpRequest::get(url()).with_header("authorization", "Bearer mine").unwrap();
        let out = stage.preload(request).unwrap();
        assert_eq!(out.headers.get_all("authorization").iter().count(), 1);
        assert_eq!(out.headers["authorization"], "Bearer default");
    }

    #[test]
    fn test_duplicate_default_keys_last_writer_wins() {
        let stage = RequestPreloadStage::new();
        stage.add_header("X-Id", "upper").add_header("x-id", "lower");
        let out = stage.preload(HttpRequest::get(url())).unwrap();
        assert_eq!(out.headers["x-id"], "lower");

        stage.add_param("k", "1").add_param("k", "2");
        assert_eq!(stage.defaults().params["k"], "2");
    }

    #[test]
    fn test_preload_is_idempotent_on_headers() {
        let stage = RequestPreloadStage::new();
        stage.add_header("X-App", "demo");
        let once = stage.preload(HttpRequest::get(url())).unwrap();
        let twice = stage.preload(once.clone()).unwrap();
        assert_eq!(once.headers, twice.headers);
    }

    #[tokio::test]
    async fn test_forwards_and_returns_response_unmodified() {
        let stage: Arc<dyn Interceptor> = Arc::new(RequestPreloadStage::new());
        let transport = RecordingTransport::new(StatusCode::CREATED, "done");
        let response = Next::new(std::slice::from_ref(&stage), &transport)
            .run(HttpRequest::get(url()))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.text(), "done");
        assert_eq!(transport.last().method, Method::POST);
    }
}
