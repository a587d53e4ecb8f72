//! Built client handle and network transport.
//!
//! [`HttpClient`] is what the builder produces and what service proxies hold:
//! an immutable, cheaply cloneable handle over one `reqwest::Client` and one
//! ordered stage list. Adding a stage yields a new handle; handles already given
//! out keep their own chain.
//!
//! # Examples
//!
//! ```ignore
//! use profile_http::{ClientProfile, ClientRegistry};
//!
//! #[tokio::main]
//! async fn main() -> profile_http::Result<()> {
//!     let registry = ClientRegistry::default();
//!     registry.set_default_configuration(ClientProfile::new("https://api.example.com/"));
//!
//!     let client = registry.client()?;
//!     let response = client.get("users/42").await?;
//!     println!("Status: {}", response.status);
//!     Ok(())
//! }
//! ```

use crate::config::{ClientProfile, ProxyConfig};
use crate::envelope::ApiEnvelope;
use crate::error::Result;
use crate::interceptor::{Interceptor, Next, RequestPreloadStage, Transport};
use crate::protocol::{self, constants::headers as names};
use crate::types::{FormBody, HttpRequest, HttpResponse, RequestBody};
use async_trait::async_trait;
use http::{header, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Transport over `reqwest` answering proxy challenges with basic credentials.
///
/// Credentials are only sent after a `407 Proxy Authentication Required`, and
/// only once per request: a second challenge is returned to the caller.
pub struct ReqwestTransport {
    client: reqwest::Client,
    proxy: ProxyConfig,
}

impl ReqwestTransport {
    /// Transport over `client` using the credentials of `proxy`.
    pub fn new(client: reqwest::Client, proxy: ProxyConfig) -> Self {
        Self { client, proxy }
    }

    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut headers = request.headers.clone();
        let mut builder = self.client.request(request.method.clone(), request.url.clone());
        if let Some(body) = &request.body {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(body.content_type())?);
            builder = builder.body(body.to_bytes());
        }

        let response = builder.headers(headers).send().await?;

        let status = response.status();
        let url = response.url().clone();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            url,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.execute(&request).await?;

        let challenged = response.status == StatusCode::PROXY_AUTHENTICATION_REQUIRED;
        if !challenged || !self.proxy.has_credentials() || request.headers.contains_key(names::PROXY_AUTHORIZATION) {
            return Ok(response);
        }

        tracing::debug!(
            "proxy challenge ({}), retrying with credentials",
            protocol::header_str(&response.headers, &names::PROXY_AUTHENTICATE).unwrap_or("no scheme")
        );
        let mut retry = request;
        let credential = protocol::basic_credentials(&self.proxy.username, &self.proxy.password);
        retry
            .headers
            .insert(names::PROXY_AUTHORIZATION, HeaderValue::from_str(&credential)?);
        self.execute(&retry).await
    }
}

struct ClientInner {
    id: u64,
    profile: Arc<ClientProfile>,
    base_url: Url,
    preload: Arc<RequestPreloadStage>,
    application: Vec<Arc<dyn Interceptor>>,
    network: Vec<Arc<dyn Interceptor>>,
    chain: Vec<Arc<dyn Interceptor>>,
    transport: Arc<dyn Transport>,
}

/// Handle to one built client.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

impl HttpClient {
    /// Assemble a handle.
    ///
    /// `application` stages run before `network` stages; `preload` must be one
    /// of the application stages so runtime defaults can be added to it.
    pub(crate) fn assemble(
        profile: Arc<ClientProfile>,
        base_url: Url,
        preload: Arc<RequestPreloadStage>,
        application: Vec<Arc<dyn Interceptor>>,
        network: Vec<Arc<dyn Interceptor>>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let chain = application.iter().chain(network.iter()).cloned().collect();
        HttpClient {
            inner: Arc::new(ClientInner {
                id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
                profile,
                base_url,
                preload,
                application,
                network,
                chain,
                transport,
            }),
        }
    }

    /// New handle with `stage` appended to the application stages.
    pub fn with_interceptor(&self, stage: Arc<dyn Interceptor>) -> Self {
        let mut application = self.inner.application.clone();
        application.push(stage);
        self.rebuilt(application, self.inner.network.clone())
    }

    /// New handle with `stage` appended to the transport stages.
    pub fn with_transport_interceptor(&self, stage: Arc<dyn Interceptor>) -> Self {
        let mut network = self.inner.network.clone();
        network.push(stage);
        self.rebuilt(self.inner.application.clone(), network)
    }

    fn rebuilt(&self, application: Vec<Arc<dyn Interceptor>>, network: Vec<Arc<dyn Interceptor>>) -> Self {
        Self::assemble(
            self.inner.profile.clone(),
            self.inner.base_url.clone(),
            self.inner.preload.clone(),
            application,
            network,
            self.inner.transport.clone(),
        )
    }

    /// Unique id of this handle.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Whether two handles are the same built client.
    pub fn ptr_eq(&self, other: &HttpClient) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Profile the client was built from.
    pub fn profile(&self) -> &ClientProfile {
        &self.inner.profile
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Preload stage of this client.
    pub fn preload(&self) -> &RequestPreloadStage {
        &self.inner.preload
    }

    /// Total number of stages in front of the transport.
    pub fn stage_count(&self) -> usize {
        self.inner.chain.len()
    }

    /// Resolve `path` against the base URL.
    pub fn url(&self, path: &str) -> Result<Url> {
        Ok(self.inner.base_url.join(path)?)
    }

    /// Run `request` through the stage chain and the transport.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        Next::new(&self.inner.chain, self.inner.transport.as_ref())
            .run(request)
            .await
    }

    /// `GET path`
    pub async fn get(&self, path: &str) -> Result<HttpResponse> {
        self.execute(HttpRequest::get(self.url(path)?)).await
    }

    /// `POST path` with a form body.
    pub async fn post_form(&self, path: &str, form: FormBody) -> Result<HttpResponse> {
        self.execute(HttpRequest::post(self.url(path)?).with_body(RequestBody::Form(form)))
            .await
    }

    /// `POST path` with `value` serialized as JSON.
    pub async fn post_json<B: Serialize>(&self, path: &str, value: &B) -> Result<HttpResponse> {
        self.execute(HttpRequest::post(self.url(path)?).with_body(RequestBody::json_value(value)?))
            .await
    }

    /// Execute `request` and decode a 2xx body as JSON.
    pub async fn fetch_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        self.execute(request).await?.error_for_status()?.json()
    }

    /// `GET path` and decode a 2xx body as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.fetch_json(HttpRequest::get(self.url(path)?)).await
    }

    /// Execute `request`, decode an [`ApiEnvelope`] and unwrap its data.
    pub async fn fetch_envelope<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<Option<T>> {
        self.fetch_json::<ApiEnvelope<T>>(request).await?.into_data()
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("id", &self.inner.id)
            .field("base_url", &self.inner.base_url.as_str())
            .field("stages", &self.inner.chain.len())
            .finish()
    }
}
