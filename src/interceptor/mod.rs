//! Request stage chain.
//!
//! Every built client runs each request through an explicit, ordered list of
//! stages before handing it to the transport:
//!
//! ```text
//! RequestPreloadStage -> WireLogStage -> caller stages -> CacheStage -> caller transport stages -> Transport
//! ```
//!
//! A stage receives the request by value together with a [`Next`] handle for the
//! remainder of the chain. It may rewrite the request, short-circuit with its own
//! response, or observe the response on the way back.
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Interceptor`] | One stage of the chain |
//! | [`Next`] | The remainder of the chain |
//! | [`Transport`] | Terminal stage performing the network call |
//! | [`RequestPreloadStage`] | Injects default headers and form parameters |
//! | [`WireLogStage`] | Emits protocol lines to a [`LineSink`] |
//! | [`CacheStage`] | Serves and stores GET responses from disk |
//!
//! # Examples
//!
//! ```
//! use async_trait::async_trait;
//! use profile_http::interceptor::{Interceptor, Next};
//! use profile_http::types::{HttpRequest, HttpResponse};
//! use profile_http::Result;
//!
//! struct UserAgent(&'static str);
//!
//! #[async_trait]
//! impl Interceptor for UserAgent {
//!     async fn intercept(&self, mut request: HttpRequest, next: Next<'_>) -> Result<HttpResponse> {
//!         request.set_header("User-Agent", self.0)?;
//!         next.run(request).await
//!     }
//! }
//! ```

mod cache;
mod preload;
mod wire_log;

pub use cache::CacheStage;
pub use preload::{PreloadDefaults, RequestPreloadStage, VerbPolicy};
pub use wire_log::{ExchangeId, LineSink, WireLogStage};

use crate::error::Result;
use crate::types::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::sync::Arc;

/// One stage of the request chain.
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    /// Handle `request`, usually by forwarding it through `next`.
    async fn intercept(&self, request: HttpRequest, next: Next<'_>) -> Result<HttpResponse>;
}

/// Terminal stage that puts a request on the wire.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send `request` and buffer the response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Remainder of a stage chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Interceptor>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    /// Chain over `stages` ending in `transport`.
    pub fn new(stages: &'a [Arc<dyn Interceptor>], transport: &'a dyn Transport) -> Self {
        Self { stages, transport }
    }

    /// Forward `request` to the next stage, or to the transport when none is left.
    pub async fn run(self, request: HttpRequest) -> Result<HttpResponse> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                stage
                    .intercept(
                        request,
                        Next {
                            stages: rest,
                            transport: self.transport,
                        },
                    )
                    .await
            }
            None => self.transport.send(request).await,
        }
    }

    /// Number of stages still ahead of the transport.
    pub fn remaining(&self) -> usize {
        self.stages.len()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingTransport;
    use super::*;
    use http::StatusCode;
    use parking_lot::Mutex;
    use url::Url;

    struct Tag(&'static str, Arc<Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl Interceptor for Tag {
        async fn intercept(&self, request: HttpRequest, next: Next<'_>) -> Result<HttpResponse> {
            self.1.lock().push(self.0);
            next.run(request).await
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_order_then_transport() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let stages: Vec<Arc<dyn Interceptor>> = vec![
            Arc::new(Tag("first", order.clone())),
            Arc::new(Tag("second", order.clone())),
        ];
        let transport = RecordingTransport::new(StatusCode::OK, "ok");

        let request = HttpRequest::get(Url::parse("http://localhost/").unwrap());
        let response = Next::new(&stages, &transport).run(request).await.unwrap();

        assert_eq!(response.text(), "ok");
        assert_eq!(*order.lock(), vec!["first", "second"]);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_goes_straight_to_transport() {
        let transport = RecordingTransport::new(StatusCode::NO_CONTENT, "");
        let next = Next::new(&[], &transport);
        assert_eq!(next.remaining(), 0);
        let response = next
            .run(HttpRequest::get(Url::parse("http://localhost/x").unwrap()))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::NO_CONTENT);
    }
}
