//! Protocol line emission.
//!
//! [`WireLogStage`] renders each exchange as a sequence of text lines and hands
//! them to a [`LineSink`], tagged with a per-exchange [`ExchangeId`]:
//!
//! ```text
//! --> POST http://host/path
//! content-type: application/x-www-form-urlencoded
//! content-length: 7
//!
//! a=1&b=2
//! --> END POST (7-byte body)
//! <-- 200 OK http://host/path (12ms)
//! content-type: application/json
//!
//! {"ok":true}
//! <-- END HTTP (11-byte body)
//! ```
//!
//! A transport failure ends the exchange with `<-- HTTP FAILED: <error>`; an
//! exchange whose future is dropped mid-flight ends with `<-- HTTP FAILED: cancelled`.
//! Lines of one exchange are emitted in wire order from the task that drives it.

use super::{Interceptor, Next};
use crate::error::Result;
use crate::protocol::constants::markers;
use crate::types::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Correlation token tying buffered lines to one in-flight exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId(Uuid);

impl ExchangeId {
    /// Fresh random id.
    pub fn new() -> Self {
        ExchangeId(Uuid::new_v4())
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Receiver of protocol lines.
pub trait LineSink: Send + Sync + 'static {
    /// Accept one line of `exchange`.
    fn log(&self, exchange: ExchangeId, line: &str);
}

/// Stage emitting request and response lines, headers and bodies.
pub struct WireLogStage {
    sink: Arc<dyn LineSink>,
    redacted: Vec<HeaderName>,
}

impl WireLogStage {
    /// Stage writing to `sink`.
    pub fn new(sink: Arc<dyn LineSink>) -> Self {
        Self {
            sink,
            redacted: Vec::new(),
        }
    }

    /// Print `██` instead of the value of `name`.
    pub fn redact_header(mut self, name: HeaderName) -> Self {
        self.redacted.push(name);
        self
    }

    fn log_headers(&self, id: ExchangeId, headers: &HeaderMap) {
        for (name, value) in headers {
            let value = if self.redacted.contains(name) {
                "██"
            } else {
                value.to_str().unwrap_or("<non-ascii>")
            };
            self.sink.log(id, &format!("{}: {}", name, value));
        }
    }

    fn log_body(&self, id: ExchangeId, body: &Bytes) -> bool {
        if body.is_empty() {
            return true;
        }
        match std::str::from_utf8(body) {
            Ok(text) => {
                self.sink.log(id, "");
                self.sink.log(id, text);
                true
            }
            Err(_) => false,
        }
    }
}

/// Ends an exchange whose future is dropped before the response arrives.
struct PendingExchange {
    sink: Arc<dyn LineSink>,
    id: ExchangeId,
    open: bool,
}

impl PendingExchange {
    fn open(sink: Arc<dyn LineSink>, id: ExchangeId) -> Self {
        Self { sink, id, open: true }
    }

    fn close(mut self) {
        self.open = false;
    }
}

impl Drop for PendingExchange {
    fn drop(&mut self) {
        if self.open {
            self.sink.log(self.id, &format!("{}: cancelled", markers::EXCHANGE_FAILED));
        }
    }
}

#[async_trait]
impl Interceptor for WireLogStage {
    async fn intercept(&self, request: HttpRequest, next: Next<'_>) -> Result<HttpResponse> {
        let id = ExchangeId::new();
        let method = request.method.clone();

        self.sink.log(id, &format!("{}{} {}", markers::REQUEST_PREFIX, method, request.url));
        match &request.body {
            Some(body) => {
                let bytes = body.to_bytes();
                self.sink.log(id, &format!("content-type: {}", body.content_type()));
                self.sink.log(id, &format!("content-length: {}", bytes.len()));
                self.log_headers(id, &request.headers);
                if self.log_body(id, &bytes) {
                    self.sink.log(id, &format!("--> END {} ({}-byte body)", method, bytes.len()));
                } else {
                    self.sink.log(id, &format!("--> END {} (binary {}-byte body omitted)", method, bytes.len()));
                }
            }
            None => {
                self.log_headers(id, &request.headers);
                self.sink.log(id, &format!("--> END {}", method));
            }
        }

        let started = Instant::now();
        let pending = PendingExchange::open(self.sink.clone(), id);
        let outcome = next.run(request).await;
        pending.close();
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                self.sink.log(id, &format!("{}: {}", markers::EXCHANGE_FAILED, e));
                return Err(e);
            }
        };
        let elapsed = started.elapsed().as_millis();

        self.sink.log(
            id,
            &format!(
                "{}{} {} {} ({}ms)",
                markers::RESPONSE_PREFIX,
                response.status.as_u16(),
                response.status.canonical_reason().unwrap_or(""),
                response.url,
                elapsed
            ),
        );
        self.log_headers(id, &response.headers);
        if self.log_body(id, &response.body) {
            self.sink.log(id, &format!("{} ({}-byte body)", markers::END_OF_EXCHANGE, response.body.len()));
        } else {
            self.sink.log(
                id,
                &format!("{} (binary {}-byte body omitted)", markers::END_OF_EXCHANGE, response.body.len()),
            );
        }

        Ok(response)
    }
}
