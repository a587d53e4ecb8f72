//! Stage backed by the on-disk [`ResponseCache`].
//!
//! Only `GET` responses are cached. Any other verb invalidates the `GET` entry
//! for the same URL. A fresh entry is served without touching the network; a
//! stale entry carrying `ETag` or `Last-Modified` is revalidated and a
//! `304 Not Modified` is answered from disk. Cache faults are logged and never
//! fail the request.

use super::{Interceptor, Next};
use crate::cache::{CachedResponse, ResponseCache};
use crate::error::Result;
use crate::protocol;
use crate::types::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use http::{header, HeaderValue, Method, StatusCode};
use std::sync::Arc;
use tracing::warn;

/// Stage serving and storing `GET` responses.
pub struct CacheStage {
    cache: Arc<ResponseCache>,
}

impl CacheStage {
    /// Stage over `cache`.
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        Self { cache }
    }

    async fn lookup(&self, key: &str) -> Option<CachedResponse> {
        match self.cache.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("cache lookup failed for {}: {}", key, e);
                None
            }
        }
    }

    async fn store(&self, entry: CachedResponse) {
        if let Err(e) = self.cache.put(&entry).await {
            warn!("cache store failed for {}: {}", entry.key, e);
        }
    }
}

fn add_conditional_headers(request: &mut HttpRequest, entry: &CachedResponse) {
    if !request.headers.contains_key(header::IF_NONE_MATCH) {
        if let Some(etag) = entry.header("etag").and_then(|v| HeaderValue::from_str(v).ok()) {
            request.headers.insert(header::IF_NONE_MATCH, etag);
        }
    }
    if !request.headers.contains_key(header::IF_MODIFIED_SINCE) {
        if let Some(date) = entry.header("last-modified").and_then(|v| HeaderValue::from_str(v).ok()) {
            request.headers.insert(header::IF_MODIFIED_SINCE, date);
        }
    }
}

#[async_trait]
impl Interceptor for CacheStage {
    async fn intercept(&self, mut request: HttpRequest, next: Next<'_>) -> Result<HttpResponse> {
        if request.method != Method::GET {
            let get_key = format!("{} {}", Method::GET, request.url);
            if let Err(e) = self.cache.remove(&get_key).await {
                warn!("cache invalidation failed for {}: {}", get_key, e);
            }
            return next.run(request).await;
        }

        let key = request.cache_key();
        let bypass = protocol::cache_directives(&request.headers).no_cache;
        let cached = if bypass { None } else { self.lookup(&key).await };

        if let Some(entry) = &cached {
            if entry.is_fresh() {
                match entry.to_response("HIT") {
                    Ok(response) => return Ok(response),
                    Err(e) => warn!("cached entry for {} unusable: {}", key, e),
                }
            }
            add_conditional_headers(&mut request, entry);
        }

        let response = next.run(request).await?;

        if response.status == StatusCode::NOT_MODIFIED {
            if let Some(entry) = cached {
                let entry = entry.revalidated();
                match entry.to_response("REVALIDATED") {
                    Ok(from_disk) => {
                        self.store(entry).await;
                        return Ok(from_disk);
                    }
                    Err(e) => warn!("cached entry for {} unusable: {}", key, e),
                }
            }
            return Ok(response);
        }

        if response.status == StatusCode::OK && !protocol::cache_directives(&response.headers).no_store {
            self.store(CachedResponse::capture(&key, &response)).await;
        }
        Ok(response)
    }
}
