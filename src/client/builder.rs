//! Turning a profile into a wired client.
//!
//! [`build_client`] is a pure function of the profile and a [`BuildContext`]
//! holding the pieces that outlive individual builds: the shared wire log
//! stage, the disk cache, the cookie jar and caller-added stages.
//!
//! The resulting chain is:
//!
//! ```text
//! preload -> wire log -> caller stages -> cache -> caller transport stages -> reqwest
//! ```

use super::fetch::{HttpClient, ReqwestTransport};
use crate::cache::ResponseCache;
use crate::config::ClientProfile;
use crate::error::{ClientError, Result};
use crate::interceptor::{CacheStage, Interceptor, PreloadDefaults, RequestPreloadStage, VerbPolicy, WireLogStage};
use reqwest::cookie::Jar;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// State shared across builds.
#[derive(Clone)]
pub struct BuildContext {
    /// Wire log stage installed in every build
    pub wire_log: Arc<WireLogStage>,
    /// Disk cache, when one could be opened
    pub cache: Option<Arc<ResponseCache>>,
    /// Cookies stored from responses and replayed on later requests
    pub cookies: Arc<Jar>,
    /// Caller stages run after the wire log stage
    pub interceptors: Vec<Arc<dyn Interceptor>>,
    /// Caller stages run after the cache, right before the network
    pub transport_interceptors: Vec<Arc<dyn Interceptor>>,
    /// Headers layered over the profile's default headers
    pub extra_headers: BTreeMap<String, String>,
    /// Parameters layered over the profile's default parameters
    pub extra_params: BTreeMap<String, String>,
}

impl BuildContext {
    /// Context with only the wire log stage.
    pub fn new(wire_log: Arc<WireLogStage>) -> Self {
        Self {
            wire_log,
            cache: None,
            cookies: Arc::new(Jar::default()),
            interceptors: Vec::new(),
            transport_interceptors: Vec::new(),
            extra_headers: BTreeMap::new(),
            extra_params: BTreeMap::new(),
        }
    }
}

fn preload_stage(profile: &ClientProfile, ctx: &BuildContext) -> RequestPreloadStage {
    let mut defaults = PreloadDefaults {
        headers: profile.default_headers.clone(),
        params: profile.default_params.clone(),
    };
    defaults.headers.extend(ctx.extra_headers.clone());
    defaults.params.extend(ctx.extra_params.clone());

    let policy = if profile.keep_request_method {
        VerbPolicy::KeepOriginal
    } else {
        VerbPolicy::ForcePost
    };
    RequestPreloadStage::with_defaults(defaults).verb_policy(policy)
}

fn reqwest_client(profile: &ClientProfile, cookies: Arc<Jar>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .cookie_provider(cookies)
        .connect_timeout(profile.connect_timeout())
        .read_timeout(profile.read_timeout())
        .timeout(profile.request_deadline())
        .pool_idle_timeout(Duration::from_secs(90));

    if let Some(proxy_url) = profile.proxy.proxy_url() {
        let proxy = reqwest::Proxy::all(&proxy_url)
            .map_err(|e| ClientError::Configuration(format!("invalid proxy {}: {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ClientError::Configuration(format!("client build failed: {}", e)))
}

/// Build a client for `profile`.
pub fn build_client(profile: Arc<ClientProfile>, ctx: &BuildContext) -> Result<HttpClient> {
    profile.validate()?;
    let base_url = profile.parsed_base_url()?;

    let preload = Arc::new(preload_stage(&profile, ctx));

    let mut application: Vec<Arc<dyn Interceptor>> = vec![preload.clone(), ctx.wire_log.clone()];
    application.extend(ctx.interceptors.iter().cloned());

    let mut network: Vec<Arc<dyn Interceptor>> = Vec::new();
    if let Some(cache) = &ctx.cache {
        network.push(Arc::new(CacheStage::new(cache.clone())));
    }
    network.extend(ctx.transport_interceptors.iter().cloned());

    let transport = Arc::new(ReqwestTransport::new(reqwest_client(&profile, ctx.cookies.clone())?, profile.proxy.clone()));

    tracing::debug!(
        base_url = %base_url,
        proxy = ?profile.proxy.kind,
        stages = application.len() + network.len(),
        "client built"
    );

    Ok(HttpClient::assemble(profile, base_url, preload, application, network, transport))
}
