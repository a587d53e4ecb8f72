//! Process-wide client registry.
//!
//! [`ClientRegistry`] owns one built client and decides when it must be rebuilt.
//! It holds a standing *default* profile and an optional one-shot *temporary*
//! profile:
//!
//! - In default mode the cached client is reused as long as it was built from
//!   the current default profile.
//! - A temporary profile is never cached: the next call always rebuilds with it
//!   and then switches back to default mode, so the following default-mode call
//!   rebuilds with the default profile again.
//!
//! Selection, rebuild and hand-out happen under one lock, so a caller always
//! receives a client built from the profile selected for its call.
//!
//! # Examples
//!
//! ```
//! use profile_http::{ClientProfile, ClientRegistry, HttpClient, RegistryOptions};
//!
//! let registry = ClientRegistry::new(RegistryOptions::without_disk_cache());
//! registry.set_default_configuration(ClientProfile::new("http://localhost:8080/"));
//!
//! let a: HttpClient = registry.create_service().unwrap();
//! let b: HttpClient = registry.create_service().unwrap();
//! assert!(a.ptr_eq(&b));
//! assert_eq!(registry.build_count(), 1);
//! ```

use super::builder::{build_client, BuildContext};
use super::fetch::HttpClient;
use crate::cache::ResponseCache;
use crate::config::ClientProfile;
use crate::error::{ClientError, Result};
use crate::interceptor::{Interceptor, LineSink, WireLogStage};
use crate::protocol::constants::{CACHE_SUBDIR, DISK_CACHE_BYTES};
use crate::transcript::TranscriptLogger;
use parking_lot::{Mutex, RwLock};
use reqwest::cookie::Jar;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// A typed service bound to a built client.
///
/// Implementors are thin wrappers exposing endpoint methods over an
/// [`HttpClient`]:
///
/// ```
/// use profile_http::{HttpClient, Result, ServiceDescriptor};
///
/// struct UserApi(HttpClient);
///
/// impl ServiceDescriptor for UserApi {
///     fn bind(client: HttpClient) -> Self {
///         UserApi(client)
///     }
/// }
///
/// impl UserApi {
///     async fn profile(&self, id: u64) -> Result<serde_json::Value> {
///         self.0.get_json(&format!("users/{}", id)).await
///     }
/// }
/// ```
pub trait ServiceDescriptor: Sized {
    /// Bind the service to `client`.
    fn bind(client: HttpClient) -> Self;
}

impl ServiceDescriptor for HttpClient {
    fn bind(client: HttpClient) -> Self {
        client
    }
}

/// Profile the next service creation uses.
#[derive(Debug, Clone, Default)]
pub enum ActiveProfile {
    /// The standing default profile
    #[default]
    Default,
    /// A one-shot override
    Temporary(Arc<ClientProfile>),
}

/// Which profile the current client was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuiltFrom {
    /// Default profile of the given generation
    Default(u64),
    Temporary,
}

/// Registry construction options.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Root directory for the response cache; `None` uses the platform cache dir
    pub cache_root: Option<PathBuf>,
    /// Whether built clients get a disk cache
    pub disk_cache: bool,
    /// Cache budget in bytes
    pub cache_bytes: u64,
}

impl RegistryOptions {
    /// Options with the disk cache disabled.
    pub fn without_disk_cache() -> Self {
        Self {
            disk_cache: false,
            ..Default::default()
        }
    }

    /// Options placing the cache under `root`.
    pub fn with_cache_root(root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: Some(root.into()),
            ..Default::default()
        }
    }

    fn cache_dir(&self) -> Option<PathBuf> {
        self.cache_root
            .clone()
            .or_else(dirs::cache_dir)
            .map(|root| root.join(CACHE_SUBDIR))
    }
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            cache_root: None,
            disk_cache: true,
            cache_bytes: DISK_CACHE_BYTES,
        }
    }
}

struct RegistryState {
    default: Option<(u64, Arc<ClientProfile>)>,
    generation: u64,
    active: ActiveProfile,
    built: Option<(BuiltFrom, HttpClient)>,
    cache: Option<Arc<ResponseCache>>,
    cache_resolved: bool,
    interceptors: Vec<Arc<dyn Interceptor>>,
    transport_interceptors: Vec<Arc<dyn Interceptor>>,
    extra_headers: BTreeMap<String, String>,
    extra_params: BTreeMap<String, String>,
    builds: u64,
}

type StaleCheck = dyn Fn(&ClientProfile) -> bool + Send + Sync;
type RefreshHook = dyn Fn(&ClientRegistry) + Send + Sync;

struct TokenRefresh {
    is_stale: Box<StaleCheck>,
    refresh: Box<RefreshHook>,
}

/// Owner of the shared client.
///
/// Construct once and share by reference (or use [`ClientRegistry::global`]);
/// all methods take `&self` and are safe to call from any thread.
pub struct ClientRegistry {
    state: Mutex<RegistryState>,
    wire_log: Arc<WireLogStage>,
    cookies: Arc<Jar>,
    token_refresh: RwLock<Option<Arc<TokenRefresh>>>,
    options: RegistryOptions,
}

impl ClientRegistry {
    /// Registry logging transcripts through `tracing`.
    pub fn new(options: RegistryOptions) -> Self {
        Self::with_line_sink(options, Arc::new(TranscriptLogger::new()))
    }

    /// Registry feeding protocol lines to `sink`.
    ///
    /// The sink is wrapped in one wire log stage shared by every build.
    pub fn with_line_sink(options: RegistryOptions, sink: Arc<dyn LineSink>) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                default: None,
                generation: 0,
                active: ActiveProfile::Default,
                built: None,
                cache: None,
                cache_resolved: false,
                interceptors: Vec::new(),
                transport_interceptors: Vec::new(),
                extra_headers: BTreeMap::new(),
                extra_params: BTreeMap::new(),
                builds: 0,
            }),
            wire_log: Arc::new(WireLogStage::new(sink)),
            cookies: Arc::new(Jar::default()),
            token_refresh: RwLock::new(None),
            options,
        }
    }

    /// Process-wide registry, created on first access.
    pub fn global() -> &'static ClientRegistry {
        static GLOBAL: OnceLock<ClientRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ClientRegistry::default)
    }

    /// Set the standing default profile.
    ///
    /// Also switches back to default mode, dropping a pending temporary profile.
    /// The next default-mode call rebuilds with the new profile; setting a
    /// profile equal to the current default keeps the cached client.
    pub fn set_default_configuration(&self, profile: ClientProfile) -> &Self {
        let mut state = self.state.lock();
        state.active = ActiveProfile::Default;
        if let Some((_, current)) = &state.default {
            if **current == profile {
                return self;
            }
        }
        state.generation += 1;
        state.default = Some((state.generation, Arc::new(profile)));
        self
    }

    /// Use `profile` for the next service creation only.
    pub fn set_temporary_configuration(&self, profile: ClientProfile) -> &Self {
        self.state.lock().active = ActiveProfile::Temporary(Arc::new(profile));
        self
    }

    /// Profile the next call will use.
    pub fn active_profile(&self) -> ActiveProfile {
        self.state.lock().active.clone()
    }

    /// Create a service bound to a client built from the selected profile.
    pub fn create_service<S: ServiceDescriptor>(&self) -> Result<S> {
        Ok(S::bind(self.client()?))
    }

    /// Install a token refresh hook.
    ///
    /// Before each service creation `is_stale` is asked about the profile the
    /// call will use; when it answers `true`, `refresh` runs first. The hook may
    /// call back into the registry, e.g. [`ClientRegistry::add_default_header`]
    /// with a new token.
    pub fn set_token_refresher<S, R>(&self, is_stale: S, refresh: R) -> &Self
    where
        S: Fn(&ClientProfile) -> bool + Send + Sync + 'static,
        R: Fn(&ClientRegistry) + Send + Sync + 'static,
    {
        *self.token_refresh.write() = Some(Arc::new(TokenRefresh {
            is_stale: Box::new(is_stale),
            refresh: Box::new(refresh),
        }));
        self
    }

    /// Remove the token refresh hook.
    pub fn clear_token_refresher(&self) -> &Self {
        *self.token_refresh.write() = None;
        self
    }

    fn refresh_token_if_stale(&self) {
        let Some(hook) = self.token_refresh.read().clone() else {
            return;
        };
        let selected = {
            let state = self.state.lock();
            match &state.active {
                ActiveProfile::Temporary(profile) => Some(profile.clone()),
                ActiveProfile::Default => state.default.as_ref().map(|(_, profile)| profile.clone()),
            }
        };
        if let Some(profile) = selected {
            if (hook.is_stale)(&profile) {
                debug!(base_url = %profile.base_url, "token stale, refreshing");
                (hook.refresh)(self);
            }
        }
    }

    /// Cookie jar shared by every client this registry builds.
    pub fn cookie_jar(&self) -> Arc<Jar> {
        self.cookies.clone()
    }

    /// Client for the selected profile, rebuilding when required.
    ///
    /// Runs the token refresh hook first, outside the registry lock.
    pub fn client(&self) -> Result<HttpClient> {
        self.refresh_token_if_stale();
        let mut state = self.state.lock();

        match std::mem::take(&mut state.active) {
            ActiveProfile::Temporary(profile) => self.rebuild(&mut state, profile, BuiltFrom::Temporary),
            ActiveProfile::Default => {
                let (generation, profile) = state.default.clone().ok_or_else(|| {
                    ClientError::Configuration(
                        "no profile set: call set_default_configuration or set_temporary_configuration first".into(),
                    )
                })?;

                if let Some((BuiltFrom::Default(built_gen), client)) = &state.built {
                    if *built_gen == generation {
                        return Ok(client.clone());
                    }
                }
                self.rebuild(&mut state, profile, BuiltFrom::Default(generation))
            }
        }
    }

    fn rebuild(&self, state: &mut RegistryState, profile: Arc<ClientProfile>, from: BuiltFrom) -> Result<HttpClient> {
        let ctx = BuildContext {
            wire_log: self.wire_log.clone(),
            cache: self.resolve_cache(state),
            cookies: self.cookies.clone(),
            interceptors: state.interceptors.clone(),
            transport_interceptors: state.transport_interceptors.clone(),
            extra_headers: state.extra_headers.clone(),
            extra_params: state.extra_params.clone(),
        };

        let client = build_client(profile, &ctx)?;
        state.builds += 1;
        debug!(build = state.builds, from = ?from, base_url = %client.base_url(), "client rebuilt");
        state.built = Some((from, client.clone()));
        Ok(client)
    }

    fn resolve_cache(&self, state: &mut RegistryState) -> Option<Arc<ResponseCache>> {
        if !self.options.disk_cache {
            return None;
        }
        if !state.cache_resolved {
            state.cache_resolved = true;
            state.cache = match self.options.cache_dir() {
                Some(dir) => match ResponseCache::open(&dir, self.options.cache_bytes) {
                    Ok(cache) => Some(Arc::new(cache)),
                    Err(e) => {
                        warn!("response cache disabled, cannot open {}: {}", dir.display(), e);
                        None
                    }
                },
                None => {
                    warn!("response cache disabled, no cache directory available");
                    None
                }
            };
        }
        state.cache.clone()
    }

    /// Add an application stage to the live client and to every later build.
    ///
    /// Handles issued before the call keep their previous chain.
    pub fn add_interceptor<I: Interceptor>(&self, stage: I) -> &Self {
        let stage: Arc<dyn Interceptor> = Arc::new(stage);
        let mut state = self.state.lock();
        state.interceptors.push(stage.clone());
        if let Some((from, client)) = state.built.take() {
            state.built = Some((from, client.with_interceptor(stage)));
        }
        self
    }

    /// Add a transport stage to the live client and to every later build.
    pub fn add_transport_interceptor<I: Interceptor>(&self, stage: I) -> &Self {
        let stage: Arc<dyn Interceptor> = Arc::new(stage);
        let mut state = self.state.lock();
        state.transport_interceptors.push(stage.clone());
        if let Some((from, client)) = state.built.take() {
            state.built = Some((from, client.with_transport_interceptor(stage)));
        }
        self
    }

    /// Add a default header on top of every profile's defaults.
    pub fn add_default_header(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        self.add_default_headers([(name.into(), value.into())])
    }

    /// Add several default headers on top of every profile's defaults.
    pub fn add_default_headers<I>(&self, headers: I) -> &Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut state = self.state.lock();
        let headers: Vec<_> = headers.into_iter().collect();
        state.extra_headers.extend(headers.iter().cloned());
        if let Some((_, client)) = &state.built {
            client.preload().add_headers(headers);
        }
        self
    }

    /// Add a default form parameter on top of every profile's defaults.
    pub fn add_default_param(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        self.add_default_params([(name.into(), value.into())])
    }

    /// Add several default form parameters on top of every profile's defaults.
    pub fn add_default_params<I>(&self, params: I) -> &Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut state = self.state.lock();
        let params: Vec<_> = params.into_iter().collect();
        state.extra_params.extend(params.iter().cloned());
        if let Some((_, client)) = &state.built {
            client.preload().add_params(params);
        }
        self
    }

    /// Client built last, without triggering a rebuild.
    pub fn current_client(&self) -> Option<HttpClient> {
        self.state.lock().built.as_ref().map(|(_, client)| client.clone())
    }

    /// Number of builds performed so far.
    pub fn build_count(&self) -> u64 {
        self.state.lock().builds
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new(RegistryOptions::default())
    }
}
