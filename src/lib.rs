#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # profile_http: profile-driven HTTP clients
//!
//! This crate builds one long-lived HTTP client from a declarative
//! [`ClientProfile`] and shares it across the process.
//!
//! ## Overview
//!
//! The crate is composed of four pieces:
//!
//! 1. **Registry** - [`ClientRegistry`] owns the built client, a standing default
//!    profile and an optional one-shot temporary profile, and rebuilds only when
//!    the selected profile differs from the one last built
//! 2. **Builder** - [`client::build_client`] turns a profile into a wired client:
//!    timeouts, disk cache, proxy route and lazy proxy credentials
//! 3. **Preload** - [`RequestPreloadStage`] merges default headers and form
//!    parameters into every request without discarding existing content
//! 4. **Transcript** - [`TranscriptLogger`] reassembles the protocol lines of one
//!    exchange into a single record, pretty-printing JSON bodies
//!
//! ## Request Flow
//!
//! ```text
//! caller -> RequestPreloadStage -> WireLogStage -> caller stages -> CacheStage
//!        -> caller transport stages -> ReqwestTransport -> network
//!                                   |
//!                     protocol lines -> TranscriptLogger -> tracing
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use profile_http::{ClientProfile, ClientRegistry, HttpClient};
//!
//! #[tokio::main]
//! async fn main() -> profile_http::Result<()> {
//!     let registry = ClientRegistry::global();
//!     registry.set_default_configuration(
//!         ClientProfile::new("https://api.example.com/").with_default_header("X-App", "demo"),
//!     );
//!
//!     let client: HttpClient = registry.create_service()?;
//!     let user: serde_json::Value = client.get_json("users/42").await?;
//!     println!("{}", user);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - **[config]** - Client profiles and proxy descriptors
//! - **[error]** - Error types and result handling
//! - **[types]** - Request, response and body types
//! - **[client]** - Registry, builder and client handle
//! - **[interceptor]** - Stage chain: preload, wire log, cache
//! - **[transcript]** - Per-exchange transcript reassembly
//! - **[cache]** - Size-bounded on-disk response cache
//! - **[envelope]** - `{code, msg, data}` response wrapper
//! - **[protocol]** - Header helpers and protocol constants

pub mod cache;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod interceptor;
pub mod protocol;
pub mod transcript;
pub mod types;

pub use client::{ClientRegistry, HttpClient, RegistryOptions, ServiceDescriptor};
pub use config::{ClientProfile, ProxyConfig, ProxyKind};
pub use envelope::ApiEnvelope;
pub use error::{ClientError, Result};
pub use interceptor::{Interceptor, Next, RequestPreloadStage};
pub use transcript::TranscriptLogger;
pub use types::{FormBody, HttpRequest, HttpResponse, RequestBody};
