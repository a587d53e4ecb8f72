//! Client construction and the process-wide registry.
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── builder  - profile -> wired client
//! ├── fetch    - HttpClient handle and the reqwest transport
//! └── registry - ClientRegistry, default/temporary profile selection
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ClientRegistry`] | Owns the shared client and rebuilds it on profile changes |
//! | [`HttpClient`] | Immutable handle over one built client |
//! | [`ServiceDescriptor`] | Typed service bound to a built client |
//! | [`BuildContext`] | Stages, cache and extras shared across builds |
//! | [`ReqwestTransport`] | Network transport answering proxy challenges |
//!
//! # Examples
//!
//! ## One-shot override
//!
//! ```
//! use profile_http::{ClientProfile, ClientRegistry, HttpClient, RegistryOptions};
//!
//! let registry = ClientRegistry::new(RegistryOptions::without_disk_cache());
//! registry.set_default_configuration(ClientProfile::new("https://api.example.com/"));
//!
//! registry.set_temporary_configuration(ClientProfile::new("https://upload.example.com/"));
//! let upload: HttpClient = registry.create_service().unwrap();
//! assert_eq!(upload.base_url().host_str(), Some("upload.example.com"));
//!
//! // Back to the default profile.
//! let api: HttpClient = registry.create_service().unwrap();
//! assert_eq!(api.base_url().host_str(), Some("api.example.com"));
//! ```

mod builder;
mod fetch;
mod registry;

pub use builder::{build_client, BuildContext};
pub use fetch::{HttpClient, ReqwestTransport};
pub use registry::{ActiveProfile, ClientRegistry, RegistryOptions, ServiceDescriptor};
