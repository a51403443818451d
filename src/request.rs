//! Request bindings and their collaborators.
//!
//! A [`RequestProvider`] holds the shared configuration, cache and lifecycle
//! signals. [`RequestProvider::bind`] turns a named [`Service`] into a
//! [`RequestBinding`], the controller that tracks one logical request.

pub mod binding;
pub mod cache;
pub mod config;
pub mod error;
pub mod form;
pub mod hooks;
pub mod method;
pub mod mock;
pub mod provider;
pub mod service;
pub mod state;
#[cfg(feature = "http")]
pub mod transport;

pub use binding::{RequestBinding, RunResult};
pub use cache::{CacheEntry, CacheStore, MemoryCache, cache_key};
pub use config::{EffectiveConfig, ProviderConfig, RequestOptions, resolve};
pub use error::{FieldErrors, RequestError};
pub use form::{FormAdapter, FormErrors, FormHelpers};
pub use hooks::{HookChain, Hooks, RequestInfo};
pub use method::HttpMethod;
pub use provider::RequestProvider;
pub use service::{ProgressSink, Service};
pub use state::{RequestState, Status};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
