use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::binding::RequestBinding;
use super::cache::{CacheStore, MemoryCache};
use super::config::{ProviderConfig, RequestOptions, resolve};
use super::service::Service;
use crate::subscription::lifecycle::{AppStatus, Signals};
use crate::subscription::{Handle, Subscription};

/// Shared context for every binding in an app.
///
/// Owns the provider configuration, the injected cache store and the
/// lifecycle signals. Cloning is cheap; clones share all three.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use serde_json::json;
/// use tears_request::request::{ProviderConfig, RequestOptions, RequestProvider, Service};
///
/// let provider = RequestProvider::new(ProviderConfig::new().success_key("data"));
/// let users = Service::new("users.list", |_| async { Ok(json!({"data": []})) });
/// let binding = provider.bind(users, RequestOptions::new().debounce(Duration::ZERO));
/// assert_eq!(binding.name(), "users.list");
/// ```
#[derive(Clone)]
pub struct RequestProvider {
    config: Arc<ProviderConfig>,
    cache: Arc<dyn CacheStore>,
    signals: Signals,
}

impl Default for RequestProvider {
    fn default() -> Self {
        Self::new(ProviderConfig::default())
    }
}

impl RequestProvider {
    /// Creates a provider backed by a fresh [`MemoryCache`].
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_cache(config, Arc::new(MemoryCache::new()))
    }

    #[must_use]
    pub fn with_cache(config: ProviderConfig, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            config: Arc::new(config),
            cache,
            signals: Signals::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Creates a binding for `service`.
    ///
    /// The service's declared method applies unless `options` sets one. The
    /// binding starts from the provider's current connectivity and app status.
    #[must_use]
    pub fn bind(&self, service: Service, mut options: RequestOptions) -> RequestBinding {
        if options.method.is_none() {
            options.method = service.declared_method();
        }
        let config = resolve(&options, &self.config);
        tracing::trace!(
            service = %service.name(),
            method = %config.method,
            cached = config.cached,
            "binding created"
        );

        RequestBinding::with_lifecycle(
            service,
            config,
            self.cache.clone(),
            self.signals.is_online(),
            self.signals.app_status(),
        )
    }

    /// Creates a binding that follows the provider's lifecycle signals.
    ///
    /// The returned handle stops the watcher; unmounting the binding stops it too.
    #[must_use]
    pub fn mount(&self, service: Service, options: RequestOptions) -> (RequestBinding, Handle) {
        let binding = self.bind(service, options);
        let handle = binding.watch_lifecycle(Subscription::new(self.signals()));
        (binding, handle)
    }

    /// Records a connectivity reading. Returns `true` on a transition.
    pub fn set_online(&self, online: bool) -> bool {
        self.signals.set_online(online)
    }

    /// Records an app-status reading. Returns `true` on a transition.
    pub fn set_app_status(&self, status: AppStatus) -> bool {
        self.signals.set_app_status(status)
    }

    /// The lifecycle signals, usable as a subscription source.
    #[must_use]
    pub fn signals(&self) -> Signals {
        self.signals.clone()
    }

    #[must_use]
    pub fn cache(&self) -> Arc<dyn CacheStore> {
        self.cache.clone()
    }

    #[must_use]
    pub fn get_cache(&self, key: &str) -> Option<Value> {
        self.cache.get(key)
    }

    /// Stores `value` under `key`, for the provider ttl unless `ttl` is given.
    pub fn put_cache(&self, key: &str, value: Value, ttl: Option<Duration>) {
        self.cache.put(key, value, ttl.unwrap_or(self.config.ttl));
    }

    pub fn remove_cache(&self, key: &str) {
        self.cache.remove(key);
    }

    pub fn reset_cache(&self) {
        tracing::debug!("cache reset");
        self.cache.clear();
    }
}

impl fmt::Debug for RequestProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestProvider")
            .field("config", &self.config)
            .field("signals", &self.signals)
            .finish_non_exhaustive()
    }
}
