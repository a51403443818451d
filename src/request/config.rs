use std::time::Duration;

use super::hooks::{HookChain, Hooks};
use super::method::HttpMethod;

/// Provider-wide configuration shared by every binding.
///
/// This is the lowest configuration layer above the built-in defaults.
/// Call-site [`RequestOptions`] override it field by field.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Fallback hooks used when the call site does not supply one.
    pub defaults: Hooks,

    /// Hooks fired for every request, after the primary hook.
    pub every: Hooks,

    /// Envelope field unwrapped from successful responses.
    pub success_key: Option<String>,

    /// How long a cached response stays readable.
    pub ttl: Duration,

    /// Delay before re-attempting when a response signals `retry`.
    pub retry_delay: Duration,

    /// Upper bound on consecutive signalled retries.
    pub max_retries: u32,

    /// Quiet period collapsing rapid triggers into one attempt.
    pub debounce: Duration,

    /// Whether responses are cached at all.
    pub cached: bool,

    /// Methods whose responses may be cached.
    pub cache_methods: Vec<HttpMethod>,

    /// Emits phase traces at `debug` level instead of `trace`.
    pub debug: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            defaults: Hooks::default(),
            every: Hooks::default(),
            success_key: None,
            ttl: Duration::from_secs(10 * 60),    // 10 minutes
            retry_delay: Duration::from_secs(10), // 10 seconds
            max_retries: 3,
            debounce: Duration::from_millis(300),
            cached: false,
            cache_methods: vec![HttpMethod::Get],
            debug: false,
        }
    }
}

impl ProviderConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn defaults(mut self, hooks: Hooks) -> Self {
        self.defaults = hooks;
        self
    }

    #[must_use]
    pub fn every(mut self, hooks: Hooks) -> Self {
        self.every = hooks;
        self
    }

    #[must_use]
    pub fn success_key(mut self, key: impl Into<String>) -> Self {
        self.success_key = Some(key.into());
        self
    }

    #[must_use]
    pub const fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub const fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub const fn cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    #[must_use]
    pub fn cache_methods(mut self, methods: impl IntoIterator<Item = HttpMethod>) -> Self {
        self.cache_methods = methods.into_iter().collect();
        self
    }

    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Call-site options for one binding. Every `None` falls back to the provider.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub hooks: Hooks,
    pub method: Option<HttpMethod>,
    pub cached: Option<bool>,
    pub debug: Option<bool>,
    pub success_key: Option<String>,
    pub ttl: Option<Duration>,
    pub retry_delay: Option<Duration>,
    pub max_retries: Option<u32>,
    pub debounce: Option<Duration>,
    pub cache_methods: Option<Vec<HttpMethod>>,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub const fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub const fn cached(mut self, cached: bool) -> Self {
        self.cached = Some(cached);
        self
    }

    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    #[must_use]
    pub fn success_key(mut self, key: impl Into<String>) -> Self {
        self.success_key = Some(key.into());
        self
    }

    #[must_use]
    pub const fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    #[must_use]
    pub const fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    #[must_use]
    pub fn cache_methods(mut self, methods: impl IntoIterator<Item = HttpMethod>) -> Self {
        self.cache_methods = Some(methods.into_iter().collect());
        self
    }
}

/// The immutable configuration one binding runs with.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub hooks: HookChain,
    pub method: HttpMethod,
    /// Caching requested and the method is in the cacheable set.
    pub cached: bool,
    pub debug: bool,
    pub success_key: Option<String>,
    pub ttl: Duration,
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub debounce: Duration,
    /// The call site registered its own `on_error`, which suppresses
    /// field-level error mapping in form submissions.
    pub custom_on_error: bool,
}

/// Merges call-site options over provider configuration.
///
/// Hooks resolve call site, then provider `defaults`; the provider `every`
/// set is kept separately and fires in addition. Scalars resolve call site,
/// then provider. Caching is effective only when the resolved method is in
/// the resolved cacheable-method set.
#[must_use]
pub fn resolve(options: &RequestOptions, provider: &ProviderConfig) -> EffectiveConfig {
    let method = options.method.unwrap_or_default();
    let cache_methods = options
        .cache_methods
        .as_deref()
        .unwrap_or(&provider.cache_methods);
    let cached = options.cached.unwrap_or(provider.cached) && cache_methods.contains(&method);

    EffectiveConfig {
        hooks: HookChain {
            primary: options.hooks.or(&provider.defaults),
            every: provider.every.clone(),
        },
        method,
        cached,
        debug: options.debug.unwrap_or(provider.debug),
        success_key: options
            .success_key
            .clone()
            .or_else(|| provider.success_key.clone()),
        ttl: options.ttl.unwrap_or(provider.ttl),
        retry_delay: options.retry_delay.unwrap_or(provider.retry_delay),
        max_retries: options.max_retries.unwrap_or(provider.max_retries),
        debounce: options.debounce.unwrap_or(provider.debounce),
        custom_on_error: options.hooks.on_error.is_some(),
    }
}
