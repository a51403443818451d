//! Hook sets fired by a binding at each phase of an attempt.
//!
//! Hooks come from three layers: the call site, the provider `defaults` and
//! the provider `every` set. The first two resolve into one primary hook per
//! concern; the `every` hook always fires afterwards as an additional
//! observer. See [`resolve`](super::config::resolve).

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::binding::RequestBinding;
use super::error::RequestError;
use super::method::HttpMethod;
use crate::subscription::lifecycle::AppStatus;

/// Identifies the attempt a hook is fired for.
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    /// Params of the attempt (or the last executed params for lifecycle hooks).
    pub params: Option<&'a Value>,
    /// Registered service name.
    pub name: &'a str,
    pub method: HttpMethod,
}

pub type OnSuccess = Arc<dyn Fn(&Value, &RequestInfo<'_>) + Send + Sync>;
pub type OnError = Arc<dyn Fn(&RequestError, &RequestInfo<'_>) + Send + Sync>;
pub type OnFetch = Arc<dyn Fn(&RequestInfo<'_>) + Send + Sync>;
pub type OnProgress = Arc<dyn Fn(u8, &RequestInfo<'_>) + Send + Sync>;
/// Fired on connectivity transitions with the binding so the hook can replay it.
pub type OnConnectivity = Arc<dyn Fn(&RequestBinding, &RequestInfo<'_>) + Send + Sync>;
pub type OnAppStatusChange = Arc<dyn Fn(AppStatus, &RequestBinding, &RequestInfo<'_>) + Send + Sync>;
/// Replaces the built-in delayed re-attempt when a response asks for a retry.
pub type OnRetry = Arc<dyn Fn(&RequestBinding, &RequestInfo<'_>) + Send + Sync>;

/// One optional hook per concern.
#[derive(Clone, Default)]
pub struct Hooks {
    pub on_success: Option<OnSuccess>,
    pub on_error: Option<OnError>,
    pub on_fetch: Option<OnFetch>,
    pub on_progress: Option<OnProgress>,
    pub on_online: Option<OnConnectivity>,
    pub on_offline: Option<OnConnectivity>,
    pub on_app_status_change: Option<OnAppStatusChange>,
    pub on_retry: Option<OnRetry>,
}

impl Hooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value, &RequestInfo<'_>) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestError, &RequestInfo<'_>) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_fetch<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestInfo<'_>) + Send + Sync + 'static,
    {
        self.on_fetch = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_progress<F>(mut self, hook: F) -> Self
    where
        F: Fn(u8, &RequestInfo<'_>) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_online<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestBinding, &RequestInfo<'_>) + Send + Sync + 'static,
    {
        self.on_online = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_offline<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestBinding, &RequestInfo<'_>) + Send + Sync + 'static,
    {
        self.on_offline = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_app_status_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(AppStatus, &RequestBinding, &RequestInfo<'_>) + Send + Sync + 'static,
    {
        self.on_app_status_change = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestBinding, &RequestInfo<'_>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// Takes each hook from `self`, falling back to `fallback` per concern.
    #[must_use]
    pub fn or(&self, fallback: &Self) -> Self {
        Self {
            on_success: self.on_success.clone().or_else(|| fallback.on_success.clone()),
            on_error: self.on_error.clone().or_else(|| fallback.on_error.clone()),
            on_fetch: self.on_fetch.clone().or_else(|| fallback.on_fetch.clone()),
            on_progress: self.on_progress.clone().or_else(|| fallback.on_progress.clone()),
            on_online: self.on_online.clone().or_else(|| fallback.on_online.clone()),
            on_offline: self.on_offline.clone().or_else(|| fallback.on_offline.clone()),
            on_app_status_change: self
                .on_app_status_change
                .clone()
                .or_else(|| fallback.on_app_status_change.clone()),
            on_retry: self.on_retry.clone().or_else(|| fallback.on_retry.clone()),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_fetch", &self.on_fetch.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_online", &self.on_online.is_some())
            .field("on_offline", &self.on_offline.is_some())
            .field("on_app_status_change", &self.on_app_status_change.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

/// Primary hooks plus the provider's `every` set, fired in that order.
#[derive(Clone, Default, Debug)]
pub struct HookChain {
    pub primary: Hooks,
    pub every: Hooks,
}

fn chain<'a, T>(primary: &'a Option<T>, every: &'a Option<T>) -> impl Iterator<Item = &'a T> {
    primary.iter().chain(every.iter())
}

impl HookChain {
    pub(crate) fn success(&self, data: &Value, info: &RequestInfo<'_>) {
        for hook in chain(&self.primary.on_success, &self.every.on_success) {
            hook(data, info);
        }
    }

    pub(crate) fn error(&self, error: &RequestError, info: &RequestInfo<'_>) {
        for hook in chain(&self.primary.on_error, &self.every.on_error) {
            hook(error, info);
        }
    }

    pub(crate) fn fetch(&self, info: &RequestInfo<'_>) {
        for hook in chain(&self.primary.on_fetch, &self.every.on_fetch) {
            hook(info);
        }
    }

    pub(crate) fn progress(&self, progress: u8, info: &RequestInfo<'_>) {
        for hook in chain(&self.primary.on_progress, &self.every.on_progress) {
            hook(progress, info);
        }
    }

    pub(crate) fn online(&self, binding: &RequestBinding, info: &RequestInfo<'_>) {
        for hook in chain(&self.primary.on_online, &self.every.on_online) {
            hook(binding, info);
        }
    }

    pub(crate) fn offline(&self, binding: &RequestBinding, info: &RequestInfo<'_>) {
        for hook in chain(&self.primary.on_offline, &self.every.on_offline) {
            hook(binding, info);
        }
    }

    pub(crate) fn app_status_change(
        &self,
        status: AppStatus,
        binding: &RequestBinding,
        info: &RequestInfo<'_>,
    ) {
        for hook in chain(
            &self.primary.on_app_status_change,
            &self.every.on_app_status_change,
        ) {
            hook(status, binding, info);
        }
    }

    /// Fires the retry hooks. Returns whether a primary hook took over the
    /// re-attempt; an `every` hook only observes, so the caller still
    /// schedules the re-attempt itself when none is registered below it.
    pub(crate) fn retry(&self, binding: &RequestBinding, info: &RequestInfo<'_>) -> bool {
        for hook in chain(&self.primary.on_retry, &self.every.on_retry) {
            hook(binding, info);
        }
        self.primary.on_retry.is_some()
    }
}
