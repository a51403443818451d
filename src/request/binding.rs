//! The request controller.
//!
//! A [`RequestBinding`] tracks one logical request: its observable
//! [`RequestState`], the single-flight guard, the debounce gate, cache
//! orchestration, retry-on-signal and reactions to lifecycle signals.
//!
//! Every attempt runs on its own spawned task, so it always settles even if
//! the caller drops the future returned by [`RequestBinding::run`]. Once the
//! binding is [unmounted](RequestBinding::unmount), late updates are ignored.

use std::fmt;
use std::panic;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::{FutureExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::cache::{CacheStore, cache_key};
use super::config::EffectiveConfig;
use super::error::RequestError;
use super::hooks::RequestInfo;
use super::service::{ProgressSink, Service};
use super::state::{Begun, BindingState, RequestState, Transition};
use crate::command::Command;
use crate::subscription::changes::StateChanges;
use crate::subscription::lifecycle::{AppStatus, LifecycleEvent};
use crate::subscription::{Handle, Subscription};

/// Outcome of a trigger.
///
/// `Ok(None)` means no attempt settled for this trigger: it was collapsed by
/// debounce, dropped by the single-flight guard, handed to a retry, or the
/// binding is unmounted.
pub type RunResult = Result<Option<Value>, RequestError>;

// Phase traces go to `debug` when the binding is in debug mode, else `trace`.
macro_rules! phase {
    ($debug:expr, $($arg:tt)+) => {
        if $debug {
            tracing::debug!($($arg)+);
        } else {
            tracing::trace!($($arg)+);
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Run,
    Refresh,
    Retry,
}

impl Trigger {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Refresh => "refresh",
            Self::Retry => "retry",
        }
    }
}

struct Inner {
    service: Service,
    config: EffectiveConfig,
    cache: Arc<dyn CacheStore>,
    state: watch::Sender<BindingState>,
    mounted: CancellationToken,
}

/// One logical request bound to one usage site.
///
/// Cloning is cheap; clones drive the same binding.
#[derive(Clone)]
pub struct RequestBinding {
    inner: Arc<Inner>,
}

impl RequestBinding {
    /// Creates a binding that assumes the app is online and active.
    ///
    /// Prefer [`RequestProvider::bind`](super::provider::RequestProvider::bind),
    /// which seeds the lifecycle fields from the provider's signals.
    #[must_use]
    pub fn new(service: Service, config: EffectiveConfig, cache: Arc<dyn CacheStore>) -> Self {
        Self::with_lifecycle(service, config, cache, true, AppStatus::Active)
    }

    pub(crate) fn with_lifecycle(
        service: Service,
        config: EffectiveConfig,
        cache: Arc<dyn CacheStore>,
        online: bool,
        app_status: AppStatus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                service,
                config,
                cache,
                state: watch::Sender::new(BindingState::new(online, app_status)),
                mounted: CancellationToken::new(),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.service.name()
    }

    #[must_use]
    pub fn config(&self) -> &EffectiveConfig {
        &self.inner.config
    }

    /// Snapshot of the observable state.
    #[must_use]
    pub fn state(&self) -> RequestState {
        self.inner.state.borrow().view.clone()
    }

    /// Whether an attempt currently holds the single-flight guard.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.inner.state.borrow().in_flight()
    }

    /// State snapshots as a subscription source.
    #[must_use]
    pub fn changes(&self) -> StateChanges {
        StateChanges::new(
            self.inner.state.subscribe(),
            Arc::as_ptr(&self.inner) as usize,
        )
    }

    /// Triggers an attempt after the debounce window.
    ///
    /// Triggers arriving within the window collapse into one attempt using
    /// the last trigger's params. A staged override from
    /// [`set_next_params`](Self::set_next_params) takes precedence over
    /// `params`.
    pub fn run(&self, params: Option<Value>) -> BoxFuture<'static, RunResult> {
        let binding = self.clone();
        async move {
            let mut ticket = 0;
            binding.inner.state.send_if_modified(|state| {
                ticket = state.next_ticket();
                false
            });

            let window = binding.inner.config.debounce;
            if !window.is_zero() {
                tokio::time::sleep(window).await;
                if !binding.inner.state.borrow().is_latest(ticket) {
                    phase!(binding.debug(), service = %binding.name(), "trigger superseded within debounce window");
                    return Ok(None);
                }
            }

            binding.execute(params, Trigger::Run).await
        }
        .boxed()
    }

    /// Like [`run`](Self::run) with typed params.
    pub fn run_with<P: Serialize>(&self, params: &P) -> BoxFuture<'static, RunResult> {
        match serde_json::to_value(params) {
            Ok(params) => self.run(Some(params)),
            Err(err) => future::ready(Err(RequestError::from(err))).boxed(),
        }
    }

    /// Re-executes with the last executed params, skipping debounce.
    ///
    /// Resolves to `Ok(None)` without calling the service when nothing has
    /// executed yet. A staged override is left untouched for the next `run`.
    pub fn refresh(&self) -> BoxFuture<'static, RunResult> {
        let binding = self.clone();
        async move {
            let last = binding.inner.state.borrow().last_executed();
            let Some(params) = last else {
                phase!(binding.debug(), service = %binding.name(), "refresh before any attempt ignored");
                return Ok(None);
            };
            binding.execute(params, Trigger::Refresh).await
        }
        .boxed()
    }

    /// Stages params for the next `run`, overriding its argument once.
    pub fn set_next_params(&self, params: Value) {
        self.apply(Transition::Staged(params));
    }

    /// Replaces the held data. `Some` also clears a held error.
    pub fn set_data(&self, data: Option<Value>) {
        self.apply(Transition::DataSet(data));
    }

    /// Drops the held data and its cache entry for the current params.
    pub fn clear(&self) {
        if self.inner.config.cached {
            if let Some(params) = self.state().params {
                self.inner.cache.remove(&cache_key(self.name(), &params));
            }
        }
        self.apply(Transition::DataSet(None));
    }

    /// Wraps `run` into a [`Command`] producing one message with the outcome.
    pub fn command<Msg, F>(&self, params: Option<Value>, f: F) -> Command<Msg>
    where
        Msg: Send + 'static,
        F: FnOnce(RunResult) -> Msg + Send + 'static,
    {
        Command::perform(self.run(params), f)
    }

    /// Reacts to a connectivity reading.
    ///
    /// Only transitions count. Going offline clears the error and loading
    /// flag; the hooks fire only once the binding has executed an attempt.
    pub fn connectivity_changed(&self, online: bool) {
        if !self.apply(Transition::Connectivity(online)) {
            return;
        }
        let state = self.state();
        if !state.dirty {
            return;
        }

        phase!(self.debug(), service = %self.name(), online, "connectivity changed");
        let info = self.info(state.params.as_ref());
        if online {
            self.inner.config.hooks.online(self, &info);
        } else {
            self.inner.config.hooks.offline(self, &info);
        }
    }

    /// Reacts to an app-status reading. Only transitions count.
    pub fn app_status_changed(&self, status: AppStatus) {
        if !self.apply(Transition::AppStatus(status)) {
            return;
        }
        let state = self.state();
        if !state.dirty {
            return;
        }

        phase!(self.debug(), service = %self.name(), %status, "app status changed");
        let info = self.info(state.params.as_ref());
        self.inner.config.hooks.app_status_change(status, self, &info);
    }

    pub fn handle_lifecycle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Connectivity(online) => self.connectivity_changed(online),
            LifecycleEvent::AppStatus(status) => self.app_status_changed(status),
        }
    }

    /// Feeds lifecycle events into this binding until the returned handle is
    /// cancelled, the source ends or the binding is unmounted.
    pub fn watch_lifecycle(&self, source: Subscription<LifecycleEvent>) -> Handle {
        let token = self.inner.mounted.child_token();
        let task_token = token.clone();
        let binding = self.clone();
        let mut events = source.stream();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = task_token.cancelled() => break,
                    event = events.next() => match event {
                        Some(event) => binding.handle_lifecycle(event),
                        None => break,
                    },
                }
            }
        });

        Handle::new(token, join)
    }

    /// Tears the binding down. Outstanding attempts still settle, but their
    /// state updates are ignored and lifecycle watchers stop.
    pub fn unmount(&self) {
        phase!(self.debug(), service = %self.name(), "binding unmounted");
        self.inner.mounted.cancel();
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        !self.inner.mounted.is_cancelled()
    }

    fn debug(&self) -> bool {
        self.inner.config.debug
    }

    fn info<'a>(&'a self, params: Option<&'a Value>) -> RequestInfo<'a> {
        RequestInfo {
            params,
            name: self.name(),
            method: self.inner.config.method,
        }
    }

    /// Applies a transition unless unmounted. Returns `true` if the view changed.
    fn apply(&self, transition: Transition) -> bool {
        if !self.is_mounted() {
            return false;
        }
        self.inner.state.send_if_modified(|state| state.update(transition))
    }

    fn begin(&self, params: Option<Value>, trigger: Trigger) -> Option<Begun> {
        let mut begun = None;
        self.inner.state.send_if_modified(|state| {
            begun = state.begin(params, trigger == Trigger::Run);
            begun.is_some()
        });
        begun
    }

    async fn execute(&self, params: Option<Value>, trigger: Trigger) -> RunResult {
        match tokio::spawn(self.clone().attempt(params, trigger)).await {
            Ok(result) => result,
            Err(err) => match err.try_into_panic() {
                Ok(payload) => panic::resume_unwind(payload),
                Err(_) => Err(RequestError::Unknown),
            },
        }
    }

    async fn attempt(self, params: Option<Value>, trigger: Trigger) -> RunResult {
        let debug = self.debug();
        if !self.is_mounted() {
            phase!(debug, service = %self.name(), "binding unmounted, trigger ignored");
            return Ok(None);
        }

        let Some(Begun { params, had_data }) = self.begin(params, trigger) else {
            phase!(debug, service = %self.name(), trigger = trigger.as_str(), "attempt in flight, trigger dropped");
            return Ok(None);
        };
        let _settle = Settle(&self);

        let config = &self.inner.config;
        let info = self.info(params.as_ref());
        phase!(debug, service = %self.name(), trigger = trigger.as_str(), ?params, "attempt started");
        config.hooks.progress(0, &info);

        let key = params
            .as_ref()
            .filter(|_| config.cached)
            .map(|params| cache_key(self.name(), params));

        if let Some(hit) = key
            .as_deref()
            .filter(|_| !had_data)
            .and_then(|key| self.inner.cache.get(key))
        {
            phase!(debug, service = %self.name(), key = key.as_deref().unwrap_or_default(), "served from cache");
            self.apply(Transition::CacheHit(hit.clone()));
            config.hooks.success(&hit, &info);
            return Ok(Some(hit));
        }

        config.hooks.fetch(&info);
        phase!(debug, service = %self.name(), method = %config.method, "fetching");
        let outcome = self
            .inner
            .service
            .call(params.clone(), self.progress_sink(params.clone()))
            .await;

        match outcome {
            Ok(response) => {
                self.apply(Transition::Resolved);

                if retry_signalled(&response) && self.claim_retry() {
                    phase!(debug, service = %self.name(), "response asked for a retry");
                    if !config.hooks.retry(&self, &info) {
                        self.schedule_retry(params.clone());
                    }
                    return Ok(None);
                }

                let data = extract_success(response, config.success_key.as_deref());
                self.apply(Transition::Succeeded(data.clone()));
                config.hooks.success(&data, &info);

                if let Some(key) = &key {
                    self.inner.cache.put(key, data.clone(), config.ttl);
                    phase!(debug, service = %self.name(), key = %key, ttl = ?config.ttl, "wrote cache");
                }
                phase!(debug, service = %self.name(), "attempt succeeded");
                Ok(Some(data))
            }
            Err(error) => {
                let error = error.classify();
                phase!(debug, service = %self.name(), %error, status = ?error.status(), "attempt failed");
                self.apply(Transition::Failed(error.clone()));
                config.hooks.error(&error, &info);
                Err(error)
            }
        }
    }

    fn claim_retry(&self) -> bool {
        let max_retries = self.inner.config.max_retries;
        let mut claimed = false;
        self.inner.state.send_if_modified(|state| {
            claimed = state.claim_retry(max_retries);
            false
        });
        claimed
    }

    fn schedule_retry(&self, params: Option<Value>) {
        let binding = self.clone();
        let delay = self.inner.config.retry_delay;
        phase!(self.debug(), service = %self.name(), ?delay, "retry scheduled");

        tokio::spawn(async move {
            tokio::select! {
                () = binding.inner.mounted.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    // the outcome is observed through state and hooks
                    let _ = binding.execute(params, Trigger::Retry).await;
                }
            }
        });
    }

    fn progress_sink(&self, params: Option<Value>) -> ProgressSink {
        let binding = self.clone();
        ProgressSink::new(move |progress| {
            binding.apply(Transition::Progress(progress));
            let info = binding.info(params.as_ref());
            binding.inner.config.hooks.progress(progress, &info);
        })
    }
}

impl fmt::Debug for RequestBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBinding")
            .field("service", &self.inner.service)
            .field("state", &self.inner.state.borrow().view)
            .field("mounted", &self.is_mounted())
            .finish_non_exhaustive()
    }
}

/// Releases the single-flight guard when an attempt ends, however it ends.
struct Settle<'a>(&'a RequestBinding);

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        let mounted = self.0.is_mounted();
        self.0.inner.state.send_if_modified(|state| {
            if mounted {
                state.update(Transition::Settled)
            } else {
                // torn down: free the guard, leave the view as it was
                state.release();
                false
            }
        });
    }
}

/// Whether a raw response carries `"retry": true`.
#[must_use]
pub fn retry_signalled(response: &Value) -> bool {
    response.get("retry").and_then(Value::as_bool) == Some(true)
}

/// Unwraps `key` from an object response; any other response is kept whole.
#[must_use]
pub fn extract_success(response: Value, key: Option<&str>) -> Value {
    match (key, response) {
        (Some(key), Value::Object(mut map)) => match map.remove(key) {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        (_, response) => response,
    }
}
