use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use super::error::RequestError;
use super::method::HttpMethod;

/// Future returned by a service call.
pub type ServiceFuture = BoxFuture<'static, Result<Value, RequestError>>;

type ServiceFn = dyn Fn(Option<Value>, ProgressSink) -> ServiceFuture + Send + Sync;

/// Receives upload progress (0-100) from a running service call.
#[derive(Clone)]
pub struct ProgressSink {
    report: Arc<dyn Fn(u8) + Send + Sync>,
}

impl ProgressSink {
    pub(crate) fn new(report: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            report: Arc::new(report),
        }
    }

    /// A sink that drops every report.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Reports progress, clamped to 100.
    pub fn report(&self, percent: u8) {
        (self.report)(percent.min(100));
    }

    /// Reports `loaded / total` as a rounded percentage.
    pub fn report_bytes(&self, loaded: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = (loaded.min(total) * 100 + total / 2) / total;
        self.report(u8::try_from(percent).unwrap_or(100));
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink").finish_non_exhaustive()
    }
}

/// A transport call registered under a stable name.
///
/// The name identifies the endpoint in cache keys, hooks and traces, so two
/// services must never share a name unless they are the same endpoint.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use tears_request::request::Service;
///
/// let service = Service::new("users.get", |params| async move {
///     Ok(json!({ "echo": params }))
/// });
/// assert_eq!(service.name(), "users.get");
/// ```
#[derive(Clone)]
pub struct Service {
    name: Arc<str>,
    method: Option<HttpMethod>,
    call: Arc<ServiceFn>,
}

impl Service {
    /// Registers a service that resolves with the parsed response.
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, call: F) -> Self
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RequestError>> + Send + 'static,
    {
        Self::with_progress(name, move |params, _progress| call(params))
    }

    /// Registers a service that reports upload progress through a [`ProgressSink`].
    pub fn with_progress<F, Fut>(name: impl Into<Arc<str>>, call: F) -> Self
    where
        F: Fn(Option<Value>, ProgressSink) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RequestError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            method: None,
            call: Arc::new(move |params, progress| call(params, progress).boxed()),
        }
    }

    /// Declares the method this service speaks. Call-site options still win.
    #[must_use]
    pub const fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn declared_method(&self) -> Option<HttpMethod> {
        self.method
    }

    pub(crate) fn call(&self, params: Option<Value>, progress: ProgressSink) -> ServiceFuture {
        (self.call)(params, progress)
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}
