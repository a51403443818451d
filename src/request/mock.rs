//! Scripted service for testing.
//!
//! [`MockService`] stands in for a transport: it answers calls from a
//! script, records the params of every call, and can hold calls until
//! released so single-flight behavior can be observed deterministically.
//!
//! ```
//! use serde_json::json;
//! use tears_request::request::mock::MockService;
//!
//! let mock = MockService::new()
//!     .respond(json!({"id": 1}))
//!     .fail_with(tears_request::request::RequestError::transport("down"));
//! let service = mock.service("users.get");
//! assert_eq!(mock.call_count(), 0);
//! # let _ = service;
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;

use super::error::RequestError;
use super::service::{ProgressSink, Service};

type Outcome = Result<Value, RequestError>;

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Outcome>,
    fallback: Option<Outcome>,
    progress: Vec<u8>,
    calls: Vec<Option<Value>>,
}

/// A scripted stand-in for a transport.
///
/// Queued outcomes are used once each, in order; after that the fallback
/// answers (default `Ok(Value::Null)`). Clones share the script and the
/// call log.
#[derive(Debug, Clone, Default)]
pub struct MockService {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
}

impl MockService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response.
    #[must_use]
    pub fn respond(self, response: Value) -> Self {
        self.lock().queue.push_back(Ok(response));
        self
    }

    /// Queues a rejection.
    #[must_use]
    pub fn fail_with(self, error: RequestError) -> Self {
        self.lock().queue.push_back(Err(error));
        self
    }

    /// Answers every call past the queue with `response`.
    #[must_use]
    pub fn respond_always(self, response: Value) -> Self {
        self.lock().fallback = Some(Ok(response));
        self
    }

    /// Rejects every call past the queue with `error`.
    #[must_use]
    pub fn fail_always(self, error: RequestError) -> Self {
        self.lock().fallback = Some(Err(error));
        self
    }

    /// Reports these progress values before answering each call.
    #[must_use]
    pub fn report_progress(self, steps: impl IntoIterator<Item = u8>) -> Self {
        self.lock().progress = steps.into_iter().collect();
        self
    }

    /// Waits `delay` before answering each call.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Holds every call until [`release`](Self::release) lets it through.
    #[must_use]
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Lets `calls` held calls answer. No effect unless [`gated`](Self::gated).
    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    /// Params of every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Option<Value>> {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Registers the mock as a [`Service`] named `name`.
    #[must_use]
    pub fn service(&self, name: &str) -> Service {
        let mock = self.clone();
        Service::with_progress(name.to_owned(), move |params, progress| {
            let mock = mock.clone();
            async move { mock.answer(params, progress).await }
        })
    }

    async fn answer(&self, params: Option<Value>, progress: ProgressSink) -> Outcome {
        let (outcome, steps) = {
            let mut script = self.lock();
            script.calls.push(params);
            let outcome = script
                .queue
                .pop_front()
                .or_else(|| script.fallback.clone())
                .unwrap_or(Ok(Value::Null));
            (outcome, script.progress.clone())
        };

        if let Some(gate) = &self.gate {
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Err(RequestError::transport("mock gate closed")),
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        for step in steps {
            progress.report(step);
        }
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
