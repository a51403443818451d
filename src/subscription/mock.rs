//! Mock subscription source for testing.
//!
//! [`MockSource`] emits values on demand, so lifecycle reactions can be
//! driven deterministically without real connectivity or app-status signals.
//!
//! ```
//! use tears_request::subscription::{Subscription, mock::MockSource};
//! use tears_request::subscription::lifecycle::LifecycleEvent;
//!
//! let mock = MockSource::<bool>::new();
//! let connectivity = Subscription::new(mock.clone()).map(LifecycleEvent::Connectivity);
//! # let _ = connectivity;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::broadcast;

use super::{SubscriptionId, SubscriptionSource};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// A subscription source that emits values on demand.
///
/// Uses a broadcast channel internally, so it can be cloned and shared between
/// the test and the binding watching it.
#[derive(Debug, Clone)]
pub struct MockSource<T: Clone> {
    sender: broadcast::Sender<T>,
    id: SubscriptionId,
}

impl<T: Clone + 'static> MockSource<T> {
    /// Creates a mock buffering at most `capacity` values per receiver.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            sender: tx,
            id: SubscriptionId::of::<Self>(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
        }
    }

    /// Creates a mock with default capacity (100).
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Emits a value to every open stream.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no active receivers.
    pub fn emit(&self, value: T) -> Result<usize, broadcast::error::SendError<T>> {
        self.sender.send(value)
    }

    /// Returns the number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone + 'static> Default for MockSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> SubscriptionSource for MockSource<T> {
    type Output = T;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        let rx = self.sender.subscribe();
        tokio_stream::wrappers::BroadcastStream::new(rx)
            .filter_map(|result| async move { result.ok() })
            .boxed()
    }

    fn id(&self) -> SubscriptionId {
        self.id
    }
}
