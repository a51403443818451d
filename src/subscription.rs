//! Long-lived event sources a binding can react to.
//!
//! A [`SubscriptionSource`] produces a stream of events; a [`Subscription`]
//! wraps one so its output can be mapped into another message type.
//! Bindings consume `Subscription<LifecycleEvent>` to react to connectivity
//! and app-status changes, and expose their own state changes as a source.

pub mod changes;
pub mod lifecycle;
pub mod mock;

use std::any::TypeId;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Identity of a subscription source: its concrete type plus a hash of what
/// it watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    hash: u64,
}

impl SubscriptionId {
    #[must_use]
    pub fn of<T: 'static>(hash: u64) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            hash,
        }
    }
}

/// Something that can be turned into a stream of events.
pub trait SubscriptionSource: Send + Sync + 'static {
    type Output;

    /// Opens a fresh stream. Each call yields an independent stream.
    fn stream(&self) -> BoxStream<'static, Self::Output>;

    fn id(&self) -> SubscriptionId;
}

/// A source together with a mapping into the consumer's message type.
pub struct Subscription<Msg> {
    pub(crate) id: SubscriptionId,
    pub(crate) spawn: Box<dyn Fn() -> BoxStream<'static, Msg> + Send + Sync>,
}

impl<Msg: Send + 'static> Subscription<Msg> {
    pub fn new<S>(source: S) -> Self
    where
        S: SubscriptionSource<Output = Msg>,
    {
        let id = source.id();
        Self {
            id,
            spawn: Box::new(move || source.stream()),
        }
    }

    /// Maps every event through `f`.
    #[must_use]
    pub fn map<F, NewMsg>(self, f: F) -> Subscription<NewMsg>
    where
        F: Fn(Msg) -> NewMsg + Clone + Send + Sync + 'static,
        NewMsg: Send + 'static,
    {
        let spawn = self.spawn;
        Subscription {
            id: self.id,
            spawn: Box::new(move || spawn().map(f.clone()).boxed()),
        }
    }

    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Opens the underlying stream.
    #[must_use]
    pub fn stream(&self) -> BoxStream<'static, Msg> {
        (self.spawn)()
    }
}

impl<Msg> std::fmt::Debug for Subscription<Msg> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Handle for a running subscription task
#[derive(Debug)]
pub struct Handle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl Handle {
    #[must_use]
    pub const fn new(token: CancellationToken, join: JoinHandle<()>) -> Self {
        Self { token, join }
    }

    /// Whether the task has stopped, by cancellation or because its stream ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel the subscription and wait for task completion
    pub async fn cancel(self) {
        self.token.cancel();
        let _ = self.join.await;
    }
}
