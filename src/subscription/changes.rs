//! Binding state changes as a subscription source.

use std::hash::{DefaultHasher, Hash, Hasher};

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::{SubscriptionId, SubscriptionSource};
use crate::request::state::{BindingState, RequestState};

/// Streams a binding's [`RequestState`] snapshots.
///
/// The current snapshot is yielded first, then one per observable change.
/// Rapid changes may coalesce; the latest snapshot is never skipped.
#[derive(Debug, Clone)]
pub struct StateChanges {
    rx: watch::Receiver<BindingState>,
    id: u64,
}

impl StateChanges {
    pub(crate) fn new(rx: watch::Receiver<BindingState>, id: usize) -> Self {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        Self {
            rx,
            id: hasher.finish(),
        }
    }
}

impl SubscriptionSource for StateChanges {
    type Output = RequestState;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        WatchStream::new(self.rx.clone())
            .map(|state| state.view)
            .boxed()
    }

    fn id(&self) -> SubscriptionId {
        SubscriptionId::of::<Self>(self.id)
    }
}
