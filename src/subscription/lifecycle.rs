//! Connectivity and app-status signals.
//!
//! The host application owns the real platform probes; it feeds their
//! readings into [`Signals`], which remembers the last value and streams
//! transitions to every binding watching it.

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::{SubscriptionId, SubscriptionSource};

/// Foreground state reported by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStatus {
    #[default]
    Active,
    Inactive,
    Background,
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Background => "background",
        })
    }
}

/// A reading from one of the lifecycle signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connectivity(bool),
    AppStatus(AppStatus),
}

/// Shared last-known connectivity and app status.
///
/// Clones share the same signals. As a [`SubscriptionSource`] it yields only
/// changes made after the stream was opened; unchanged readings are dropped.
#[derive(Debug, Clone)]
pub struct Signals {
    online: Arc<watch::Sender<bool>>,
    app_status: Arc<watch::Sender<AppStatus>>,
}

impl Default for Signals {
    fn default() -> Self {
        Self::new(true, AppStatus::Active)
    }
}

impl Signals {
    #[must_use]
    pub fn new(online: bool, app_status: AppStatus) -> Self {
        Self {
            online: Arc::new(watch::Sender::new(online)),
            app_status: Arc::new(watch::Sender::new(app_status)),
        }
    }

    /// Records a connectivity reading. Returns `true` if it changed.
    pub fn set_online(&self, online: bool) -> bool {
        self.online.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        })
    }

    /// Records an app-status reading. Returns `true` if it changed.
    pub fn set_app_status(&self, status: AppStatus) -> bool {
        self.app_status.send_if_modified(|current| {
            let changed = *current != status;
            *current = status;
            changed
        })
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    #[must_use]
    pub fn app_status(&self) -> AppStatus {
        *self.app_status.borrow()
    }
}

impl SubscriptionSource for Signals {
    type Output = LifecycleEvent;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        let online =
            WatchStream::from_changes(self.online.subscribe()).map(LifecycleEvent::Connectivity);
        let app_status =
            WatchStream::from_changes(self.app_status.subscribe()).map(LifecycleEvent::AppStatus);
        stream::select(online, app_status).boxed()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        Arc::as_ptr(&self.online).hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}
