//! Binding state and the transitions that mutate it.
//!
//! All writes go through [`BindingState::update`] with an explicit
//! [`Transition`]; the controller never pokes fields directly. This keeps the
//! single-flight and staged-override rules in one place.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::RequestError;
use crate::subscription::lifecycle::AppStatus;

/// Coarse status derived from a [`RequestState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Nothing loaded yet.
    Idle,
    /// An attempt is running.
    Loading,
    /// Data is held.
    Success,
    /// The last attempt failed.
    Error,
}

/// Observable state of one binding.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState {
    /// Canonical data from the last successful attempt.
    pub data: Option<Value>,
    /// Classified error from the last failed attempt.
    pub error: Option<RequestError>,
    /// Params of the most recently executed attempt.
    pub params: Option<Value>,
    /// Upload progress, 0-100.
    pub progress: u8,
    pub loading: bool,
    /// Set by the first executed attempt; lifecycle hooks stay silent until then.
    pub dirty: bool,
    pub online: bool,
    pub app_status: AppStatus,
}

impl Default for RequestState {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            params: None,
            progress: 0,
            loading: false,
            dirty: false,
            online: true,
            app_status: AppStatus::Active,
        }
    }
}

impl RequestState {
    #[must_use]
    pub const fn status(&self) -> Status {
        if self.loading {
            Status::Loading
        } else if self.error.is_some() {
            Status::Error
        } else if self.data.is_some() {
            Status::Success
        } else {
            Status::Idle
        }
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Loading with nothing to show yet.
    #[must_use]
    pub const fn initial_loading(&self) -> bool {
        self.loading && self.data.is_none()
    }

    /// Deserializes the held data.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Parse`] when the data does not match `R`.
    pub fn data_as<R: DeserializeOwned>(&self) -> Result<Option<R>, RequestError> {
        self.data
            .as_ref()
            .map(|data| R::deserialize(data).map_err(RequestError::from))
            .transpose()
    }
}

/// A change applied to a [`BindingState`].
#[derive(Debug, Clone)]
pub(crate) enum Transition {
    Staged(Value),
    Progress(u8),
    /// Served from cache without touching the transport.
    CacheHit(Value),
    /// The transport answered.
    Resolved,
    Succeeded(Value),
    Failed(RequestError),
    /// The attempt is over, whatever the outcome.
    Settled,
    DataSet(Option<Value>),
    Connectivity(bool),
    AppStatus(AppStatus),
}

/// An attempt that passed the single-flight guard.
#[derive(Debug, Clone)]
pub(crate) struct Begun {
    pub params: Option<Value>,
    pub had_data: bool,
}

/// Full binding state: the observable view plus controller bookkeeping.
#[derive(Debug, Clone, Default)]
pub(crate) struct BindingState {
    pub view: RequestState,
    in_flight: bool,
    staged: Option<Value>,
    /// `None` until an attempt executes; `Some(None)` for a param-less attempt.
    last_executed: Option<Option<Value>>,
    ticket: u64,
    retries: u32,
}

impl BindingState {
    pub fn new(online: bool, app_status: AppStatus) -> Self {
        Self {
            view: RequestState {
                online,
                app_status,
                ..RequestState::default()
            },
            ..Self::default()
        }
    }

    /// Claims the single-flight guard.
    ///
    /// Returns `None` when an attempt is already in flight. Otherwise resolves
    /// the params (a staged override wins when `consume_staged`), records them
    /// and clears the override.
    pub fn begin(&mut self, trigger: Option<Value>, consume_staged: bool) -> Option<Begun> {
        if self.in_flight {
            return None;
        }

        let params = if consume_staged {
            self.staged.take().or(trigger)
        } else {
            trigger
        };

        self.in_flight = true;
        self.view.dirty = true;
        self.view.loading = true;
        self.view.progress = 0;
        self.view.params.clone_from(&params);
        self.last_executed = Some(params.clone());

        Some(Begun {
            params,
            had_data: self.view.data.is_some(),
        })
    }

    pub const fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Frees the single-flight guard without touching the view.
    pub const fn release(&mut self) {
        self.in_flight = false;
    }

    pub fn last_executed(&self) -> Option<Option<Value>> {
        self.last_executed.clone()
    }

    /// Starts a new debounce window and returns its ticket.
    pub const fn next_ticket(&mut self) -> u64 {
        self.ticket = self.ticket.wrapping_add(1);
        self.ticket
    }

    pub const fn is_latest(&self, ticket: u64) -> bool {
        self.ticket == ticket
    }

    /// Counts one more signalled retry if the cap allows it.
    pub const fn claim_retry(&mut self, max_retries: u32) -> bool {
        if self.retries < max_retries {
            self.retries += 1;
            true
        } else {
            false
        }
    }

    /// Applies a transition. Returns `true` if the observable view changed.
    pub fn update(&mut self, transition: Transition) -> bool {
        let before = self.view.clone();

        match transition {
            Transition::Staged(params) => {
                self.staged = Some(params);
            }
            Transition::Progress(progress) => {
                self.view.progress = progress.min(100);
            }
            Transition::CacheHit(data) | Transition::Succeeded(data) => {
                self.view.data = Some(data);
                self.view.error = None;
                self.view.progress = 100;
                self.retries = 0;
            }
            Transition::Resolved => {
                self.view.error = None;
                self.view.progress = 100;
            }
            Transition::Failed(error) => {
                self.view.error = Some(error);
                self.view.data = None;
                self.view.progress = 0;
                self.retries = 0;
            }
            Transition::Settled => {
                self.in_flight = false;
                self.view.loading = false;
            }
            Transition::DataSet(data) => {
                if data.is_some() {
                    self.view.error = None;
                }
                self.view.data = data;
            }
            Transition::Connectivity(online) => {
                self.view.online = online;
                // the guard stays held: the outstanding attempt still settles it
                if !online && self.view.dirty {
                    self.view.error = None;
                    self.view.loading = false;
                }
            }
            Transition::AppStatus(status) => {
                self.view.app_status = status;
            }
        }

        self.view != before
    }
}
