//! Prelude module for convenient imports.
//!
//! ```
//! use tears_request::prelude::*;
//! ```

pub use crate::command::Command;
pub use crate::request::{
    FormAdapter, FormErrors, FormHelpers, Hooks, HttpMethod, ProviderConfig, RequestBinding,
    RequestError, RequestOptions, RequestProvider, RequestState, Service, Status,
};
pub use crate::subscription::Subscription;
pub use crate::subscription::lifecycle::{AppStatus, LifecycleEvent};
