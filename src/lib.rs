//! # tears-request - request state for Elm-style applications
//!
//! A data-fetching controller that wraps named service calls in a reusable
//! binding tracking loading, error and data state. Each binding debounces
//! triggers, allows one attempt in flight, serves and fills an injected TTL
//! cache, retries when the server asks for it and reacts to connectivity and
//! app-status changes.
//!
//! ## Core Components
//!
//! - [`RequestProvider`](request::RequestProvider): shared configuration, cache and lifecycle signals
//! - [`RequestBinding`](request::RequestBinding): the controller for one logical request
//! - [`Service`](request::Service): a transport call registered under a stable name
//! - [`Command`](command::Command): runs a binding from an Elm-style `update` function
//! - [`Subscription`](subscription::Subscription): lifecycle and state-change event sources
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use serde_json::json;
//! use tears_request::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), RequestError> {
//! let provider = RequestProvider::new(ProviderConfig::new().success_key("data"));
//! let user = Service::new("users.get", |params| async move {
//!     Ok(json!({ "data": { "id": params.and_then(|p| p.get("id").cloned()) } }))
//! });
//!
//! let binding = provider.bind(user, RequestOptions::new().debounce(Duration::ZERO));
//! let data = binding.run(Some(json!({ "id": 1 }))).await?;
//!
//! assert_eq!(data, Some(json!({ "id": 1 })));
//! assert_eq!(binding.state().status(), Status::Success);
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod prelude;
pub mod request;
pub mod subscription;
