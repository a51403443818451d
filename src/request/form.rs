//! Form submission glue.
//!
//! [`FormAdapter::submit`] runs a binding with the submitted values and, when
//! the attempt fails, translates the error into field-level messages through
//! a [`FormHelpers`] implementation supplied by the form layer.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::binding::{RequestBinding, RunResult};
use super::error::RequestError;

/// The form layer's error setters.
pub trait FormHelpers {
    fn set_field_error(&mut self, field: &str, message: &str);

    /// Sets a form-level message not tied to any field.
    fn set_status(&mut self, message: &str);
}

/// A plain [`FormHelpers`] that records what was set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    pub fields: BTreeMap<String, String>,
    pub status: Option<String>,
}

impl FormErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.status.is_none()
    }
}

impl FormHelpers for FormErrors {
    fn set_field_error(&mut self, field: &str, message: &str) {
        self.fields.insert(field.to_owned(), message.to_owned());
    }

    fn set_status(&mut self, message: &str) {
        self.status = Some(message.to_owned());
    }
}

/// Assigns `error` to the submitted fields.
///
/// Structured field errors win: each submitted field gets its first message.
/// Otherwise the first submitted field, in submission order, whose name
/// occurs in the message (case-insensitively) gets the whole message. If nothing matches, the
/// message becomes the form status.
pub fn map_error_to_fields(error: &RequestError, values: &Value, helpers: &mut impl FormHelpers) {
    let fields: Vec<&str> = values
        .as_object()
        .map(|object| object.keys().map(String::as_str).collect())
        .unwrap_or_default();

    if let Some(field_errors) = error.field_errors() {
        let mut assigned = false;
        for (field, messages) in field_errors {
            if !fields.contains(&field.as_str()) {
                continue;
            }
            if let Some(message) = messages.first() {
                helpers.set_field_error(field, message);
                assigned = true;
            }
        }
        if assigned {
            return;
        }
    }

    let message = error.to_string();
    let lowered = message.to_lowercase();
    match fields
        .iter()
        .find(|field| lowered.contains(&field.to_lowercase()))
    {
        Some(field) => helpers.set_field_error(field, &message),
        None => helpers.set_status(&message),
    }
}

/// Submits form values through a binding.
#[derive(Debug, Clone)]
pub struct FormAdapter {
    binding: RequestBinding,
}

impl From<RequestBinding> for FormAdapter {
    fn from(binding: RequestBinding) -> Self {
        Self::new(binding)
    }
}

impl FormAdapter {
    #[must_use]
    pub const fn new(binding: RequestBinding) -> Self {
        Self { binding }
    }

    #[must_use]
    pub const fn binding(&self) -> &RequestBinding {
        &self.binding
    }

    /// Runs the binding with `values` as params.
    ///
    /// On failure the error is mapped onto `helpers` unless the call site
    /// registered its own `on_error`, then returned unchanged either way.
    ///
    /// # Errors
    ///
    /// Returns the attempt's [`RequestError`], or [`RequestError::Parse`] if
    /// `values` cannot be serialized.
    pub async fn submit<V, H>(&self, values: &V, helpers: &mut H) -> RunResult
    where
        V: Serialize + ?Sized,
        H: FormHelpers + ?Sized,
    {
        let values = serde_json::to_value(values)?;
        match self.binding.run(Some(values.clone())).await {
            Ok(data) => Ok(data),
            Err(error) => {
                if !self.binding.config().custom_on_error {
                    map_error_to_fields(&error, &values, &mut Helpers(helpers));
                }
                Err(error)
            }
        }
    }
}

// lets `map_error_to_fields` take unsized helpers
struct Helpers<'a, H: ?Sized>(&'a mut H);

impl<H: FormHelpers + ?Sized> FormHelpers for Helpers<'_, H> {
    fn set_field_error(&mut self, field: &str, message: &str) {
        self.0.set_field_error(field, message);
    }

    fn set_status(&mut self, message: &str) {
        self.0.set_status(message);
    }
}
