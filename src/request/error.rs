use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

/// Per-field messages reported by a server, keyed by field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Error type for request attempts.
///
/// Every rejection observed by a binding is normalized into one of these
/// variants before it is stored, handed to hooks, or returned from `run`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Non-2xx response or network failure.
    #[error("{message}")]
    Transport {
        message: String,
        status: Option<u16>,
        field_errors: Option<FieldErrors>,
    },

    /// The response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A rejection without a usable message.
    #[error("Unknown error")]
    Unknown,
}

impl RequestError {
    /// Creates a transport error with no status and no field errors.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
            field_errors: None,
        }
    }

    /// Attaches an HTTP status. No effect on non-transport errors.
    #[must_use]
    pub fn with_status(mut self, code: u16) -> Self {
        if let Self::Transport { status, .. } = &mut self {
            *status = Some(code);
        }
        self
    }

    /// Attaches a per-field error map. No effect on non-transport errors.
    #[must_use]
    pub fn with_field_errors(mut self, errors: FieldErrors) -> Self {
        if let Self::Transport { field_errors, .. } = &mut self {
            *field_errors = Some(errors);
        }
        self
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Structured per-field messages carried by the error, if any.
    #[must_use]
    pub const fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Transport { field_errors, .. } => field_errors.as_ref(),
            _ => None,
        }
    }

    /// Normalizes the error: a transport error without a message becomes
    /// [`RequestError::Unknown`].
    #[must_use]
    pub fn classify(self) -> Self {
        match self {
            Self::Transport { message, .. } if message.trim().is_empty() => Self::Unknown,
            other => other,
        }
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for RequestError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        match err.downcast::<Self>() {
            Ok(err) => *err,
            Err(err) => Self::transport(err.to_string()).classify(),
        }
    }
}

/// Reads a server-provided `errors` object into a [`FieldErrors`] map.
///
/// Each entry may be a single string or a list of strings; other shapes are
/// skipped. Returns `None` when nothing usable is found.
#[must_use]
pub fn field_errors_from_value(value: &Value) -> Option<FieldErrors> {
    let object = value.as_object()?;
    let errors: FieldErrors = object
        .iter()
        .filter_map(|(field, messages)| {
            let messages: Vec<String> = match messages {
                Value::String(message) => vec![message.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(|item| item.as_str().map(ToOwned::to_owned))
                    .collect(),
                _ => return None,
            };
            (!messages.is_empty()).then(|| (field.clone(), messages))
        })
        .collect();

    (!errors.is_empty()).then_some(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transport_error_display() {
        let err = RequestError::transport("Network Error").with_status(500);
        assert_eq!(err.to_string(), "Network Error");
        assert_eq!(err.status(), Some(500));
        assert!(err.field_errors().is_none());
    }

    #[test]
    fn test_classify_blank_message() {
        assert_eq!(RequestError::transport("  ").classify(), RequestError::Unknown);
        assert_eq!(
            RequestError::transport("boom").classify(),
            RequestError::transport("boom")
        );
        assert_eq!(RequestError::Unknown.to_string(), "Unknown error");
    }

    #[test]
    fn test_status_ignored_on_parse_error() {
        let err = RequestError::Parse("bad".to_string()).with_status(400);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_from_serde_error() {
        let err: RequestError = serde_json::from_str::<Value>("{")
            .expect_err("invalid json")
            .into();
        assert!(matches!(err, RequestError::Parse(_)));
    }

    #[test]
    fn test_from_boxed_error_keeps_request_error() {
        let boxed: Box<dyn std::error::Error + Send + Sync> =
            Box::new(RequestError::transport("kept").with_status(404));
        let err = RequestError::from(boxed);
        assert_eq!(err.status(), Some(404));

        let boxed: Box<dyn std::error::Error + Send + Sync> = "".into();
        assert_eq!(RequestError::from(boxed), RequestError::Unknown);
    }

    #[test]
    fn test_field_errors_from_value() {
        let errors = field_errors_from_value(&json!({
            "email": "already taken",
            "name": ["too short", "invalid"],
            "age": 12,
            "empty": []
        }))
        .expect("should parse field errors");

        assert_eq!(errors.len(), 2);
        assert_eq!(errors["email"], vec!["already taken"]);
        assert_eq!(errors["name"], vec!["too short", "invalid"]);

        assert!(field_errors_from_value(&json!("nope")).is_none());
        assert!(field_errors_from_value(&json!({})).is_none());
    }
}
