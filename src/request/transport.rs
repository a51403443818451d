//! HTTP transport backed by `reqwest`.
//!
//! GET and HEAD send params as a query string; other methods send a JSON
//! body, or the raw params when JSON mode is off. Non-2xx responses become
//! [`RequestError::Transport`] carrying the status, the body's `message` and
//! its `errors` map.

use std::sync::Arc;

use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;

use super::error::{RequestError, field_errors_from_value};
use super::method::HttpMethod;
use super::service::Service;

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        let error = Self::transport(err.to_string());
        match err.status() {
            Some(status) => error.with_status(status.as_u16()),
            None => error,
        }
    }
}

/// Sends requests for [`Service`]s.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Option<Arc<str>>,
    headers: HeaderMap,
    json: bool,
    cache_control: bool,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: None,
            headers: HeaderMap::new(),
            json: true,
            cache_control: true,
        }
    }

    /// Prefix for relative paths.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<Arc<str>>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Headers sent with every request.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sends bodies as JSON (default) or as raw params.
    #[must_use]
    pub const fn json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Adds `Cache-Control: no-cache` to non-GET relative requests (default on).
    #[must_use]
    pub const fn cache_control(mut self, cache_control: bool) -> Self {
        self.cache_control = cache_control;
        self
    }

    /// Performs one exchange.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Transport`] for network failures and non-2xx
    /// responses.
    pub async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        params: Option<&Value>,
    ) -> Result<Value, RequestError> {
        let relative = !path.starts_with("http");
        let url = match (&self.base_url, relative) {
            (Some(base), true) => format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/')),
            _ => path.to_owned(),
        };

        let mut builder = self
            .client
            .request(to_reqwest(method), &url)
            .headers(self.default_headers(method, relative));

        if method.uses_query_string() {
            if let Some(params) = params {
                builder = builder.query(&query_pairs(params));
            }
        } else {
            let empty = Value::Object(serde_json::Map::new());
            let params = params.unwrap_or(&empty);
            builder = if self.json {
                builder.body(serde_json::to_vec(params)?)
            } else {
                match params {
                    Value::String(raw) => builder.body(raw.clone()),
                    other => builder.body(other.to_string()),
                }
            };
        }

        tracing::trace!(%method, url = %url, "sending request");
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        tracing::trace!(%method, url = %url, status, "response received");

        interpret_response(status, &body)
    }

    /// Registers `method path` as a named [`Service`].
    #[must_use]
    pub fn service(&self, name: &str, method: HttpMethod, path: &str) -> Service {
        let transport = self.clone();
        let path: Arc<str> = Arc::from(path);
        Service::new(name.to_owned(), move |params| {
            let transport = transport.clone();
            let path = path.clone();
            async move { transport.send(method, &path, params.as_ref()).await }
        })
        .method(method)
    }

    fn default_headers(&self, method: HttpMethod, relative: bool) -> HeaderMap {
        let mut headers = self.headers.clone();
        if relative {
            if self.json {
                headers
                    .entry(ACCEPT)
                    .or_insert(HeaderValue::from_static("application/json"));
                headers
                    .entry(CONTENT_TYPE)
                    .or_insert(HeaderValue::from_static("application/json"));
            }
            if self.cache_control && method != HttpMethod::Get {
                headers
                    .entry(CACHE_CONTROL)
                    .or_insert(HeaderValue::from_static("no-cache"));
            }
        }
        headers
    }
}

const fn to_reqwest(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Options => reqwest::Method::OPTIONS,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Patch => reqwest::Method::PATCH,
    }
}

/// Turns a response into data or a classified error.
///
/// An empty 2xx body yields `Null`; an undecodable error body yields
/// `"Error {status}"`.
///
/// # Errors
///
/// Returns [`RequestError::Transport`] for any status outside 200-299 and
/// [`RequestError::Parse`] for a non-empty 2xx body that is not JSON.
pub fn interpret_response(status: u16, body: &[u8]) -> Result<Value, RequestError> {
    let ok = (200..300).contains(&status);
    if ok && body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(json) if ok => Ok(json),
        Ok(json) => Err(error_from_body(status, &json)),
        Err(err) if ok => Err(RequestError::from(err)),
        Err(err) => {
            tracing::trace!(status, error = %err, "error body is not JSON");
            Err(RequestError::transport(format!("Error {status}")).with_status(status))
        }
    }
}

/// Builds the error for a non-2xx JSON body.
#[must_use]
pub fn error_from_body(status: u16, body: &Value) -> RequestError {
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map_or_else(|| format!("Error {status}"), ToOwned::to_owned);

    let error = RequestError::transport(message).with_status(status);
    match body.get("errors").and_then(field_errors_from_value) {
        Some(errors) => error.with_field_errors(errors),
        None => error,
    }
}

/// Flattens params into query pairs, nesting as `a[b]` and `a[0]`.
#[must_use]
pub fn query_pairs(params: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    match params {
        Value::Object(map) => {
            for (key, value) in map {
                flatten(key.clone(), value, &mut pairs);
            }
        }
        Value::Null => {}
        other => flatten(String::new(), other, &mut pairs),
    }
    pairs
}

fn flatten(prefix: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                flatten(format!("{prefix}[{key}]"), value, pairs);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten(format!("{prefix}[{i}]"), item, pairs);
            }
        }
        Value::String(s) => pairs.push((prefix, s.clone())),
        Value::Null => pairs.push((prefix, String::new())),
        scalar => pairs.push((prefix, scalar.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_interpret_success() {
        assert_eq!(interpret_response(200, br#"{"id":1}"#), Ok(json!({"id": 1})));
        assert_eq!(interpret_response(204, b""), Ok(Value::Null));

        let error = interpret_response(200, b"<html>oops</html>").expect_err("html is not JSON");
        assert!(matches!(error, RequestError::Parse(_)));
    }

    #[test]
    fn test_interpret_error_message() {
        let error = interpret_response(422, br#"{"message":"Invalid","errors":{"email":["taken"]}}"#)
            .expect_err("422 is an error");
        assert_eq!(error.to_string(), "Invalid");
        assert_eq!(error.status(), Some(422));
        assert_eq!(
            error.field_errors().and_then(|errors| errors.get("email")),
            Some(&vec!["taken".to_string()])
        );
    }

    #[test]
    fn test_interpret_error_without_message() {
        let error = interpret_response(500, b"<html>").expect_err("500 is an error");
        assert_eq!(error.to_string(), "Error 500");
        assert_eq!(error.status(), Some(500));

        let error = interpret_response(404, b"{}").expect_err("404 is an error");
        assert_eq!(error.to_string(), "Error 404");
        assert!(error.field_errors().is_none());
    }

    #[test]
    fn test_query_pairs() {
        let pairs = query_pairs(&json!({"page": 2, "q": "rust", "filter": {"tags": ["a", "b"]}, "none": null}));
        assert_eq!(
            pairs,
            vec![
                ("page".to_string(), "2".to_string()),
                ("q".to_string(), "rust".to_string()),
                ("filter[tags][0]".to_string(), "a".to_string()),
                ("filter[tags][1]".to_string(), "b".to_string()),
                ("none".to_string(), String::new()),
            ]
        );
        assert!(query_pairs(&Value::Null).is_empty());
    }

    #[test]
    fn test_default_headers_for_relative_urls() {
        let transport = HttpTransport::new();

        let headers = transport.default_headers(HttpMethod::Post, true);
        assert_eq!(headers[ACCEPT], "application/json");
        assert_eq!(headers[CACHE_CONTROL], "no-cache");

        let headers = transport.default_headers(HttpMethod::Get, true);
        assert!(headers.get(CACHE_CONTROL).is_none());

        assert!(transport.default_headers(HttpMethod::Post, false).is_empty());
        assert!(
            transport
                .clone()
                .json(false)
                .default_headers(HttpMethod::Get, true)
                .is_empty()
        );
    }

    #[test]
    fn test_explicit_headers_win() {
        let mut custom = HeaderMap::new();
        custom.insert(ACCEPT, HeaderValue::from_static("text/plain"));
        let transport = HttpTransport::new().headers(custom);

        let headers = transport.default_headers(HttpMethod::Get, true);
        assert_eq!(headers[ACCEPT], "text/plain");
    }

    #[test]
    fn test_service_declares_method() {
        let service = HttpTransport::new().service("users.create", HttpMethod::Post, "/users");
        assert_eq!(service.name(), "users.create");
        assert_eq!(service.declared_method(), Some(HttpMethod::Post));
    }
}
