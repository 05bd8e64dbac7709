//! Responses produced by the mock API.
//!
//! Every intercepted request resolves to a [`MockResponse`]: a status, headers, a body and
//! an optional delay. Error responses use the OpenAI error envelope
//! `{"error": {"message", "type", "code"}}` so front-end error handling sees what the real
//! service would send.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::{
    error::{ApiErrorKind, Error},
    streaming::{CompletionScript, CompletionStream},
    Result,
};

/// Body of a mock response
#[derive(Debug, Clone, PartialEq)]
pub enum MockBody {
    Empty,
    Json(Value),
    Text(String),
    /// A scripted completion, rendered as server-sent events
    EventStream(CompletionScript),
}

/// Mock HTTP response returned for an intercepted request
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: MockBody,
    /// Optional delay to simulate network latency
    pub delay: Option<Duration>,
}

impl MockResponse {
    /// Create a new mock response with the given status and body
    pub fn new(status: StatusCode, body: MockBody) -> Self {
        let mut headers = HeaderMap::new();
        let content_type = match &body {
            MockBody::Empty => None,
            MockBody::Json(_) => Some("application/json"),
            MockBody::Text(_) => Some("text/plain; charset=utf-8"),
            MockBody::EventStream(_) => Some("text/event-stream"),
        };
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }

        Self {
            status,
            headers,
            body,
            delay: None,
        }
    }

    /// A JSON response with the given status
    pub fn json(status: StatusCode, body: Value) -> Self {
        Self::new(status, MockBody::Json(body))
    }

    /// Create a successful (200 OK) response
    pub fn ok(body: Value) -> Self {
        Self::json(StatusCode::OK, body)
    }

    /// Create a 201 Created response
    pub fn created(body: Value) -> Self {
        Self::json(StatusCode::CREATED, body)
    }

    /// Create a 204 No Content response
    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT, MockBody::Empty)
    }

    /// A bodiless response with only a status
    pub fn status_only(status: StatusCode) -> Self {
        Self::new(status, MockBody::Empty)
    }

    /// An error response of the given kind
    pub fn error(kind: ApiErrorKind, message: &str) -> Self {
        let body = json!({
            "error": {
                "message": message,
                "type": kind.error_type(),
                "code": null
            }
        });
        Self::json(kind.status(), body)
    }

    /// Create a 400 Bad Request response
    pub fn bad_request(message: &str) -> Self {
        Self::error(ApiErrorKind::ValidationFailure, message)
    }

    /// Create a 401 Unauthorized response
    pub fn unauthorized(message: &str) -> Self {
        Self::error(ApiErrorKind::Unauthenticated, message)
    }

    /// Create a 404 Not Found response
    pub fn not_found(message: &str) -> Self {
        Self::error(ApiErrorKind::NotFoundOrNoOp, message)
    }

    /// Create a 500 Internal Server Error response
    pub fn internal_server_error(message: &str) -> Self {
        Self::error(ApiErrorKind::SyntheticServerError, message)
    }

    /// A streaming 200 response replaying `script`
    pub fn event_stream(script: CompletionScript) -> Self {
        Self::new(StatusCode::OK, MockBody::EventStream(script))
    }

    /// Add a header to the response
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Config(format!("Invalid header value {value:?}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Add a request ID header
    pub fn with_request_id(self, request_id: &str) -> Result<Self> {
        self.with_header("x-request-id", request_id)
    }

    /// Add a delay to simulate network latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The JSON body, if the body is JSON
    pub fn body_json(&self) -> Option<&Value> {
        match &self.body {
            MockBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The body as it would appear on the wire
    pub fn body_bytes(&self) -> Bytes {
        match &self.body {
            MockBody::Empty => Bytes::new(),
            MockBody::Json(value) => Bytes::from(value.to_string()),
            MockBody::Text(text) => Bytes::from(text.clone()),
            MockBody::EventStream(script) => Bytes::from(script.to_sse()),
        }
    }

    /// Start the scripted completion, if this is a streaming response
    pub fn event_stream_events(&self) -> Option<CompletionStream> {
        match &self.body {
            MockBody::EventStream(script) => Some(script.start()),
            _ => None,
        }
    }

    /// Turn a non-success status into [`Error::Api`]
    pub fn error_for_status(&self) -> Result<()> {
        if self.status.is_success() {
            return Ok(());
        }

        let message = self
            .body_json()
            .and_then(|body| {
                body.get("error")
                    .and_then(|e| e.get("message"))
                    .or_else(|| body.get("detail"))
                    .or_else(|| body.get("message"))
            })
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| {
                self.status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            });

        Err(Error::api(self.status, message))
    }

    /// Decode a successful JSON body
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T> {
        self.error_for_status()?;
        match &self.body {
            MockBody::Json(value) => Ok(serde_json::from_value(value.clone())?),
            MockBody::Text(text) => Ok(serde_json::from_str(text)?),
            other => Err(Error::InvalidResponse(format!(
                "Expected a JSON body, got {:?}",
                other
            ))),
        }
    }

    /// Convert a real HTTP response (from a pass-through) into a mock response
    pub async fn from_reqwest(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let is_json = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        let text = response.text().await?;

        let body = if text.is_empty() {
            MockBody::Empty
        } else if is_json {
            MockBody::Json(serde_json::from_str(&text)?)
        } else {
            MockBody::Text(text)
        };

        Ok(Self {
            status,
            headers,
            body,
            delay: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mock_response_builders() {
        let response = MockResponse::ok(json!({"test": "data"}));
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body_json().unwrap()["test"], "data");
        assert_eq!(
            response.headers.get(CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let bad_request = MockResponse::bad_request("Invalid input");
        assert_eq!(bad_request.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad_request.body_json().unwrap()["error"]["message"], "Invalid input");
        assert_eq!(
            bad_request.body_json().unwrap()["error"]["type"],
            "invalid_request_error"
        );

        let unauthorized = MockResponse::unauthorized("No session");
        assert_eq!(unauthorized.status, StatusCode::UNAUTHORIZED);

        let server_error = MockResponse::internal_server_error("boom");
        assert_eq!(server_error.status, StatusCode::INTERNAL_SERVER_ERROR);

        let empty = MockResponse::status_only(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(empty.body, MockBody::Empty);
        assert!(empty.body_bytes().is_empty());
        assert!(empty.headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_mock_response_with_headers() {
        let response = MockResponse::ok(json!({}))
            .with_request_id("req-123")
            .unwrap()
            .with_delay(Duration::from_millis(5));

        assert_eq!(response.headers.get("x-request-id").unwrap(), "req-123");
        assert_eq!(response.delay, Some(Duration::from_millis(5)));

        let invalid = MockResponse::ok(json!({})).with_header("bad header", "x");
        assert!(matches!(invalid, Err(Error::Config(_))));
    }

    #[test]
    fn test_error_for_status() {
        assert!(MockResponse::ok(json!({})).error_for_status().is_ok());

        let err = MockResponse::bad_request("name is required")
            .error_for_status()
            .unwrap_err();
        assert_eq!(err.kind(), Some(ApiErrorKind::ValidationFailure));
        assert_eq!(
            err.to_string(),
            "API error: 400 Bad Request - name is required"
        );

        let err = MockResponse::status_only(StatusCode::INTERNAL_SERVER_ERROR)
            .error_for_status()
            .unwrap_err();
        assert!(err.is_synthetic_server_error());
        assert!(err.to_string().ends_with("Internal Server Error"));

        let err = MockResponse::json(StatusCode::NOT_FOUND, json!({"detail": "API key not found."}))
            .error_for_status()
            .unwrap_err();
        assert!(err.to_string().ends_with("API key not found."));
    }

    #[test]
    fn test_json_body_decoding() {
        #[derive(serde::Deserialize)]
        struct Thing {
            id: String,
        }

        let thing: Thing = MockResponse::ok(json!({"id": "t1"})).json_body().unwrap();
        assert_eq!(thing.id, "t1");

        let result: Result<Thing> = MockResponse::no_content().json_body();
        assert!(matches!(result, Err(Error::InvalidResponse(_))));

        let result: Result<Thing> = MockResponse::internal_server_error("x").json_body();
        assert!(matches!(result, Err(Error::Api { .. })));
    }

    #[test]
    fn test_event_stream_response() {
        let response = MockResponse::event_stream(CompletionScript::new("hi there"));
        assert_eq!(
            response.headers.get(CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        let body = String::from_utf8(response.body_bytes().to_vec()).unwrap();
        assert!(body.ends_with("data: [DONE]\n\n"));

        let events: Vec<_> = response.event_stream_events().unwrap().collect();
        assert_eq!(events.len(), 3);
        assert!(MockResponse::ok(json!({})).event_stream_events().is_none());
    }
}
