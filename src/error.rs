//! Error types for the mock harness

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the mock harness
///
/// Dispatching a request never produces one of these: every intercepted request resolves
/// to a [`MockResponse`](crate::response::MockResponse). Errors come from misconfiguration,
/// from pass-through transport failures, and from test code decoding a response with
/// [`MockResponse::error_for_status`](crate::response::MockResponse::error_for_status).
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed while passing a request through to a real upstream
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Error response produced by the mock API
    #[error("API error: {status} - {message}")]
    Api {
        status: StatusCode,
        kind: Option<ApiErrorKind>,
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error - invalid harness setup or nonsensical route rule
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stream processing error
    #[error("Stream error: {0}")]
    Stream(String),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Response body did not have the expected shape
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// The failure classes the mock API can answer with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// 401: no session / bearer token
    Unauthenticated,
    /// 400: the request body failed validation
    ValidationFailure,
    /// 500: deliberately injected server failure
    SyntheticServerError,
    /// The id is not in the fixture store. Reads answer 404, deletes are a no-op.
    NotFoundOrNoOp,
}

impl ApiErrorKind {
    /// HTTP status the kind is reported with
    pub fn status(self) -> StatusCode {
        match self {
            ApiErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiErrorKind::ValidationFailure => StatusCode::BAD_REQUEST,
            ApiErrorKind::SyntheticServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ApiErrorKind::NotFoundOrNoOp => StatusCode::NOT_FOUND,
        }
    }

    /// Value of `error.type` in a JSON error body
    pub fn error_type(self) -> &'static str {
        match self {
            ApiErrorKind::Unauthenticated => "authentication_error",
            ApiErrorKind::ValidationFailure => "invalid_request_error",
            ApiErrorKind::SyntheticServerError => "server_error",
            ApiErrorKind::NotFoundOrNoOp => "not_found_error",
        }
    }

    /// Classify a status code, if it belongs to the taxonomy
    pub fn from_status(status: StatusCode) -> Option<Self> {
        match status {
            StatusCode::UNAUTHORIZED => Some(ApiErrorKind::Unauthenticated),
            StatusCode::BAD_REQUEST => Some(ApiErrorKind::ValidationFailure),
            StatusCode::NOT_FOUND => Some(ApiErrorKind::NotFoundOrNoOp),
            s if s.is_server_error() => Some(ApiErrorKind::SyntheticServerError),
            _ => None,
        }
    }
}

impl Error {
    /// Create a new API error
    pub fn api(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            kind: ApiErrorKind::from_status(status),
            message: message.into(),
        }
    }

    /// Get the error kind, for API errors
    pub fn kind(&self) -> Option<ApiErrorKind> {
        match self {
            Error::Api { kind, .. } => *kind,
            _ => None,
        }
    }

    /// Get the HTTP status code if this is an API error
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status(),
            _ => None,
        }
    }

    /// Check if this error was deliberately injected as a server failure
    pub fn is_synthetic_server_error(&self) -> bool {
        self.kind() == Some(ApiErrorKind::SyntheticServerError)
    }

    /// Check if this is an authentication error
    pub fn is_auth_error(&self) -> bool {
        self.kind() == Some(ApiErrorKind::Unauthenticated)
    }

    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}
