use reqwest::StatusCode;
use thiserror::Error;

/// Error body the backend attaches to non-2xx responses: `{message?, error?}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ErrorEnvelope {
    /// Lenient parse: anything that is not a JSON object with string fields yields an empty envelope.
    pub fn from_body(body: &str) -> Self {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
            return Self::default();
        };
        let field = |name: &str| {
            value
                .get(name)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        Self {
            message: field("message"),
            error: field("error"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// 401 from the backend. The HTTP client has already torn the session down.
    #[error("session is no longer valid")]
    Unauthorized(ErrorEnvelope),
    #[error("request failed with status {status}")]
    Status {
        status: StatusCode,
        envelope: ErrorEnvelope,
    },
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status(),
            ApiError::Decode(_) => None,
        }
    }

    pub fn envelope(&self) -> Option<&ErrorEnvelope> {
        match self {
            ApiError::Unauthorized(envelope) | ApiError::Status { envelope, .. } => Some(envelope),
            _ => None,
        }
    }

    /// Message shown to the user: server `message`, then server `error`,
    /// then transport error text, then `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        if let Some(envelope) = self.envelope() {
            if let Some(message) = &envelope.message {
                return message.clone();
            }
            if let Some(error) = &envelope.error {
                return error.clone();
            }
        }
        if let ApiError::Transport(e) = self {
            return e.to_string();
        }
        fallback.to_string()
    }
}

/// Client-side validation failure; raised before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Failure half of every session operation result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthFailure {
    pub message: String,
}

impl AuthFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_api(err: &ApiError, fallback: &str) -> Self {
        Self::new(err.user_message(fallback))
    }
}

impl From<ValidationError> for AuthFailure {
    fn from(err: ValidationError) -> Self {
        Self::new(err.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrudError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Rejected(String),
    #[error("session expired")]
    SessionExpired,
    #[error("response discarded: a newer request superseded it or the view was closed")]
    Discarded,
}
