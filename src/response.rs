use axum::http::StatusCode;
use serde::Serialize;

/// `"failed"` for client errors, `"error"` for server errors.
pub fn status_text(status: StatusCode) -> &'static str {
    if status.is_success() || status.is_redirection() {
        "success"
    } else if status.is_client_error() {
        "failed"
    } else {
        "error"
    }
}

/// Standard response envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            results: None,
            token: None,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_results(mut self, results: usize) -> Self {
        self.results = Some(results);
        self
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }
}

impl Envelope<()> {
    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status_text(status),
            results: None,
            token: None,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn ok() -> Self {
        Self {
            status: "success",
            results: None,
            token: None,
            data: None,
            message: None,
        }
    }
}
