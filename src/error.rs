use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::Envelope;

/// Message shown in production for anything that is not operational.
pub const GENERIC_MESSAGE: &str = "Something wrong happened.";

/// Why a session token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorKind {
    InvalidSignature,
    Malformed,
    Invalid,
    Expired,
}

impl TokenErrorKind {
    pub fn message(self) -> &'static str {
        match self {
            TokenErrorKind::InvalidSignature => "The JWT token signature is invalid.",
            TokenErrorKind::Malformed => "The JWT token is malformed.",
            TokenErrorKind::Invalid => "The JWT token is invalid.",
            TokenErrorKind::Expired => "The JWT token is expired.",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Operational { status: StatusCode, message: String },

    #[error("The {path}: {value} is invalid.")]
    Cast { path: String, value: String },

    #[error("The [{}]: must be unique.", .fields.join(","))]
    DuplicateKey { fields: Vec<String> },

    #[error("{message}")]
    FieldValidation { field: String, message: String },

    #[error("{}", join_messages(.0))]
    Validation(Vec<AppError>),

    #[error("{}", .0.message())]
    Token(TokenErrorKind),

    #[error("The request body is too large. It should not exceed {limit_kb} kb.")]
    PayloadTooLarge { limit_kb: usize },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

fn join_messages(errors: &[AppError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

impl AppError {
    pub fn operational(status: StatusCode, message: impl Into<String>) -> Self {
        AppError::Operational {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::NOT_FOUND, message)
    }

    pub fn cast(path: impl Into<String>, value: impl Into<String>) -> Self {
        AppError::Cast {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::FieldValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal(anyhow::anyhow!(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Operational { status, .. } => *status,
            AppError::Cast { .. }
            | AppError::DuplicateKey { .. }
            | AppError::FieldValidation { .. }
            | AppError::Validation(_)
            | AppError::PayloadTooLarge { .. } => StatusCode::BAD_REQUEST,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Anticipated failures whose message is safe to show to any caller.
    pub fn is_operational(&self) -> bool {
        !matches!(self, AppError::Internal(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Operational { .. } => "OperationalError",
            AppError::Cast { .. } => "CastError",
            AppError::DuplicateKey { .. } => "DuplicateKeyError",
            AppError::FieldValidation { .. } => "ValidatorError",
            AppError::Validation(_) => "ValidationError",
            AppError::Token(TokenErrorKind::Expired) => "TokenExpiredError",
            AppError::Token(_) => "JsonWebTokenError",
            AppError::PayloadTooLarge { .. } => "PayloadTooLargeError",
            AppError::Internal(_) => "InternalError",
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let mut flattened = Vec::new();
        for (field, list) in fields {
            for e in list {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("The {field} is invalid."));
                flattened.push(AppError::field(field.to_string(), message));
            }
        }
        // struct-level checks land under "__all__"
        AppError::Validation(flattened)
    }
}

/// What the terminal responder needs to finish an error response.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
    pub operational: bool,
    pub detail: String,
}

impl ErrorReport {
    pub fn public_message(&self) -> &str {
        if self.operational {
            &self.message
        } else {
            GENERIC_MESSAGE
        }
    }
}

impl From<&AppError> for ErrorReport {
    fn from(err: &AppError) -> Self {
        let message = match err {
            AppError::Internal(inner) => format!("{inner:#}"),
            other => other.to_string(),
        };
        Self {
            status: err.status(),
            kind: err.kind(),
            message,
            operational: err.is_operational(),
            detail: format!("{err:?}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let report = ErrorReport::from(&self);
        let body = Envelope::<()>::failure(report.status, report.public_message());
        let mut response = (report.status, Json(body)).into_response();
        response.extensions_mut().insert(report);
        response
    }
}
