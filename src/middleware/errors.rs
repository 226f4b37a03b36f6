use axum::{
    extract::{Request, State},
    http::{header, Uri},
    middleware::Next,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::{
    error::{AppError, ErrorReport},
    response::status_text,
    state::AppState,
    views::layout,
};

/// Terminal responder: every error response passes through here once.
pub async fn respond_to_errors(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let response = next.run(request).await;

    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };

    if report.operational {
        warn!(
            %path,
            status = %report.status,
            kind = report.kind,
            message = %report.message,
            "request failed"
        );
    } else {
        error!(%path, status = %report.status, detail = %report.detail, "unexpected failure");
    }

    let production = state.config.mode.is_production();
    let (mut parts, body) = response.into_parts();

    let rebuilt = if !path.starts_with("/api") {
        let message = if production {
            report.public_message().to_string()
        } else {
            report.message.clone()
        };
        Html(layout::error_page(&message)).into_response()
    } else if production {
        return Response::from_parts(parts, body);
    } else {
        Json(json!({
            "status": status_text(report.status),
            "message": report.message,
            "error": {
                "kind": report.kind,
                "statusCode": report.status.as_u16(),
                "operational": report.operational,
            },
            "stack": report.detail,
        }))
        .into_response()
    };

    let (new_parts, new_body) = rebuilt.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    if let Some(content_type) = new_parts.headers.get(header::CONTENT_TYPE) {
        parts.headers.insert(header::CONTENT_TYPE, content_type.clone());
    }
    Response::from_parts(parts, new_body)
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::not_found(format!("Can't find {} on the server!", uri.path()))
}
