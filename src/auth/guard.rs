use axum::http::{header, HeaderMap};
use axum_extra::extract::CookieJar;
use tracing::debug;

use super::jwt::SessionKeys;
use crate::{
    error::{AppError, AppResult},
    state::AppState,
    users::repo_types::{Role, User},
};

pub const JWT_COOKIE: &str = "jwt";

/// Bearer header first, then the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    CookieJar::from_headers(headers)
        .get(JWT_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Resolves the caller or explains why not.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<User> {
    let token = extract_token(headers).ok_or_else(|| {
        AppError::unauthorized("You are not logged in! Please log in to get access.")
    })?;

    let claims = SessionKeys::new(&state.config.jwt).verify(&token)?;

    let user = state.users.find_by_id(claims.sub).await?.ok_or_else(|| {
        AppError::not_found("The user belonging to this token does no longer exist.")
    })?;

    if user.changed_password_after(claims.iat) {
        debug!(user_id = %user.id, iat = claims.iat, "token predates password change");
        return Err(AppError::unauthorized(
            "User recently changed password! Please log in again.",
        ));
    }
    Ok(user)
}

/// Same checks, but any failure just means "guest".
pub async fn authenticate_soft(state: &AppState, headers: &HeaderMap) -> Option<User> {
    match authenticate(state, headers).await {
        Ok(user) => Some(user),
        Err(e) => {
            debug!(reason = %e, "soft authentication fell through");
            None
        }
    }
}

pub fn restrict_to(user: &User, roles: &[Role]) -> AppResult<()> {
    if roles.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "You do not have permission to perform this action",
        ))
    }
}
