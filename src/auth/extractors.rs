use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::guard;
use crate::{error::AppError, state::AppState, users::repo_types::User};

/// The authenticated caller; rejects the request otherwise.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        guard::authenticate(state, &parts.headers).await.map(AuthUser)
    }
}

/// The caller if a valid session is present, for pages guests may see.
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(guard::authenticate_soft(state, &parts.headers).await))
    }
}
