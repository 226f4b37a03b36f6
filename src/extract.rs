use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

/// JSON body that is deserialized and validated before the handler runs.
pub struct ValidatedJson<T>(pub T);

/// JSON body without field validation.
pub struct JsonBody<T>(pub T);

fn body_error(rejection: JsonRejection, state: &AppState) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge {
            limit_kb: state.config.limits.body_limit_kb,
        };
    }
    AppError::bad_request(rejection.body_text())
}

#[async_trait]
impl<T> FromRequest<AppState> for JsonBody<T>
where
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| body_error(e, state))?;
        Ok(JsonBody(value))
    }
}

#[async_trait]
impl<T> FromRequest<AppState> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let JsonBody(value) = JsonBody::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Path ids arrive as text so a bad one becomes a cast error, not a routing miss.
pub fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::cast("id", raw))
}
