use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::{dto::UpdateMeRequest, repo_types::Role};
use crate::{
    auth::{extractors::AuthUser, guard::restrict_to},
    error::{AppError, AppResult},
    extract::{parse_id, ValidatedJson},
    response::Envelope,
    state::AppState,
};

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me))
        .route("/users/updateMe", patch(update_me))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", delete(delete_user))
}

type JsonResult = AppResult<Json<Envelope<Value>>>;

#[instrument(skip_all)]
pub async fn get_me(AuthUser(user): AuthUser) -> JsonResult {
    Ok(Json(Envelope::success(json!({ "user": user }))))
}

#[instrument(skip_all)]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(body): ValidatedJson<UpdateMeRequest>,
) -> JsonResult {
    if body.touches_password() {
        return Err(AppError::bad_request(
            "This route is not for password updates. Please use /updatePassword.",
        ));
    }
    let updated = state
        .users
        .update_profile(user.id, body.into_update())
        .await?
        .ok_or_else(|| {
            AppError::not_found("The user belonging to this token does no longer exist.")
        })?;
    info!(user_id = %updated.id, "profile updated");
    Ok(Json(Envelope::success(json!({ "user": updated }))))
}

#[instrument(skip_all)]
pub async fn list_users(State(state): State<AppState>, AuthUser(caller): AuthUser) -> JsonResult {
    restrict_to(&caller, &[Role::Admin])?;
    let users = state.users.list().await?;
    Ok(Json(Envelope::success(json!({ "users": users })).with_results(users.len())))
}

#[instrument(skip(state, caller))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    restrict_to(&caller, &[Role::Admin])?;
    let id = parse_id(&id)?;
    if !state.users.delete(id).await? {
        return Err(AppError::not_found("No user found with that ID."));
    }
    info!(user_id = %id, by = %caller.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
