use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::instrument;

use super::{
    dto::{CreateReviewRequest, UpdateReviewRequest},
    repo_types::{ReviewFilter, ReviewPatch},
    services,
};
use crate::{
    auth::{extractors::AuthUser, guard::restrict_to},
    error::{AppError, AppResult},
    extract::{parse_id, ValidatedJson},
    response::Envelope,
    state::AppState,
    users::repo_types::Role,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reviews", get(list_reviews).post(create_review))
        .route("/reviews/me", get(my_reviews))
        .route("/reviews/:id", get(get_review).patch(update_review).delete(delete_review))
}

type JsonResult = AppResult<Json<Envelope<serde_json::Value>>>;

#[instrument(skip(state, _caller))]
pub async fn list_reviews(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
) -> JsonResult {
    let reviews = state.reviews.list(ReviewFilter::default()).await?;
    Ok(Json(Envelope::success(json!({ "reviews": reviews })).with_results(reviews.len())))
}

#[instrument(skip(state, caller))]
pub async fn my_reviews(State(state): State<AppState>, AuthUser(caller): AuthUser) -> JsonResult {
    let filter = ReviewFilter {
        author: Some(caller.id),
        ..Default::default()
    };
    let reviews = state.reviews.list(filter).await?;
    Ok(Json(Envelope::success(json!({ "reviews": reviews })).with_results(reviews.len())))
}

#[instrument(skip(state, _caller))]
pub async fn get_review(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<String>,
) -> JsonResult {
    let review = state
        .reviews
        .find(parse_id(&id)?)
        .await?
        .ok_or_else(|| AppError::not_found("No review found with that ID."))?;
    Ok(Json(Envelope::success(json!({ "review": review }))))
}

#[instrument(skip(state, caller, body))]
pub async fn create_review(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ValidatedJson(body): ValidatedJson<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<Envelope<serde_json::Value>>)> {
    restrict_to(&caller, &[Role::User])?;
    let tour = body
        .tour
        .as_deref()
        .ok_or_else(|| AppError::field("tour", "A review must belong to a tour."))?;
    let tour_id = parse_id(tour)?;
    let review = services::create(&state, &caller, tour_id, body.review, body.rating).await?;
    Ok((StatusCode::CREATED, Json(Envelope::success(json!({ "review": review })))))
}

/// `GET /tours/:id/reviews`
#[instrument(skip(state, _caller))]
pub async fn list_for_tour(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(tour_id): Path<String>,
) -> JsonResult {
    let filter = ReviewFilter {
        tour: Some(parse_id(&tour_id)?),
        ..Default::default()
    };
    let reviews = state.reviews.list(filter).await?;
    Ok(Json(Envelope::success(json!({ "reviews": reviews })).with_results(reviews.len())))
}

/// `POST /tours/:id/reviews`
#[instrument(skip(state, caller, body))]
pub async fn create_for_tour(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(tour_id): Path<String>,
    ValidatedJson(body): ValidatedJson<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<Envelope<serde_json::Value>>)> {
    restrict_to(&caller, &[Role::User])?;
    let tour_id = parse_id(&tour_id)?;
    let review = services::create(&state, &caller, tour_id, body.review, body.rating).await?;
    Ok((StatusCode::CREATED, Json(Envelope::success(json!({ "review": review })))))
}

#[instrument(skip(state, caller, body))]
pub async fn update_review(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateReviewRequest>,
) -> JsonResult {
    let patch = ReviewPatch {
        review: body.review.map(|r| r.trim().to_string()),
        rating: body.rating,
    };
    let review = services::update(&state, &caller, parse_id(&id)?, patch).await?;
    Ok(Json(Envelope::success(json!({ "review": review }))))
}

#[instrument(skip(state, caller))]
pub async fn delete_review(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    services::delete(&state, &caller, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
