use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::{
    dto::{CreateTourRequest, UpdateTourRequest},
    repo_types::TourDraft,
    services::{self, cheapest_alias},
};
use crate::{
    auth::{extractors::AuthUser, guard::restrict_to},
    error::{AppError, AppResult},
    extract::{parse_id, ValidatedJson},
    query::{describe, QueryParams},
    response::Envelope,
    reviews::{self, repo_types::ReviewFilter},
    state::AppState,
    users::repo_types::Role,
};

const MIN_STATS_RATING: f64 = 4.5;
const TOUR_EDITORS: [Role; 2] = [Role::Admin, Role::LeadGuide];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tours", get(list_tours).post(create_tour))
        .route("/tours/cheapest", get(cheapest_tours))
        .route("/tours/stats", get(tour_stats))
        .route("/tours/monthly-stats/:year", get(monthly_stats))
        .route("/tours/tourWithin/:maxDistance/:latlng", get(tours_within))
        .route("/tours/tourWithin/:latlng", get(tour_distances))
        .route("/tours/:id", get(get_tour).patch(update_tour).delete(delete_tour))
}

pub fn nested_review_routes() -> Router<AppState> {
    Router::new().route(
        "/tours/:id/reviews",
        get(reviews::handlers::list_for_tour).post(reviews::handlers::create_for_tour),
    )
}

fn not_found() -> AppError {
    AppError::not_found("No tour found with that ID.")
}

type JsonResult = AppResult<Json<Envelope<Value>>>;

async fn run_query(state: &AppState, params: &QueryParams) -> JsonResult {
    let descriptor = describe(params, state.config.limits.max_filter_keys)?;
    let tours = state.tours.query(&descriptor).await?;
    let shaped: Vec<Value> = tours
        .iter()
        .map(|t| serde_json::to_value(t).map(|v| descriptor.projection.apply(v)))
        .collect::<Result<_, _>>()
        .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("serialize tours")))?;
    Ok(Json(Envelope::success(json!({ "tours": shaped })).with_results(shaped.len())))
}

#[instrument(skip(state))]
pub async fn list_tours(State(state): State<AppState>, params: QueryParams) -> JsonResult {
    run_query(&state, &params).await
}

#[instrument(skip(state))]
pub async fn cheapest_tours(State(state): State<AppState>, mut params: QueryParams) -> JsonResult {
    cheapest_alias(&mut params);
    run_query(&state, &params).await
}

#[instrument(skip(state))]
pub async fn tour_stats(State(state): State<AppState>) -> JsonResult {
    let stats = state.tours.stats(MIN_STATS_RATING).await?;
    Ok(Json(Envelope::success(json!({ "stats": stats }))))
}

#[instrument(skip(state))]
pub async fn monthly_stats(State(state): State<AppState>, Path(year): Path<String>) -> JsonResult {
    let year: i32 = year.trim().parse().map_err(|_| AppError::cast("year", &year))?;
    let plan = state.tours.monthly_starts(year).await?;
    Ok(Json(Envelope::success(json!({ "plan": plan })).with_results(plan.len())))
}

#[instrument(skip(state))]
pub async fn tours_within(
    State(state): State<AppState>,
    Path((max_distance, latlng)): Path<(String, String)>,
) -> JsonResult {
    let max_km = services::parse_distance(&max_distance)?;
    let origin = services::parse_latlng(&latlng)?;
    let tours = services::within(state.tours.located().await?, origin, max_km);
    Ok(Json(Envelope::success(json!({ "tours": tours })).with_results(tours.len())))
}

#[instrument(skip(state))]
pub async fn tour_distances(
    State(state): State<AppState>,
    Path(latlng): Path<String>,
) -> JsonResult {
    let origin = services::parse_latlng(&latlng)?;
    let distances = services::distances(state.tours.located().await?, origin);
    Ok(Json(Envelope::success(json!({ "distances": distances })).with_results(distances.len())))
}

#[instrument(skip(state))]
pub async fn get_tour(State(state): State<AppState>, Path(id): Path<String>) -> JsonResult {
    let id = parse_id(&id)?;
    let tour = state.tours.find(id).await?.ok_or_else(not_found)?;
    let reviews = state
        .reviews
        .list(ReviewFilter {
            tour: Some(id),
            ..Default::default()
        })
        .await?;

    let mut body = serde_json::to_value(&tour)
        .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("serialize tour")))?;
    if let Value::Object(map) = &mut body {
        map.insert("reviews".into(), json!(reviews));
    }
    Ok(Json(Envelope::success(json!({ "tour": body }))))
}

#[instrument(skip(state, caller, body))]
pub async fn create_tour(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ValidatedJson(body): ValidatedJson<CreateTourRequest>,
) -> AppResult<(StatusCode, Json<Envelope<Value>>)> {
    restrict_to(&caller, &TOUR_EDITORS)?;
    let tour = state.tours.create(body.into_draft()?).await?;
    info!(tour_id = %tour.id, slug = %tour.slug, "tour created");
    Ok((StatusCode::CREATED, Json(Envelope::success(json!({ "tour": tour })))))
}

#[instrument(skip(state, caller, body))]
pub async fn update_tour(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateTourRequest>,
) -> JsonResult {
    restrict_to(&caller, &TOUR_EDITORS)?;
    let id = parse_id(&id)?;
    let current = state.tours.find(id).await?.ok_or_else(not_found)?;
    let mut draft = TourDraft::from(&current);
    body.apply(&mut draft)?;
    let tour = state.tours.update(id, draft).await?.ok_or_else(not_found)?;
    Ok(Json(Envelope::success(json!({ "tour": tour }))))
}

#[instrument(skip(state, caller))]
pub async fn delete_tour(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    restrict_to(&caller, &TOUR_EDITORS)?;
    let id = parse_id(&id)?;
    if !state.tours.delete(id).await? {
        return Err(not_found());
    }
    info!(tour_id = %id, "tour deleted");
    Ok(StatusCode::NO_CONTENT)
}
