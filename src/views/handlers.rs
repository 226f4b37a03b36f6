use std::fmt::Write;

use axum::{
    extract::{Path, Query, State},
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::instrument;

use super::layout::{escape, page};
use crate::{
    auth::extractors::{AuthUser, MaybeUser},
    error::{AppError, AppResult},
    query::QueryDescriptor,
    reviews::repo_types::ReviewFilter,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(overview))
        .route("/tour/:slug", get(tour_page))
        .route("/login", get(login_form))
        .route("/signup", get(signup_form))
        .route("/me", get(account))
        .route("/forgotPassword", get(forgot_password_form))
        .route("/resetPassword", get(reset_password_form))
}

#[instrument(skip_all)]
pub async fn overview(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> AppResult<Html<String>> {
    let tours = state.tours.query(&QueryDescriptor::default()).await?;
    let mut cards = String::from(r#"<div class="card-container">"#);
    for t in &tours {
        let _ = write!(
            cards,
            r#"<div class="card"><h3 class="heading-tertirary">{name}</h3><p class="card__text">{summary}</p><p>{difficulty} {days}-day tour</p><p><span class="card__footer-value">${price}</span> per person</p><p>{avg} rating ({qty})</p><a class="btn btn--green btn--small" href="/tour/{slug}">Details</a></div>"#,
            name = escape(&t.name),
            summary = escape(&t.summary),
            difficulty = t.difficulty,
            days = t.duration,
            price = t.price,
            avg = t.ratings_average,
            qty = t.ratings_quantity,
            slug = escape(&t.slug),
        );
    }
    cards.push_str("</div>");
    Ok(Html(page("All Tours", user.as_ref(), &cards)))
}

#[instrument(skip(state, user))]
pub async fn tour_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
) -> AppResult<Html<String>> {
    let tour = state
        .tours
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::not_found("There is no tour with that name."))?;
    let reviews = state
        .reviews
        .list(ReviewFilter {
            tour: Some(tour.id),
            ..Default::default()
        })
        .await?;

    let mut body = format!(
        r#"<section class="section-header"><h1 class="heading-primary">{name} tour</h1><p>{duration} days, up to {group} people, {difficulty}</p><p>{location}</p></section><section class="section-description"><p class="description__text">{description}</p></section>"#,
        name = escape(&tour.name),
        duration = tour.duration,
        group = tour.max_group_size,
        difficulty = tour.difficulty,
        location = tour
            .start_location
            .as_ref()
            .and_then(|l| l.description.as_deref())
            .map(escape)
            .unwrap_or_default(),
        description = escape(tour.description.as_deref().unwrap_or(&tour.summary)),
    );
    body.push_str(r#"<section class="section-reviews"><div class="reviews">"#);
    for r in &reviews {
        let _ = write!(
            body,
            r#"<div class="reviews__card"><h6 class="reviews__user">{author}</h6><p class="reviews__text">{text}</p><p class="reviews__rating">{rating}/5</p></div>"#,
            author = escape(&r.author.name),
            text = escape(&r.review),
            rating = r.rating,
        );
    }
    body.push_str("</div></section>");
    Ok(Html(page(&tour.name, user.as_ref(), &body)))
}

const LOGIN_FORM: &str = r#"<div class="login-form"><h2 class="heading-secondary">Log into your account</h2><form class="form form--login" data-api="/api/v1/users/login" data-method="POST" data-redirect="/"><label for="email">Email address</label><input id="email" name="email" type="email" required><label for="password">Password</label><input id="password" name="password" type="password" required minlength="8"><button class="btn btn--green">Login</button></form><a href="/forgotPassword">Forgot your password?</a></div>"#;

const SIGNUP_FORM: &str = r#"<div class="login-form"><h2 class="heading-secondary">Create your account</h2><form class="form form--signup" data-api="/api/v1/users/signup" data-method="POST" data-redirect="/"><label for="name">Name</label><input id="name" name="name" type="text" required><label for="email">Email address</label><input id="email" name="email" type="email" required><label for="password">Password</label><input id="password" name="password" type="password" required minlength="8"><label for="passwordConfirm">Confirm password</label><input id="passwordConfirm" name="passwordConfirm" type="password" required minlength="8"><button class="btn btn--green">Sign up</button></form></div>"#;

const FORGOT_FORM: &str = r#"<div class="login-form"><h2 class="heading-secondary">Forgot your password?</h2><form class="form form--forgot" data-api="/api/v1/users/forgotPassword" data-method="POST"><label for="email">Email address</label><input id="email" name="email" type="email" required><button class="btn btn--green">Send reset link</button></form></div>"#;

pub async fn login_form(MaybeUser(user): MaybeUser) -> Html<String> {
    Html(page("Log into your account", user.as_ref(), LOGIN_FORM))
}

pub async fn signup_form(MaybeUser(user): MaybeUser) -> Html<String> {
    Html(page("Create your account", user.as_ref(), SIGNUP_FORM))
}

pub async fn forgot_password_form(MaybeUser(user): MaybeUser) -> Html<String> {
    Html(page("Forgot password", user.as_ref(), FORGOT_FORM))
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetLink {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub token: String,
}

pub async fn reset_password_form(
    MaybeUser(user): MaybeUser,
    Query(link): Query<ResetLink>,
) -> Html<String> {
    let body = format!(
        r#"<div class="login-form"><h2 class="heading-secondary">Reset your password</h2><form class="form form--reset" data-api="/api/v1/users/resetPassword" data-method="PATCH" data-redirect="/"><input name="email" type="hidden" value="{email}"><input name="token" type="hidden" value="{token}"><label for="password">New password</label><input id="password" name="password" type="password" required minlength="8"><label for="passwordConfirm">Confirm password</label><input id="passwordConfirm" name="passwordConfirm" type="password" required minlength="8"><button class="btn btn--green">Save password</button></form></div>"#,
        email = escape(&link.email),
        token = escape(&link.token),
    );
    Html(page("Reset password", user.as_ref(), &body))
}

/// Requires a session, unlike the other pages.
pub async fn account(AuthUser(user): AuthUser) -> Html<String> {
    let body = format!(
        r#"<div class="user-view__content"><h2 class="heading-secondary">Your account settings</h2><form class="form form-user-data" data-api="/api/v1/users/updateMe" data-method="PATCH" data-redirect="/me"><label for="name">Name</label><input id="name" name="name" type="text" value="{name}" required><label for="email">Email address</label><input id="email" name="email" type="email" value="{email}" required><p>Role: {role}</p><button class="btn btn--small btn--green">Save settings</button></form><h2 class="heading-secondary">Password change</h2><form class="form form-user-password" data-api="/api/v1/users/updatePassword" data-method="PATCH"><input name="passwordCurrent" type="password" required minlength="8"><input name="password" type="password" required minlength="8"><input name="passwordConfirm" type="password" required minlength="8"><button class="btn btn--small btn--green">Save password</button></form></div>"#,
        name = escape(&user.name),
        email = escape(&user.email),
        role = user.role,
    );
    Html(page("Your account", Some(&user), &body))
}
