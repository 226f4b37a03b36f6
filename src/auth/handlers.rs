use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use tracing::instrument;

use super::{
    dto::{
        ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SessionData, SignupRequest,
        UpdatePasswordRequest,
    },
    extractors::AuthUser,
    services::{self, Session},
};
use crate::{
    error::AppResult,
    extract::{JsonBody, ValidatedJson},
    response::Envelope,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/signup", post(signup))
        .route("/users/login", post(login))
        .route("/users/logout", get(logout))
        .route("/users/forgotPassword", post(forgot_password))
        .route("/users/resetPassword", patch(reset_password))
        .route("/users/updatePassword", patch(update_password))
}

type SessionResponse = (CookieJar, Json<Envelope<SessionData>>);

/// Sets the cookie and wraps token and user in the envelope.
fn respond_with_session(state: &AppState, jar: CookieJar, session: Session) -> SessionResponse {
    let jar = jar.add(services::session_cookie(state, session.token.clone()));
    let body = Envelope::success(SessionData { user: session.user }).with_token(session.token);
    (jar, Json(body))
}

#[instrument(skip(state, jar, body))]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<SignupRequest>,
) -> AppResult<(StatusCode, SessionResponse)> {
    let session = services::signup(&state, body).await?;
    Ok((StatusCode::CREATED, respond_with_session(&state, jar, session)))
}

#[instrument(skip(state, jar, body))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(body): JsonBody<LoginRequest>,
) -> AppResult<SessionResponse> {
    let session = services::login(&state, body.email, body.password).await?;
    Ok(respond_with_session(&state, jar, session))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<Envelope<()>>) {
    (jar.add(services::logout_cookie()), Json(Envelope::ok()))
}

#[instrument(skip(state, body))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ForgotPasswordRequest>,
) -> AppResult<Json<Envelope<()>>> {
    services::forgot_password(&state, &body.email).await?;
    let mut envelope = Envelope::ok();
    envelope.message = Some("Token sent to email!".into());
    Ok(Json(envelope))
}

#[instrument(skip(state, jar, body))]
pub async fn reset_password(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(body): ValidatedJson<ResetPasswordRequest>,
) -> AppResult<SessionResponse> {
    let session = services::reset_password(&state, body).await?;
    Ok(respond_with_session(&state, jar, session))
}

#[instrument(skip(state, jar, caller, body))]
pub async fn update_password(
    State(state): State<AppState>,
    jar: CookieJar,
    AuthUser(caller): AuthUser,
    ValidatedJson(body): ValidatedJson<UpdatePasswordRequest>,
) -> AppResult<SessionResponse> {
    let session = services::update_password(&state, caller, body).await?;
    Ok(respond_with_session(&state, jar, session))
}
