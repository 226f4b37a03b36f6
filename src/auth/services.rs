use axum::http::StatusCode;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use super::{
    dto::{ResetPasswordRequest, SignupRequest, UpdatePasswordRequest},
    guard::JWT_COOKIE,
    jwt::SessionKeys,
    password,
    reset::{issue_reset_token, verify_reset_token},
};
use crate::{
    error::{AppError, AppResult},
    mail::password_reset_mail,
    state::AppState,
    users::repo_types::{NewUser, Role, User},
};

pub const LOGGED_OUT: &str = "loggedout";
const LOGOUT_COOKIE_TTL: Duration = Duration::seconds(10);

/// A logged-in user and the token proving it.
pub struct Session {
    pub user: User,
    pub token: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Backdated so a token issued right after the change still passes the staleness check.
fn password_changed_stamp() -> OffsetDateTime {
    OffsetDateTime::now_utc() - Duration::seconds(1)
}

pub fn start_session(state: &AppState, user: User) -> AppResult<Session> {
    let token = SessionKeys::new(&state.config.jwt).issue(user.id)?;
    Ok(Session { user, token })
}

pub fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((JWT_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.mode.is_production())
        .max_age(Duration::days(state.config.jwt.cookie_days))
        .build()
}

pub fn logout_cookie() -> Cookie<'static> {
    Cookie::build((JWT_COOKIE, LOGGED_OUT))
        .path("/")
        .http_only(true)
        .max_age(LOGOUT_COOKIE_TTL)
        .build()
}

#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn signup(state: &AppState, req: SignupRequest) -> AppResult<Session> {
    let password_hash = password::hash(req.password).await?;
    let user = state
        .users
        .create(NewUser {
            name: req.name.trim().to_string(),
            email: normalize_email(&req.email),
            password_hash,
            role: Role::User,
        })
        .await?;
    info!(user_id = %user.id, "user signed up");
    start_session(state, user)
}

#[instrument(skip_all)]
pub async fn login(
    state: &AppState,
    email: Option<String>,
    plain: Option<String>,
) -> AppResult<Session> {
    let (Some(email), Some(plain)) = (
        email.filter(|e| !e.trim().is_empty()),
        plain.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::bad_request("Need an email and a password."));
    };

    let invalid = || AppError::unauthorized("Invalid credential.");
    let user = state
        .users
        .find_by_email(&normalize_email(&email))
        .await?
        .ok_or_else(invalid)?;
    if !password::verify(plain, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(invalid());
    }
    info!(user_id = %user.id, "user logged in");
    start_session(state, user)
}

/// Page link carrying the reset query; both values are percent-encoded.
pub fn reset_link(public_url: &str, email: &str, token: &str) -> String {
    format!(
        "{}/resetPassword?email={}&token={}",
        public_url.trim_end_matches('/'),
        urlencoding::encode(email),
        urlencoding::encode(token),
    )
}

/// Issues and mails a reset token. A failed send clears the ticket again.
#[instrument(skip(state))]
pub async fn forgot_password(state: &AppState, email: &str) -> AppResult<()> {
    let user = state
        .users
        .find_by_email(&normalize_email(email))
        .await?
        .ok_or_else(|| AppError::not_found("There is no user with that email address."))?;

    let now = OffsetDateTime::now_utc();
    let issued = tokio::task::spawn_blocking(move || issue_reset_token(now))
        .await
        .map_err(|e| AppError::internal(format!("reset token task failed: {e}")))??;
    state.users.set_reset_ticket(user.id, Some(issued.ticket)).await?;

    let reset_url = reset_link(&state.config.mail.public_url, &user.email, &issued.plain);
    let mail = password_reset_mail(&user.name, &user.email, &reset_url);

    if let Err(e) = state.mailer.send(mail).await {
        error!(user_id = %user.id, error = %e, "reset mail failed; clearing ticket");
        state.users.set_reset_ticket(user.id, None).await?;
        return Err(AppError::operational(
            StatusCode::INTERNAL_SERVER_ERROR,
            "There was an error sending the email. Try again later!",
        ));
    }
    info!(user_id = %user.id, "reset token sent");
    Ok(())
}

#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn reset_password(state: &AppState, req: ResetPasswordRequest) -> AppResult<Session> {
    let invalid = || AppError::bad_request("Token is invalid or has expired.");
    let user = state
        .users
        .find_by_email(&normalize_email(&req.email))
        .await?
        .ok_or_else(invalid)?;

    let now = OffsetDateTime::now_utc();
    let token = req.token;
    let candidate = user.clone();
    let valid = tokio::task::spawn_blocking(move || verify_reset_token(&candidate, &token, now))
        .await
        .map_err(|e| AppError::internal(format!("reset verification task failed: {e}")))?;
    let Some(ticket) = user.reset.as_ref().filter(|_| valid) else {
        return Err(invalid());
    };
    // concurrent resets with the same token race here; only one clears the ticket
    if !state
        .users
        .consume_reset_ticket(user.id, &ticket.token_hash)
        .await?
    {
        warn!(user_id = %user.id, "reset token already consumed");
        return Err(invalid());
    }

    let hash = password::hash(req.password).await?;
    let changed_at = password_changed_stamp();
    state.users.set_password(user.id, &hash, changed_at).await?;
    info!(user_id = %user.id, "password reset");

    let user = User {
        password_hash: hash,
        password_changed_at: Some(changed_at),
        reset: None,
        ..user
    };
    start_session(state, user)
}

#[instrument(skip(state, caller, req), fields(user_id = %caller.id))]
pub async fn update_password(
    state: &AppState,
    caller: User,
    req: UpdatePasswordRequest,
) -> AppResult<Session> {
    if !password::verify(req.password_current, caller.password_hash.clone()).await? {
        return Err(AppError::unauthorized("Your current password is wrong."));
    }
    let hash = password::hash(req.password).await?;
    let changed_at = password_changed_stamp();
    state.users.set_password(caller.id, &hash, changed_at).await?;
    info!("password updated");

    let user = User {
        password_hash: hash,
        password_changed_at: Some(changed_at),
        reset: None,
        ..caller
    };
    start_session(state, user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_encodes_the_address() {
        let link = reset_link("http://localhost:8080/", "a+b&c#d@example.com", "beef01");
        assert_eq!(
            link,
            "http://localhost:8080/resetPassword?email=a%2Bb%26c%23d%40example.com&token=beef01"
        );
    }
}
