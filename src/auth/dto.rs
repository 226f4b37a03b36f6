use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::users::repo_types::User;

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[\p{L} ]+$").expect("static regex");
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if NAME_RE.is_match(name.trim()) {
        return Ok(());
    }
    let mut err = ValidationError::new("name");
    err.message = Some(Cow::Borrowed("A name can only contain letters and spaces."));
    Err(err)
}

fn confirmation_mismatch() -> ValidationError {
    let mut err = ValidationError::new("passwordConfirm");
    err.message = Some(Cow::Borrowed("Passwords are not the same."));
    err
}

fn signup_passwords_match(req: &SignupRequest) -> Result<(), ValidationError> {
    if req.password == req.password_confirm {
        Ok(())
    } else {
        Err(confirmation_mismatch())
    }
}

fn reset_passwords_match(req: &ResetPasswordRequest) -> Result<(), ValidationError> {
    if req.password == req.password_confirm {
        Ok(())
    } else {
        Err(confirmation_mismatch())
    }
}

fn update_passwords_match(req: &UpdatePasswordRequest) -> Result<(), ValidationError> {
    if req.password == req.password_confirm {
        Ok(())
    } else {
        Err(confirmation_mismatch())
    }
}

/// Request body for `POST /users/signup`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "signup_passwords_match", skip_on_field_errors = false))]
pub struct SignupRequest {
    #[validate(
        length(min = 1, message = "A user must have a name."),
        custom(function = "validate_name")
    )]
    pub name: String,
    #[validate(email(message = "Please provide a valid email."))]
    pub email: String,
    #[validate(length(min = 8, message = "A password must have at least 8 characters."))]
    pub password: String,
    pub password_confirm: String,
}

/// Login fields are optional so a missing one gets its own message.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Please provide a valid email."))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "reset_passwords_match", skip_on_field_errors = false))]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Please provide a valid email."))]
    pub email: String,
    #[validate(length(min = 1, message = "Token is invalid or has expired."))]
    pub token: String,
    #[validate(length(min = 8, message = "A password must have at least 8 characters."))]
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "update_passwords_match", skip_on_field_errors = false))]
pub struct UpdatePasswordRequest {
    pub password_current: String,
    #[validate(length(min = 8, message = "A password must have at least 8 characters."))]
    pub password: String,
    pub password_confirm: String,
}

/// `data` of every response that logs a user in.
#[derive(Debug, Serialize)]
pub struct SessionData {
    pub user: User,
}
