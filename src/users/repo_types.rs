use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_PHOTO: &str = "default.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[default]
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "guide" => Ok(Role::Guide),
            "lead-guide" => Ok(Role::LeadGuide),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// User row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: String,
    pub password_hash: String,
    pub password_changed_at: Option<OffsetDateTime>,
    pub password_reset_hash: Option<String>,
    pub password_reset_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Pending password reset: argon2 hash of the mailed token plus its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetTicket {
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_changed_at: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub reset: Option<ResetTicket>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    /// True when the password changed after a token issued at `issued_at` (unix seconds).
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .map(|changed| changed.unix_timestamp() > issued_at)
            .unwrap_or(false)
    }
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        let reset = match (r.password_reset_hash, r.password_reset_expires_at) {
            (Some(token_hash), Some(expires_at)) => Some(ResetTicket {
                token_hash,
                expires_at,
            }),
            _ => None,
        };
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            photo: r.photo,
            role: r.role.parse().unwrap_or_default(),
            password_hash: r.password_hash,
            password_changed_at: r.password_changed_at,
            reset,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
}
