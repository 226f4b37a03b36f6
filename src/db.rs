use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::warn;

use crate::error::AppError;

/// Unique constraints declared in `migrations/`, with the API fields they cover.
const UNIQUE_CONSTRAINTS: &[(&str, &[&str])] = &[
    ("users_email_key", &["email"]),
    ("tours_name_key", &["name"]),
    ("tours_slug_key", &["slug"]),
    ("reviews_tour_author_key", &["tour", "author"]),
];

const FOREIGN_KEYS: &[(&str, &str, &str)] = &[
    ("reviews_tour_id_fkey", "tour", "The review must belong to an existing tour."),
    ("reviews_author_id_fkey", "author", "The review must belong to an existing user."),
];

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")
}

fn unique_fields(constraint: Option<&str>) -> Vec<String> {
    constraint
        .and_then(|name| UNIQUE_CONSTRAINTS.iter().find(|(c, _)| *c == name))
        .map(|(_, fields)| fields.iter().map(|f| f.to_string()).collect())
        .unwrap_or_else(|| vec!["value".to_string()])
}

/// Classifies a store failure where it happens.
pub fn map_db_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return AppError::DuplicateKey {
                fields: unique_fields(db_err.constraint()),
            };
        }
        if db_err.is_foreign_key_violation() {
            if let Some((_, field, message)) = db_err
                .constraint()
                .and_then(|name| FOREIGN_KEYS.iter().find(|(c, _, _)| *c == name))
            {
                return AppError::field(*field, *message);
            }
        }
        if db_err.is_check_violation() {
            warn!(constraint = ?db_err.constraint(), "check constraint violated");
            return AppError::bad_request(format!(
                "The value violates {}.",
                db_err.constraint().unwrap_or("a table constraint")
            ));
        }
    }
    AppError::Internal(anyhow::Error::new(err).context("database query failed"))
}
