use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{NewUser, ProfileUpdate, ResetTicket, User, UserRow};
use crate::{db::map_db_error, error::AppResult};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new: NewUser) -> AppResult<User>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn list(&self) -> AppResult<Vec<User>>;
    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> AppResult<Option<User>>;
    /// Stores a new hash, stamps the change time and drops any pending reset.
    async fn set_password(&self, id: Uuid, hash: &str, changed_at: OffsetDateTime) -> AppResult<()>;
    async fn set_reset_ticket(&self, id: Uuid, ticket: Option<ResetTicket>) -> AppResult<()>;
    /// Clears the pending reset only if it still carries `token_hash`.
    /// Returns whether this call was the one that cleared it.
    async fn consume_reset_ticket(&self, id: Uuid, token_hash: &str) -> AppResult<bool>;
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

const USER_COLUMNS: &str = "id, name, email, photo, role, password_hash, password_changed_at, \
                            password_reset_hash, password_reset_expires_at, created_at";

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new: NewUser) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Into::into))
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET name = COALESCE($2, name), email = COALESCE($3, email), \
             photo = COALESCE($4, photo) WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.email)
        .bind(update.photo)
        .fetch_optional(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Into::into))
    }

    async fn set_password(
        &self,
        id: Uuid,
        hash: &str,
        changed_at: OffsetDateTime,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2,
                password_changed_at = $3,
                password_reset_hash = NULL,
                password_reset_expires_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(hash)
        .bind(changed_at)
        .execute(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn set_reset_ticket(&self, id: Uuid, ticket: Option<ResetTicket>) -> AppResult<()> {
        let (hash, expires_at) = match ticket {
            Some(t) => (Some(t.token_hash), Some(t.expires_at)),
            None => (None, None),
        };
        sqlx::query(
            r#"
            UPDATE users
            SET password_reset_hash = $2, password_reset_expires_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(hash)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn consume_reset_ticket(&self, id: Uuid, token_hash: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_reset_hash = NULL, password_reset_expires_at = NULL
            WHERE id = $1 AND password_reset_hash = $2
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .execute(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }
}
