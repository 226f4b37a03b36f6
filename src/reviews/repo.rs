use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::repo_types::{NewReview, RatingSummary, Review, ReviewFilter, ReviewPatch, ReviewRow};
use crate::{db::map_db_error, error::AppResult};

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn list(&self, filter: ReviewFilter) -> AppResult<Vec<Review>>;
    async fn find(&self, id: Uuid) -> AppResult<Option<Review>>;
    async fn create(&self, new: NewReview) -> AppResult<Review>;
    async fn update(&self, id: Uuid, patch: ReviewPatch) -> AppResult<Option<Review>>;
    /// Returns the removed review so its tour can be re-rated.
    async fn delete(&self, id: Uuid) -> AppResult<Option<Review>>;
    async fn summary(&self, tour_id: Uuid) -> AppResult<RatingSummary>;
}

const REVIEW_SELECT: &str = "r.id, r.review, r.rating, r.tour_id, r.author_id, \
     u.name AS author_name, u.photo AS author_photo, r.created_at";

pub struct PgReviewStore {
    db: PgPool,
}

impl PgReviewStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReviewStore for PgReviewStore {
    async fn list(&self, filter: ReviewFilter) -> AppResult<Vec<Review>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {REVIEW_SELECT} FROM reviews r JOIN users u ON u.id = r.author_id WHERE TRUE"
        ));
        if let Some(tour) = filter.tour {
            qb.push(" AND r.tour_id = ").push_bind(tour);
        }
        if let Some(author) = filter.author {
            qb.push(" AND r.author_id = ").push_bind(author);
        }
        qb.push(" ORDER BY r.created_at DESC");
        let rows = qb
            .build_query_as::<ReviewRow>()
            .fetch_all(&self.db)
            .await
            .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_SELECT} FROM reviews r \
             JOIN users u ON u.id = r.author_id WHERE r.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Into::into))
    }

    async fn create(&self, new: NewReview) -> AppResult<Review> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r#"
            WITH r AS (
                INSERT INTO reviews (review, rating, tour_id, author_id)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT {REVIEW_SELECT} FROM r JOIN users u ON u.id = r.author_id
            "#
        ))
        .bind(&new.review)
        .bind(new.rating)
        .bind(new.tour_id)
        .bind(new.author_id)
        .fetch_one(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(row.into())
    }

    async fn update(&self, id: Uuid, patch: ReviewPatch) -> AppResult<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r#"
            WITH r AS (
                UPDATE reviews
                SET review = COALESCE($2, review), rating = COALESCE($3, rating)
                WHERE id = $1
                RETURNING *
            )
            SELECT {REVIEW_SELECT} FROM r JOIN users u ON u.id = r.author_id
            "#
        ))
        .bind(id)
        .bind(patch.review)
        .bind(patch.rating)
        .fetch_optional(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Into::into))
    }

    async fn delete(&self, id: Uuid) -> AppResult<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r#"
            WITH r AS (DELETE FROM reviews WHERE id = $1 RETURNING *)
            SELECT {REVIEW_SELECT} FROM r JOIN users u ON u.id = r.author_id
            "#
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Into::into))
    }

    async fn summary(&self, tour_id: Uuid) -> AppResult<RatingSummary> {
        sqlx::query_as::<_, RatingSummary>(
            "SELECT COUNT(*) AS quantity, AVG(rating) AS average FROM reviews WHERE tour_id = $1",
        )
        .bind(tour_id)
        .fetch_one(&self.db)
        .await
        .map_err(map_db_error)
    }
}
