use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::{Date, Month, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::{DifficultyStats, MonthlyStarts, Tour, TourDraft, TourRow, TOUR_FIELDS};
use crate::{
    db::map_db_error,
    error::{AppError, AppResult},
    query::{sql, QueryDescriptor},
};

#[async_trait]
pub trait TourStore: Send + Sync {
    async fn query(&self, descriptor: &QueryDescriptor) -> AppResult<Vec<Tour>>;
    async fn find(&self, id: Uuid) -> AppResult<Option<Tour>>;
    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Tour>>;
    async fn create(&self, draft: TourDraft) -> AppResult<Tour>;
    async fn update(&self, id: Uuid, draft: TourDraft) -> AppResult<Option<Tour>>;
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
    async fn set_ratings(&self, id: Uuid, quantity: i32, average: f64) -> AppResult<()>;
    /// Per-difficulty figures over tours rated at least `min_rating`.
    async fn stats(&self, min_rating: f64) -> AppResult<Vec<DifficultyStats>>;
    async fn monthly_starts(&self, year: i32) -> AppResult<Vec<MonthlyStarts>>;
    /// Tours that have a start location.
    async fn located(&self) -> AppResult<Vec<Tour>>;
}

const TOUR_COLUMNS: &str = "id, name, slug, duration, max_group_size, difficulty, ratings_average, \
     ratings_quantity, price, price_discount, summary, description, image_cover, images, \
     start_dates, start_lng, start_lat, start_address, start_description, version, created_at";

/// First instant of `year` and of the year after.
pub fn year_bounds(year: i32) -> AppResult<(OffsetDateTime, OffsetDateTime)> {
    let start = |y: i32| {
        Date::from_calendar_date(y, Month::January, 1)
            .map(|d| d.midnight().assume_utc())
            .map_err(|_| AppError::cast("year", year.to_string()))
    };
    Ok((start(year)?, start(year + 1)?))
}

pub struct PgTourStore {
    db: PgPool,
}

impl PgTourStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn bind_draft<'a>(qb: &mut QueryBuilder<'a, Postgres>, d: TourDraft) {
    let (lng, lat, address, description) = match d.start_location {
        Some(loc) => (Some(loc.lng()), Some(loc.lat()), loc.address, loc.description),
        None => (None, None, None, None),
    };
    let mut values = qb.separated(", ");
    values
        .push_bind(d.name)
        .push_bind(d.slug)
        .push_bind(d.duration)
        .push_bind(d.max_group_size)
        .push_bind(d.difficulty.as_str())
        .push_bind(d.price)
        .push_bind(d.price_discount)
        .push_bind(d.summary)
        .push_bind(d.description)
        .push_bind(d.image_cover)
        .push_bind(d.images)
        .push_bind(d.start_dates)
        .push_bind(lng)
        .push_bind(lat)
        .push_bind(address)
        .push_bind(description);
}

const DRAFT_COLUMNS: &str = "name, slug, duration, max_group_size, difficulty, price, price_discount, \
     summary, description, image_cover, images, start_dates, start_lng, start_lat, \
     start_address, start_description";

#[async_trait]
impl TourStore for PgTourStore {
    async fn query(&self, descriptor: &QueryDescriptor) -> AppResult<Vec<Tour>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {TOUR_COLUMNS} FROM tours"));
        sql::push_filters(&mut qb, descriptor, TOUR_FIELDS)?;
        sql::push_order_and_page(&mut qb, descriptor, TOUR_FIELDS)?;
        let rows = qb
            .build_query_as::<TourRow>()
            .fetch_all(&self.db)
            .await
            .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Tour>> {
        let row = sqlx::query_as::<_, TourRow>(&format!(
            "SELECT {TOUR_COLUMNS} FROM tours WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Tour>> {
        let row = sqlx::query_as::<_, TourRow>(&format!(
            "SELECT {TOUR_COLUMNS} FROM tours WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Into::into))
    }

    async fn create(&self, draft: TourDraft) -> AppResult<Tour> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("INSERT INTO tours ({DRAFT_COLUMNS}) VALUES ("));
        bind_draft(&mut qb, draft);
        qb.push(format!(") RETURNING {TOUR_COLUMNS}"));
        let row = qb
            .build_query_as::<TourRow>()
            .fetch_one(&self.db)
            .await
            .map_err(map_db_error)?;
        Ok(row.into())
    }

    async fn update(&self, id: Uuid, draft: TourDraft) -> AppResult<Option<Tour>> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("UPDATE tours SET ({DRAFT_COLUMNS}) = ROW("));
        bind_draft(&mut qb, draft);
        qb.push("), version = version + 1 WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {TOUR_COLUMNS}"));
        let row = qb
            .build_query_as::<TourRow>()
            .fetch_optional(&self.db)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(Into::into))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM tours WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_ratings(&self, id: Uuid, quantity: i32, average: f64) -> AppResult<()> {
        sqlx::query("UPDATE tours SET ratings_quantity = $2, ratings_average = $3 WHERE id = $1")
            .bind(id)
            .bind(quantity)
            .bind(average)
            .execute(&self.db)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn stats(&self, min_rating: f64) -> AppResult<Vec<DifficultyStats>> {
        sqlx::query_as::<_, DifficultyStats>(
            r#"
            SELECT UPPER(difficulty)            AS difficulty,
                   COUNT(*)                     AS num_tours,
                   SUM(ratings_quantity)::INT8  AS num_ratings,
                   AVG(ratings_average)         AS avg_rating,
                   AVG(price)                   AS avg_price,
                   MIN(price)                   AS min_price,
                   MAX(price)                   AS max_price
            FROM tours
            WHERE ratings_average >= $1
            GROUP BY difficulty
            ORDER BY avg_rating DESC
            "#,
        )
        .bind(min_rating)
        .fetch_all(&self.db)
        .await
        .map_err(map_db_error)
    }

    async fn monthly_starts(&self, year: i32) -> AppResult<Vec<MonthlyStarts>> {
        let (from, to) = year_bounds(year)?;
        sqlx::query_as::<_, MonthlyStarts>(
            r#"
            SELECT EXTRACT(MONTH FROM s.starts_at)::INT4 AS month,
                   COUNT(*)                         AS num_tour_starts,
                   ARRAY_AGG(name ORDER BY name)    AS tours
            FROM tours, UNNEST(start_dates) AS s(starts_at)
            WHERE s.starts_at >= $1 AND s.starts_at < $2
            GROUP BY month
            ORDER BY num_tour_starts DESC, month ASC
            LIMIT 12
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.db)
        .await
        .map_err(map_db_error)
    }

    async fn located(&self) -> AppResult<Vec<Tour>> {
        let rows = sqlx::query_as::<_, TourRow>(&format!(
            "SELECT {TOUR_COLUMNS} FROM tours WHERE start_lat IS NOT NULL AND start_lng IS NOT NULL"
        ))
        .fetch_all(&self.db)
        .await
        .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
