use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Review joined with the author's public fields.
#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    pub id: Uuid,
    pub review: String,
    pub rating: f64,
    pub tour_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub author_photo: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Author {
    pub id: Uuid,
    pub name: String,
    pub photo: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub review: String,
    pub rating: f64,
    pub tour: Uuid,
    pub author: Author,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<ReviewRow> for Review {
    fn from(r: ReviewRow) -> Self {
        Self {
            id: r.id,
            review: r.review,
            rating: r.rating,
            tour: r.tour_id,
            author: Author {
                id: r.author_id,
                name: r.author_name,
                photo: r.author_photo,
            },
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub review: String,
    pub rating: f64,
    pub tour_id: Uuid,
    pub author_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewPatch {
    pub review: Option<String>,
    pub rating: Option<f64>,
}

/// Narrows a listing; `None` matches everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewFilter {
    pub tour: Option<Uuid>,
    pub author: Option<Uuid>,
}

/// Count and mean rating over one tour's reviews.
#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct RatingSummary {
    pub quantity: i64,
    pub average: Option<f64>,
}
