use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

use crate::query::{FieldKind, FieldSpec};

pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

/// Fields a client may filter and sort tours on.
pub const TOUR_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("name", "name", FieldKind::Text),
    FieldSpec::new("slug", "slug", FieldKind::Text),
    FieldSpec::new("duration", "duration", FieldKind::Integer),
    FieldSpec::new("maxGroupSize", "max_group_size", FieldKind::Integer),
    FieldSpec::new("difficulty", "difficulty", FieldKind::Text),
    FieldSpec::new("ratingsAverage", "ratings_average", FieldKind::Float),
    FieldSpec::new("ratingsQuantity", "ratings_quantity", FieldKind::Integer),
    FieldSpec::new("price", "price", FieldKind::Float),
    FieldSpec::new("priceDiscount", "price_discount", FieldKind::Float),
    FieldSpec::new("summary", "summary", FieldKind::Text),
    FieldSpec::new("createdAt", "created_at", FieldKind::Timestamp),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "difficult" => Ok(Difficulty::Difficult),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Location {
    pub fn point(lng: f64, lat: f64, address: Option<String>, description: Option<String>) -> Self {
        Self {
            kind: "Point",
            coordinates: [lng, lat],
            address,
            description,
        }
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TourRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: String,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<OffsetDateTime>,
    pub start_lng: Option<f64>,
    pub start_lat: Option<f64>,
    pub start_address: Option<String>,
    pub start_description: Option<String>,
    pub version: i32,
    pub created_at: OffsetDateTime,
}

fn rfc3339_list<S: Serializer>(dates: &[OffsetDateTime], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(dates.iter().filter_map(|d| d.format(&Rfc3339).ok()))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub duration_weeks: f64,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    #[serde(serialize_with = "rfc3339_list")]
    pub start_dates: Vec<OffsetDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_location: Option<Location>,
    pub version: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

fn weeks(days: i32) -> f64 {
    (days as f64 / 7.0 * 100.0).round() / 100.0
}

impl From<TourRow> for Tour {
    fn from(r: TourRow) -> Self {
        let start_location = match (r.start_lng, r.start_lat) {
            (Some(lng), Some(lat)) => Some(Location::point(
                lng,
                lat,
                r.start_address,
                r.start_description,
            )),
            _ => None,
        };
        Self {
            id: r.id,
            duration_weeks: weeks(r.duration),
            name: r.name,
            slug: r.slug,
            duration: r.duration,
            max_group_size: r.max_group_size,
            difficulty: r.difficulty.parse().unwrap_or(Difficulty::Medium),
            ratings_average: r.ratings_average,
            ratings_quantity: r.ratings_quantity,
            price: r.price,
            price_discount: r.price_discount,
            summary: r.summary,
            description: r.description,
            image_cover: r.image_cover,
            images: r.images,
            start_dates: r.start_dates,
            start_location,
            version: r.version,
            created_at: r.created_at,
        }
    }
}

/// Every field a write may set; ratings stay with the aggregation service.
#[derive(Debug, Clone, PartialEq)]
pub struct TourDraft {
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<OffsetDateTime>,
    pub start_location: Option<Location>,
}

impl From<&Tour> for TourDraft {
    fn from(t: &Tour) -> Self {
        Self {
            name: t.name.clone(),
            slug: t.slug.clone(),
            duration: t.duration,
            max_group_size: t.max_group_size,
            difficulty: t.difficulty,
            price: t.price,
            price_discount: t.price_discount,
            summary: t.summary.clone(),
            description: t.description.clone(),
            image_cover: t.image_cover.clone(),
            images: t.images.clone(),
            start_dates: t.start_dates.clone(),
            start_location: t.start_location.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStats {
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStarts {
    pub month: i32,
    pub num_tour_starts: i64,
    pub tours: Vec<String>,
}
