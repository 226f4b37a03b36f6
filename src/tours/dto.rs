use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::{Validate, ValidationError};

use super::repo_types::{Difficulty, Location, TourDraft};
use super::services::slugify;
use crate::{
    error::{AppError, AppResult},
    query::schema::parse_timestamp,
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocationInput {
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
    pub address: Option<String>,
    pub description: Option<String>,
}

impl From<LocationInput> for Location {
    fn from(l: LocationInput) -> Self {
        Location::point(l.coordinates[0], l.coordinates[1], l.address, l.description)
    }
}

fn validate_difficulty(value: &str) -> Result<(), ValidationError> {
    if value.parse::<Difficulty>().is_ok() {
        return Ok(());
    }
    let mut err = ValidationError::new("difficulty");
    err.message = Some(Cow::Borrowed("Difficulty is either: easy, medium, difficult."));
    Err(err)
}

fn validate_location(value: &LocationInput) -> Result<(), ValidationError> {
    let [lng, lat] = value.coordinates;
    if (-180.0..=180.0).contains(&lng) && (-90.0..=90.0).contains(&lat) {
        return Ok(());
    }
    let mut err = ValidationError::new("coordinates");
    err.message = Some(Cow::Borrowed(
        "Coordinates must be [longitude, latitude] within valid ranges.",
    ));
    Err(err)
}

pub fn discount_error(discount: f64) -> AppError {
    AppError::field(
        "priceDiscount",
        format!("The discount price ({discount}) should be below the regular price."),
    )
}

fn parse_dates(raw: &[String]) -> AppResult<Vec<OffsetDateTime>> {
    raw.iter()
        .map(|d| parse_timestamp(d.trim()).ok_or_else(|| AppError::cast("startDates", d.as_str())))
        .collect()
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTourRequest {
    #[validate(length(
        min = 10,
        max = 40,
        message = "A tour name must have between 10 and 40 characters."
    ))]
    pub name: String,
    #[validate(range(min = 1, message = "A tour must last at least one day."))]
    pub duration: i32,
    #[validate(range(min = 1, message = "A tour group must have at least one person."))]
    pub max_group_size: i32,
    #[validate(custom(function = "validate_difficulty"))]
    pub difficulty: String,
    #[validate(range(min = 0.0, message = "A tour price cannot be negative."))]
    pub price: f64,
    pub price_discount: Option<f64>,
    #[validate(length(min = 1, message = "A tour must have a summary."))]
    pub summary: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "A tour must have a cover image."))]
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<String>,
    #[validate(custom(function = "validate_location"))]
    pub start_location: Option<LocationInput>,
}

impl CreateTourRequest {
    pub fn into_draft(self) -> AppResult<TourDraft> {
        let draft = TourDraft {
            slug: slugify(&self.name),
            name: self.name.trim().to_string(),
            duration: self.duration,
            max_group_size: self.max_group_size,
            difficulty: self
                .difficulty
                .parse()
                .map_err(|_| AppError::cast("difficulty", &self.difficulty))?,
            price: self.price,
            price_discount: self.price_discount,
            summary: self.summary.trim().to_string(),
            description: self.description.map(|d| d.trim().to_string()),
            image_cover: self.image_cover,
            images: self.images,
            start_dates: parse_dates(&self.start_dates)?,
            start_location: self.start_location.map(Into::into),
        };
        ensure_discount(&draft)?;
        Ok(draft)
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTourRequest {
    #[validate(length(
        min = 10,
        max = 40,
        message = "A tour name must have between 10 and 40 characters."
    ))]
    pub name: Option<String>,
    #[validate(range(min = 1, message = "A tour must last at least one day."))]
    pub duration: Option<i32>,
    #[validate(range(min = 1, message = "A tour group must have at least one person."))]
    pub max_group_size: Option<i32>,
    #[validate(custom(function = "validate_difficulty"))]
    pub difficulty: Option<String>,
    #[validate(range(min = 0.0, message = "A tour price cannot be negative."))]
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    #[validate(length(min = 1, message = "A tour must have a summary."))]
    pub summary: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "A tour must have a cover image."))]
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<String>>,
    #[validate(custom(function = "validate_location"))]
    pub start_location: Option<LocationInput>,
}

impl UpdateTourRequest {
    /// Overlays the provided fields; the result is checked as a whole.
    pub fn apply(self, draft: &mut TourDraft) -> AppResult<()> {
        if let Some(name) = self.name {
            draft.slug = slugify(&name);
            draft.name = name.trim().to_string();
        }
        if let Some(v) = self.duration {
            draft.duration = v;
        }
        if let Some(v) = self.max_group_size {
            draft.max_group_size = v;
        }
        if let Some(v) = self.difficulty {
            draft.difficulty = v.parse().map_err(|_| AppError::cast("difficulty", &v))?;
        }
        if let Some(v) = self.price {
            draft.price = v;
        }
        if let Some(v) = self.price_discount {
            draft.price_discount = Some(v);
        }
        if let Some(v) = self.summary {
            draft.summary = v.trim().to_string();
        }
        if let Some(v) = self.description {
            draft.description = Some(v.trim().to_string());
        }
        if let Some(v) = self.image_cover {
            draft.image_cover = v;
        }
        if let Some(v) = self.images {
            draft.images = v;
        }
        if let Some(v) = self.start_dates {
            draft.start_dates = parse_dates(&v)?;
        }
        if let Some(v) = self.start_location {
            draft.start_location = Some(v.into());
        }
        ensure_discount(draft)
    }
}

pub fn ensure_discount(draft: &TourDraft) -> AppResult<()> {
    match draft.price_discount {
        Some(discount) if discount < 0.0 || discount >= draft.price => {
            Err(discount_error(discount))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_body() -> serde_json::Value {
        json!({
            "name": "The Sea Explorer",
            "duration": 7,
            "maxGroupSize": 15,
            "difficulty": "medium",
            "price": 497,
            "summary": "Exploring the jaw-dropping US east coast by foot and by boat",
            "imageCover": "tour-2-cover.jpg",
            "startDates": ["2021-06-19T09:00:00Z", "2021-07-20"],
            "startLocation": {"coordinates": [-80.185942, 25.774772], "address": "Miami, USA"}
        })
    }

    #[test]
    fn create_request_becomes_draft() {
        let req: CreateTourRequest = serde_json::from_value(create_body()).expect("deserialize");
        req.validate().expect("valid");
        let draft = req.into_draft().expect("draft");
        assert_eq!(draft.slug, "the-sea-explorer");
        assert_eq!(draft.difficulty, Difficulty::Medium);
        assert_eq!(draft.start_dates.len(), 2);
        assert_eq!(draft.start_location.map(|l| l.lat()), Some(25.774772));
    }

    #[test]
    fn invalid_fields_collect_every_message() {
        let mut body = create_body();
        body["name"] = json!("Short");
        body["difficulty"] = json!("extreme");
        let req: CreateTourRequest = serde_json::from_value(body).expect("deserialize");
        let err = AppError::from(req.validate().unwrap_err());
        let msg = err.to_string();
        assert!(msg.contains("Difficulty is either: easy, medium, difficult."));
        assert!(msg.contains("between 10 and 40 characters"));
    }

    #[test]
    fn discount_must_stay_below_price() {
        let mut body = create_body();
        body["priceDiscount"] = json!(600);
        let req: CreateTourRequest = serde_json::from_value(body).expect("deserialize");
        let err = req.into_draft().unwrap_err();
        assert!(err.to_string().contains("(600)"));
    }

    #[test]
    fn update_is_checked_against_merged_values() {
        let req: CreateTourRequest = serde_json::from_value(create_body()).expect("deserialize");
        let mut draft = req.into_draft().expect("draft");

        let lower_price = UpdateTourRequest {
            price: Some(100.0),
            price_discount: Some(150.0),
            ..Default::default()
        };
        assert!(lower_price.apply(&mut draft.clone()).is_err());

        let rename = UpdateTourRequest {
            name: Some("The Coastal Explorer".into()),
            ..Default::default()
        };
        rename.apply(&mut draft).expect("apply");
        assert_eq!(draft.slug, "the-coastal-explorer");
    }

    #[test]
    fn bad_start_date_is_a_cast_error() {
        let mut body = create_body();
        body["startDates"] = json!(["next summer"]);
        let req: CreateTourRequest = serde_json::from_value(body).expect("deserialize");
        assert_eq!(
            req.into_draft().unwrap_err().to_string(),
            "The startDates: next summer is invalid."
        );
    }
}
