use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use super::repo_types::Tour;
use crate::{
    error::{AppError, AppResult},
    query::QueryParams,
};

const EARTH_RADIUS_KM: f64 = 6371.0;

lazy_static! {
    static ref NON_SLUG: Regex = Regex::new(r"[^a-z0-9]+").expect("static regex");
}

/// `"The Sea Explorer"` -> `"the-sea-explorer"`
pub fn slugify(name: &str) -> String {
    NON_SLUG
        .replace_all(&name.trim().to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Presets the query string of the "top 5 cheap" alias; explicit keys are overwritten.
pub fn cheapest_alias(params: &mut QueryParams) {
    params.set("sort", "price,-ratingsAverage");
    params.set("select", "name,ratingsAverage,price,difficulty,duration");
    params.set("limit", "5");
}

/// Great-circle distance in kilometres.
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lng2) = (to.0.to_radians(), to.1.to_radians());
    let a = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lng2 - lng1) / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Parses a `lat,lng` path segment.
pub fn parse_latlng(raw: &str) -> AppResult<(f64, f64)> {
    let invalid = || AppError::bad_request("A valid latitude and a valid longitude is needed.");
    let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(invalid());
    }
    Ok((lat, lng))
}

pub fn parse_distance(raw: &str) -> AppResult<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| AppError::bad_request("A valid max distance is needed."))
}

fn with_distance(tours: Vec<Tour>, origin: (f64, f64)) -> Vec<(f64, Tour)> {
    let mut measured: Vec<_> = tours
        .into_iter()
        .filter_map(|t| {
            let loc = t.start_location.as_ref()?;
            Some((haversine_km(origin, (loc.lat(), loc.lng())), t))
        })
        .collect();
    measured.sort_by(|a, b| a.0.total_cmp(&b.0));
    measured
}

/// Tours starting within `max_km` of `origin`, nearest first.
pub fn within(tours: Vec<Tour>, origin: (f64, f64), max_km: f64) -> Vec<Tour> {
    with_distance(tours, origin)
        .into_iter()
        .take_while(|(d, _)| *d <= max_km)
        .map(|(_, t)| t)
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct TourDistance {
    pub id: Uuid,
    pub name: String,
    /// kilometres, 2 decimals
    pub distance: f64,
}

pub fn distances(tours: Vec<Tour>, origin: (f64, f64)) -> Vec<TourDistance> {
    with_distance(tours, origin)
        .into_iter()
        .map(|(d, t)| TourDistance {
            id: t.id,
            name: t.name,
            distance: round2(d),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tours::repo_types::{Difficulty, Location};
    use time::OffsetDateTime;

    fn tour_at(name: &str, lat: f64, lng: f64) -> Tour {
        Tour {
            id: Uuid::new_v4(),
            name: name.into(),
            slug: slugify(name),
            duration: 5,
            duration_weeks: 0.71,
            max_group_size: 10,
            difficulty: Difficulty::Easy,
            ratings_average: 4.5,
            ratings_quantity: 0,
            price: 397.0,
            price_discount: None,
            summary: "summary".into(),
            description: None,
            image_cover: "cover.jpg".into(),
            images: vec![],
            start_dates: vec![],
            start_location: Some(Location::point(lng, lat, None, None)),
            version: 0,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn slugs_are_lowercase_and_dashed() {
        assert_eq!(slugify("  The Forest Hiker "), "the-forest-hiker");
        assert_eq!(slugify("The Wine Taster!!"), "the-wine-taster");
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Los Angeles to Miami is roughly 3760 km.
        let d = haversine_km((34.0522, -118.2437), (25.7617, -80.1918));
        assert!((3740.0..3780.0).contains(&d), "{d}");
    }

    #[test]
    fn within_filters_and_orders_by_distance() {
        let origin = (34.11, -118.11);
        let tours = vec![
            tour_at("The Sea Explorer", 25.77, -80.18),
            tour_at("The Park Camper", 36.10, -115.17),
            tour_at("The City Wanderer", 34.05, -118.24),
        ];
        let near = within(tours.clone(), origin, 500.0);
        let names: Vec<_> = near.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["The City Wanderer", "The Park Camper"]);

        let all = distances(tours, origin);
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].name, "The Sea Explorer");
        assert_eq!(all[0].distance, round2(all[0].distance));
    }

    #[test]
    fn latlng_must_be_two_numbers() {
        assert_eq!(parse_latlng("34.11,-118.11").expect("latlng"), (34.11, -118.11));
        assert!(parse_latlng("34.11").is_err());
        assert!(parse_latlng("north,south").is_err());
        assert!(parse_latlng("95,0").is_err());
        assert!(parse_distance("-3").is_err());
        assert_eq!(parse_distance("250").expect("distance"), 250.0);
    }

    #[test]
    fn cheapest_alias_presets_reserved_keys() {
        let mut params = QueryParams::default();
        params.set("limit", "50");
        cheapest_alias(&mut params);
        assert_eq!(params.scalar("limit"), Some("5"));
        assert_eq!(params.scalar("sort"), Some("price,-ratingsAverage"));
    }
}
