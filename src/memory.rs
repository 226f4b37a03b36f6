//! In-memory stores backing the test suite.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    query::{
        schema::{lookup, parse_timestamp},
        Direction, FieldKind, FieldSpec, Operator, QueryDescriptor, Scalar,
    },
    reviews::{
        repo::ReviewStore,
        repo_types::{Author, NewReview, RatingSummary, Review, ReviewFilter, ReviewPatch},
    },
    tours::{
        repo::{year_bounds, TourStore},
        repo_types::{
            DifficultyStats, MonthlyStarts, Tour, TourDraft, DEFAULT_RATINGS_AVERAGE, TOUR_FIELDS,
        },
    },
    users::{
        repo::UserStore,
        repo_types::{NewUser, ProfileUpdate, ResetTicket, User, DEFAULT_PHOTO},
    },
};

fn duplicate(fields: &[&str]) -> AppError {
    AppError::DuplicateKey {
        fields: fields.iter().map(|f| f.to_string()).collect(),
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    fn with_user<T>(&self, id: Uuid, f: impl FnOnce(&mut User) -> T) -> Option<T> {
        let mut users = self.users.lock().expect("users lock");
        users.iter_mut().find(|u| u.id == id).map(f)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser) -> AppResult<User> {
        let mut users = self.users.lock().expect("users lock");
        if users.iter().any(|u| u.email == new.email) {
            return Err(duplicate(&["email"]));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            photo: DEFAULT_PHOTO.to_string(),
            role: new.role,
            password_hash: new.password_hash,
            password_changed_at: None,
            reset: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.with_user(id, |u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let users = self.users.lock().expect("users lock");
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        Ok(self.users.lock().expect("users lock").clone())
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> AppResult<Option<User>> {
        if let Some(email) = &update.email {
            let users = self.users.lock().expect("users lock");
            if users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(duplicate(&["email"]));
            }
        }
        Ok(self.with_user(id, |u| {
            if let Some(name) = update.name {
                u.name = name;
            }
            if let Some(email) = update.email {
                u.email = email;
            }
            if let Some(photo) = update.photo {
                u.photo = photo;
            }
            u.clone()
        }))
    }

    async fn set_password(
        &self,
        id: Uuid,
        hash: &str,
        changed_at: OffsetDateTime,
    ) -> AppResult<()> {
        self.with_user(id, |u| {
            u.password_hash = hash.to_string();
            u.password_changed_at = Some(changed_at);
            u.reset = None;
        });
        Ok(())
    }

    async fn set_reset_ticket(&self, id: Uuid, ticket: Option<ResetTicket>) -> AppResult<()> {
        self.with_user(id, |u| u.reset = ticket);
        Ok(())
    }

    async fn consume_reset_ticket(&self, id: Uuid, token_hash: &str) -> AppResult<bool> {
        Ok(self
            .with_user(id, |u| match &u.reset {
                Some(ticket) if ticket.token_hash == token_hash => {
                    u.reset = None;
                    true
                }
                _ => false,
            })
            .unwrap_or(false))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut users = self.users.lock().expect("users lock");
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() < before)
    }
}

#[derive(Default)]
pub struct MemoryTourStore {
    tours: Mutex<Vec<Tour>>,
}

/// Reads a serialized tour field back as the scalar its column would hold.
fn field_scalar(doc: &Value, spec: &FieldSpec) -> Option<Scalar> {
    let value = doc.get(spec.name)?;
    match spec.kind {
        FieldKind::Text => value.as_str().map(|s| Scalar::Text(s.to_string())),
        FieldKind::Integer => value.as_i64().map(Scalar::Integer),
        FieldKind::Float => value.as_f64().map(Scalar::Float),
        FieldKind::Timestamp => value.as_str().and_then(parse_timestamp).map(Scalar::Timestamp),
    }
}

fn matches(op: Operator, actual: Option<&Scalar>, wanted: &Scalar) -> bool {
    let Some(actual) = actual else {
        // SQL NULL never satisfies a comparison
        return false;
    };
    match (op, actual.partial_cmp(wanted)) {
        (Operator::Eq, Some(o)) => o == Ordering::Equal,
        (Operator::Ne, Some(o)) => o != Ordering::Equal,
        (Operator::Gt, Some(o)) => o == Ordering::Greater,
        (Operator::Gte, Some(o)) => o != Ordering::Less,
        (Operator::Lt, Some(o)) => o == Ordering::Less,
        (Operator::Lte, Some(o)) => o != Ordering::Greater,
        (_, None) => false,
    }
}

fn draft_into(id: Uuid, draft: TourDraft, previous: Option<&Tour>) -> Tour {
    Tour {
        id,
        duration_weeks: (draft.duration as f64 / 7.0 * 100.0).round() / 100.0,
        name: draft.name,
        slug: draft.slug,
        duration: draft.duration,
        max_group_size: draft.max_group_size,
        difficulty: draft.difficulty,
        ratings_average: previous.map_or(DEFAULT_RATINGS_AVERAGE, |p| p.ratings_average),
        ratings_quantity: previous.map_or(0, |p| p.ratings_quantity),
        price: draft.price,
        price_discount: draft.price_discount,
        summary: draft.summary,
        description: draft.description,
        image_cover: draft.image_cover,
        images: draft.images,
        start_dates: draft.start_dates,
        start_location: draft.start_location,
        version: previous.map_or(0, |p| p.version + 1),
        created_at: previous.map_or_else(OffsetDateTime::now_utc, |p| p.created_at),
    }
}

impl MemoryTourStore {
    fn check_unique(tours: &[Tour], id: Option<Uuid>, draft: &TourDraft) -> AppResult<()> {
        let others = || tours.iter().filter(move |t| Some(t.id) != id);
        if others().any(|t| t.name == draft.name) {
            return Err(duplicate(&["name"]));
        }
        if others().any(|t| t.slug == draft.slug) {
            return Err(duplicate(&["slug"]));
        }
        Ok(())
    }
}

#[async_trait]
impl TourStore for MemoryTourStore {
    async fn query(&self, descriptor: &QueryDescriptor) -> AppResult<Vec<Tour>> {
        let mut wanted = Vec::with_capacity(descriptor.filters.len());
        for f in &descriptor.filters {
            let spec = lookup(TOUR_FIELDS, &f.field)?;
            wanted.push((spec, f.op, spec.cast(&f.value)?));
        }
        let mut order = Vec::with_capacity(descriptor.sort.len());
        for key in &descriptor.sort {
            order.push((lookup(TOUR_FIELDS, &key.field)?, key.direction));
        }

        let tours = self.tours.lock().expect("tours lock").clone();
        let mut docs: Vec<(Value, Tour)> = tours
            .into_iter()
            .filter_map(|t| serde_json::to_value(&t).ok().map(|v| (v, t)))
            .filter(|(doc, _)| {
                wanted
                    .iter()
                    .all(|(spec, op, value)| matches(*op, field_scalar(doc, spec).as_ref(), value))
            })
            .collect();

        docs.sort_by(|(a, ta), (b, tb)| {
            for (spec, direction) in &order {
                let ord = field_scalar(a, spec)
                    .partial_cmp(&field_scalar(b, spec))
                    .unwrap_or(Ordering::Equal);
                let ord = match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            ta.id.cmp(&tb.id)
        });

        Ok(docs
            .into_iter()
            .map(|(_, t)| t)
            .skip(usize::try_from(descriptor.skip).unwrap_or(usize::MAX))
            .take(usize::try_from(descriptor.limit).unwrap_or(usize::MAX))
            .collect())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Tour>> {
        let tours = self.tours.lock().expect("tours lock");
        Ok(tours.iter().find(|t| t.id == id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> AppResult<Option<Tour>> {
        let tours = self.tours.lock().expect("tours lock");
        Ok(tours.iter().find(|t| t.slug == slug).cloned())
    }

    async fn create(&self, draft: TourDraft) -> AppResult<Tour> {
        let mut tours = self.tours.lock().expect("tours lock");
        Self::check_unique(&tours, None, &draft)?;
        let tour = draft_into(Uuid::new_v4(), draft, None);
        tours.push(tour.clone());
        Ok(tour)
    }

    async fn update(&self, id: Uuid, draft: TourDraft) -> AppResult<Option<Tour>> {
        let mut tours = self.tours.lock().expect("tours lock");
        Self::check_unique(&tours, Some(id), &draft)?;
        let Some(slot) = tours.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        let next = draft_into(id, draft, Some(&*slot));
        *slot = next.clone();
        Ok(Some(next))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut tours = self.tours.lock().expect("tours lock");
        let before = tours.len();
        tours.retain(|t| t.id != id);
        Ok(tours.len() < before)
    }

    async fn set_ratings(&self, id: Uuid, quantity: i32, average: f64) -> AppResult<()> {
        let mut tours = self.tours.lock().expect("tours lock");
        if let Some(t) = tours.iter_mut().find(|t| t.id == id) {
            t.ratings_quantity = quantity;
            t.ratings_average = average;
        }
        Ok(())
    }

    async fn stats(&self, min_rating: f64) -> AppResult<Vec<DifficultyStats>> {
        let tours = self.tours.lock().expect("tours lock");
        let mut groups: BTreeMap<&'static str, Vec<&Tour>> = BTreeMap::new();
        for t in tours.iter().filter(|t| t.ratings_average >= min_rating) {
            groups.entry(t.difficulty.as_str()).or_default().push(t);
        }
        let mut stats: Vec<_> = groups
            .into_iter()
            .map(|(difficulty, group)| {
                let n = group.len() as f64;
                let prices = group.iter().map(|t| t.price);
                DifficultyStats {
                    difficulty: difficulty.to_uppercase(),
                    num_tours: group.len() as i64,
                    num_ratings: group.iter().map(|t| t.ratings_quantity as i64).sum(),
                    avg_rating: group.iter().map(|t| t.ratings_average).sum::<f64>() / n,
                    avg_price: prices.clone().sum::<f64>() / n,
                    min_price: prices.clone().fold(f64::INFINITY, f64::min),
                    max_price: prices.fold(f64::NEG_INFINITY, f64::max),
                }
            })
            .collect();
        stats.sort_by(|a, b| b.avg_rating.total_cmp(&a.avg_rating));
        Ok(stats)
    }

    async fn monthly_starts(&self, year: i32) -> AppResult<Vec<MonthlyStarts>> {
        let (from, to) = year_bounds(year)?;
        let tours = self.tours.lock().expect("tours lock");
        let mut months: BTreeMap<i32, Vec<String>> = BTreeMap::new();
        for t in tours.iter() {
            for start in t.start_dates.iter().filter(|d| **d >= from && **d < to) {
                months.entry(start.month() as i32).or_default().push(t.name.clone());
            }
        }
        let mut plan: Vec<_> = months
            .into_iter()
            .map(|(month, mut names)| {
                names.sort();
                MonthlyStarts {
                    month,
                    num_tour_starts: names.len() as i64,
                    tours: names,
                }
            })
            .collect();
        plan.sort_by(|a, b| b.num_tour_starts.cmp(&a.num_tour_starts).then(a.month.cmp(&b.month)));
        plan.truncate(12);
        Ok(plan)
    }

    async fn located(&self) -> AppResult<Vec<Tour>> {
        let tours = self.tours.lock().expect("tours lock");
        Ok(tours.iter().filter(|t| t.start_location.is_some()).cloned().collect())
    }
}

struct StoredReview {
    id: Uuid,
    review: String,
    rating: f64,
    tour_id: Uuid,
    author_id: Uuid,
    created_at: OffsetDateTime,
}

/// Joins authors from the user store the way the SQL store does.
pub struct MemoryReviewStore {
    users: Arc<MemoryUserStore>,
    reviews: Mutex<Vec<StoredReview>>,
}

impl MemoryReviewStore {
    pub fn new(users: Arc<MemoryUserStore>) -> Self {
        Self {
            users,
            reviews: Mutex::new(Vec::new()),
        }
    }

    fn populate(&self, r: &StoredReview) -> Option<Review> {
        let author = self.users.with_user(r.author_id, |u| Author {
            id: u.id,
            name: u.name.clone(),
            photo: u.photo.clone(),
        })?;
        Some(Review {
            id: r.id,
            review: r.review.clone(),
            rating: r.rating,
            tour: r.tour_id,
            author,
            created_at: r.created_at,
        })
    }
}

#[async_trait]
impl ReviewStore for MemoryReviewStore {
    async fn list(&self, filter: ReviewFilter) -> AppResult<Vec<Review>> {
        let reviews = self.reviews.lock().expect("reviews lock");
        Ok(reviews
            .iter()
            .rev()
            .filter(|r| filter.tour.map_or(true, |t| r.tour_id == t))
            .filter(|r| filter.author.map_or(true, |a| r.author_id == a))
            .filter_map(|r| self.populate(r))
            .collect())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Review>> {
        let reviews = self.reviews.lock().expect("reviews lock");
        Ok(reviews.iter().find(|r| r.id == id).and_then(|r| self.populate(r)))
    }

    async fn create(&self, new: NewReview) -> AppResult<Review> {
        let mut reviews = self.reviews.lock().expect("reviews lock");
        if reviews
            .iter()
            .any(|r| r.tour_id == new.tour_id && r.author_id == new.author_id)
        {
            return Err(duplicate(&["tour", "author"]));
        }
        let stored = StoredReview {
            id: Uuid::new_v4(),
            review: new.review,
            rating: new.rating,
            tour_id: new.tour_id,
            author_id: new.author_id,
            created_at: OffsetDateTime::now_utc(),
        };
        let review = self
            .populate(&stored)
            .ok_or_else(|| {
                AppError::field("author", "The review must belong to an existing user.")
            })?;
        reviews.push(stored);
        Ok(review)
    }

    async fn update(&self, id: Uuid, patch: ReviewPatch) -> AppResult<Option<Review>> {
        let mut reviews = self.reviews.lock().expect("reviews lock");
        let Some(r) = reviews.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(text) = patch.review {
            r.review = text;
        }
        if let Some(rating) = patch.rating {
            r.rating = rating;
        }
        Ok(self.populate(r))
    }

    async fn delete(&self, id: Uuid) -> AppResult<Option<Review>> {
        let mut reviews = self.reviews.lock().expect("reviews lock");
        let Some(pos) = reviews.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let removed = reviews.remove(pos);
        Ok(self.populate(&removed))
    }

    async fn summary(&self, tour_id: Uuid) -> AppResult<RatingSummary> {
        let reviews = self.reviews.lock().expect("reviews lock");
        let ratings: Vec<f64> = reviews
            .iter()
            .filter(|r| r.tour_id == tour_id)
            .map(|r| r.rating)
            .collect();
        let average =
            (!ratings.is_empty()).then(|| ratings.iter().sum::<f64>() / ratings.len() as f64);
        Ok(RatingSummary {
            quantity: ratings.len() as i64,
            average,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{describe, QueryParams};
    use crate::tours::repo_types::Difficulty;
    use time::format_description::well_known::Rfc3339;

    fn draft(name: &str, price: f64, difficulty: Difficulty) -> TourDraft {
        TourDraft {
            name: name.into(),
            slug: name.to_lowercase().replace(' ', "-"),
            duration: 5,
            max_group_size: 10,
            difficulty,
            price,
            price_discount: None,
            summary: "summary".into(),
            description: None,
            image_cover: "cover.jpg".into(),
            images: vec![],
            start_dates: vec![
                OffsetDateTime::parse("2021-06-01T09:00:00Z", &Rfc3339).expect("date"),
            ],
            start_location: None,
        }
    }

    async fn seeded() -> MemoryTourStore {
        let store = MemoryTourStore::default();
        for (name, price, difficulty) in [
            ("The Forest Hiker", 397.0, Difficulty::Easy),
            ("The Sea Explorer", 497.0, Difficulty::Medium),
            ("The Snow Adventurer", 997.0, Difficulty::Difficult),
        ] {
            store.create(draft(name, price, difficulty)).await.expect("create");
        }
        store
    }

    fn params(items: &[(&str, &str)]) -> QueryParams {
        QueryParams::from_pairs(items.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[tokio::test]
    async fn evaluates_filters_sort_and_page() {
        let store = seeded().await;
        let d = describe(&params(&[("price[gte]", "400"), ("sort", "price")]), 6)
            .expect("descriptor");
        let names: Vec<_> = store
            .query(&d)
            .await
            .expect("query")
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["The Sea Explorer", "The Snow Adventurer"]);

        let d = describe(&params(&[("page", "2"), ("limit", "2")]), 6).expect("descriptor");
        let page = store.query(&d).await.expect("query");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "The Forest Hiker");
    }

    #[tokio::test]
    async fn bad_values_and_fields_fail_like_sql() {
        let store = seeded().await;
        let d = describe(&params(&[("price", "cheap")]), 6).expect("descriptor");
        assert_eq!(
            store.query(&d).await.unwrap_err().to_string(),
            "The price: cheap is invalid."
        );
        let d = describe(&params(&[("passwordHash", "x")]), 6).expect("descriptor");
        assert!(store.query(&d).await.is_err());
    }

    #[tokio::test]
    async fn monthly_plan_groups_by_month() {
        let store = seeded().await;
        let plan = store.monthly_starts(2021).await.expect("plan");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].month, 6);
        assert_eq!(plan[0].num_tour_starts, 3);
        assert!(store.monthly_starts(2022).await.expect("plan").is_empty());
    }
}
