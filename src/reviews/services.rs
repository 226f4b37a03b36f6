use tracing::{info, instrument};
use uuid::Uuid;

use super::repo_types::{NewReview, Review, ReviewPatch};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
    tours::repo_types::DEFAULT_RATINGS_AVERAGE,
    users::repo_types::{Role, User},
};

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn review_not_found() -> AppError {
    AppError::not_found("No review found with that ID.")
}

/// Recomputes a tour's rating pair from every review it has.
#[instrument(skip(state))]
pub async fn recalculate_ratings(state: &AppState, tour_id: Uuid) -> AppResult<()> {
    let summary = state.reviews.summary(tour_id).await?;
    let (quantity, average) = match summary.average {
        Some(avg) if summary.quantity > 0 => (summary.quantity, round2(avg)),
        _ => (0, DEFAULT_RATINGS_AVERAGE),
    };
    let quantity = i32::try_from(quantity).unwrap_or(i32::MAX);
    state.tours.set_ratings(tour_id, quantity, average).await?;
    info!(%tour_id, quantity, average, "tour ratings recalculated");
    Ok(())
}

fn ensure_can_modify(caller: &User, review: &Review) -> AppResult<()> {
    if caller.role == Role::Admin || review.author.id == caller.id {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "You do not have permission to perform this action",
        ))
    }
}

pub async fn create(
    state: &AppState,
    author: &User,
    tour_id: Uuid,
    review: String,
    rating: f64,
) -> AppResult<Review> {
    if state.tours.find(tour_id).await?.is_none() {
        return Err(AppError::not_found("No tour found with that ID."));
    }
    let created = state
        .reviews
        .create(NewReview {
            review: review.trim().to_string(),
            rating,
            tour_id,
            author_id: author.id,
        })
        .await?;
    recalculate_ratings(state, tour_id).await?;
    Ok(created)
}

pub async fn update(
    state: &AppState,
    caller: &User,
    id: Uuid,
    patch: ReviewPatch,
) -> AppResult<Review> {
    let existing = state.reviews.find(id).await?.ok_or_else(review_not_found)?;
    ensure_can_modify(caller, &existing)?;
    let updated = state
        .reviews
        .update(id, patch)
        .await?
        .ok_or_else(review_not_found)?;
    recalculate_ratings(state, updated.tour).await?;
    Ok(updated)
}

pub async fn delete(state: &AppState, caller: &User, id: Uuid) -> AppResult<()> {
    let existing = state.reviews.find(id).await?.ok_or_else(review_not_found)?;
    ensure_can_modify(caller, &existing)?;
    let removed = state.reviews.delete(id).await?.ok_or_else(review_not_found)?;
    recalculate_ratings(state, removed.tour).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tours::repo_types::{Difficulty, TourDraft};
    use crate::users::repo_types::NewUser;
    use axum::http::StatusCode;

    async fn user(state: &AppState, email: &str, role: Role) -> User {
        state
            .users
            .create(NewUser {
                name: "Reviewer".into(),
                email: email.into(),
                password_hash: "hash".into(),
                role,
            })
            .await
            .expect("create user")
    }

    async fn tour(state: &AppState) -> Uuid {
        state
            .tours
            .create(TourDraft {
                name: "The Northern Lights".into(),
                slug: "the-northern-lights".into(),
                duration: 3,
                max_group_size: 12,
                difficulty: Difficulty::Easy,
                price: 1497.0,
                price_discount: None,
                summary: "Enjoy the Northern Lights in one of the best places in the world".into(),
                description: None,
                image_cover: "tour-9-cover.jpg".into(),
                images: vec![],
                start_dates: vec![],
                start_location: None,
            })
            .await
            .expect("create tour")
            .id
    }

    async fn ratings(state: &AppState, id: Uuid) -> (i32, f64) {
        let t = state.tours.find(id).await.expect("find").expect("tour");
        (t.ratings_quantity, t.ratings_average)
    }

    #[tokio::test]
    async fn every_mutation_recomputes_ratings() {
        let state = AppState::fake();
        let tour_id = tour(&state).await;
        let a = user(&state, "a@example.com", Role::User).await;
        let b = user(&state, "b@example.com", Role::User).await;

        let first = create(&state, &a, tour_id, "Great".into(), 5.0).await.expect("review");
        create(&state, &b, tour_id, "Fine".into(), 4.0).await.expect("review");
        assert_eq!(ratings(&state, tour_id).await, (2, 4.5));

        let patch = ReviewPatch {
            rating: Some(2.0),
            ..Default::default()
        };
        update(&state, &a, first.id, patch).await.expect("update");
        assert_eq!(ratings(&state, tour_id).await, (2, 3.0));

        delete(&state, &a, first.id).await.expect("delete");
        assert_eq!(ratings(&state, tour_id).await, (1, 4.0));
    }

    #[tokio::test]
    async fn last_review_removed_resets_to_default() {
        let state = AppState::fake();
        let tour_id = tour(&state).await;
        let a = user(&state, "a@example.com", Role::User).await;
        let r = create(&state, &a, tour_id, "Meh".into(), 1.0).await.expect("review");
        delete(&state, &a, r.id).await.expect("delete");
        assert_eq!(ratings(&state, tour_id).await, (0, DEFAULT_RATINGS_AVERAGE));
    }

    #[tokio::test]
    async fn only_author_or_admin_may_modify() {
        let state = AppState::fake();
        let tour_id = tour(&state).await;
        let author = user(&state, "a@example.com", Role::User).await;
        let other = user(&state, "o@example.com", Role::User).await;
        let admin = user(&state, "admin@example.com", Role::Admin).await;
        let r = create(&state, &author, tour_id, "Nice".into(), 4.0).await.expect("review");

        let err = delete(&state, &other, r.id).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        delete(&state, &admin, r.id).await.expect("admin delete");
    }

    #[tokio::test]
    async fn review_on_missing_tour_is_404() {
        let state = AppState::fake();
        let a = user(&state, "a@example.com", Role::User).await;
        let err = create(&state, &a, Uuid::new_v4(), "Hm".into(), 3.0).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn one_review_per_author_and_tour() {
        let state = AppState::fake();
        let tour_id = tour(&state).await;
        let a = user(&state, "a@example.com", Role::User).await;
        create(&state, &a, tour_id, "One".into(), 4.0).await.expect("review");
        let err = create(&state, &a, tour_id, "Two".into(), 5.0).await.unwrap_err();
        assert_eq!(err.to_string(), "The [tour,author]: must be unique.");
    }
}
