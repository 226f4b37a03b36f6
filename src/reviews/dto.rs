use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(length(
        min = 1,
        max = 500,
        message = "A review must have between 1 and 500 characters."
    ))]
    pub review: String,
    #[validate(range(min = 1.0, max = 5.0, message = "A rating must be between 1 and 5."))]
    pub rating: f64,
    /// Only read on `/reviews`; the nested route takes the tour from the path.
    pub tour: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(length(
        min = 1,
        max = 500,
        message = "A review must have between 1 and 500 characters."
    ))]
    pub review: Option<String>,
    #[validate(range(min = 1.0, max = 5.0, message = "A rating must be between 1 and 5."))]
    pub rating: Option<f64>,
}
