use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub personal_id: Uuid,
    pub student_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Review joined with its author's name for marketplace listings
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewView {
    pub id: Uuid,
    pub personal_id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

/// Rating aggregate written back onto the personal profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, FromRow)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub review_count: i32,
}
