use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::ReviewView;

/// Marketplace profile of a personal trainer
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PersonalProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub bio: Option<String>,
    pub specialties: Vec<String>,
    pub city: Option<String>,
    pub hourly_rate: Option<f64>,
    pub average_rating: f64,
    pub review_count: i32,
    pub accepting_students: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub goal: Option<String>,
    pub personal_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePersonalProfileRequest {
    #[validate(length(min = 1, max = 120))]
    pub display_name: Option<String>,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[validate(length(max = 10))]
    pub specialties: Option<Vec<String>>,
    #[validate(length(min = 1, max = 120))]
    pub city: Option<String>,
    #[validate(range(min = 0.0, max = 10000.0))]
    pub hourly_rate: Option<f64>,
    pub accepting_students: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStudentRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub goal: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PersonalSearchQuery {
    pub specialty: Option<String>,
    pub city: Option<String>,
    pub min_rating: Option<f64>,
    pub max_rate: Option<f64>,
    pub accepting_only: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PersonalDetail {
    pub profile: PersonalProfile,
    pub recent_reviews: Vec<ReviewView>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LinkStudentRequest {
    #[validate(email)]
    pub email: String,
}
