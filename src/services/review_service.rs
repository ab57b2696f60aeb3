use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::errors::{AppError, AppResult};
use crate::models::{CreateReviewRequest, NotificationKind, RatingSummary, Review, ReviewView};
use crate::services::profile_service::{personal_by_id, student_for_user};
use crate::services::NotificationService;

/// Average rounded to two decimals; zero when there are no reviews
pub fn rating_summary(ratings: &[i32]) -> RatingSummary {
    if ratings.is_empty() {
        return RatingSummary {
            average_rating: 0.0,
            review_count: 0,
        };
    }

    let total: i64 = ratings.iter().map(|&r| r as i64).sum();
    let average = total as f64 / ratings.len() as f64;

    RatingSummary {
        average_rating: (average * 100.0).round() / 100.0,
        review_count: ratings.len() as i32,
    }
}

#[derive(Clone)]
pub struct ReviewService {
    db: PgPool,
    notifications: NotificationService,
}

impl ReviewService {
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    /// Insert a review and refresh the personal's rating aggregate atomically
    #[tracing::instrument(skip(self, request))]
    pub async fn create_review(
        &self,
        user_id: Uuid,
        personal_id: Uuid,
        request: CreateReviewRequest,
    ) -> AppResult<Review> {
        request.validate()?;

        let student = student_for_user(&self.db, user_id).await?;
        let personal = personal_by_id(&self.db, personal_id).await?;

        let has_relationship = student.personal_id == Some(personal.id)
            || sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (
                     SELECT 1 FROM appointments
                     WHERE student_id = $1 AND personal_id = $2 AND status = 'completed'
                 )",
            )
            .bind(student.id)
            .bind(personal.id)
            .fetch_one(&self.db)
            .await?;

        if !has_relationship {
            return Err(AppError::forbidden("Only students of this personal can review them"));
        }

        let mut tx = self.db.begin().await?;

        // Serialize reviews per personal so the recompute sees every committed rating
        sqlx::query("SELECT id FROM personal_profiles WHERE id = $1 FOR UPDATE")
            .bind(personal.id)
            .execute(&mut *tx)
            .await?;

        let review = sqlx::query_as::<_, Review>(
            "INSERT INTO reviews (id, personal_id, student_id, rating, comment, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, personal_id, student_id, rating, comment, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(personal.id)
        .bind(student.id)
        .bind(request.rating)
        .bind(request.comment)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| match AppError::from(err) {
            AppError::Conflict(_) => AppError::conflict("You have already reviewed this personal"),
            other => other,
        })?;

        let ratings = sqlx::query_scalar::<_, i32>("SELECT rating FROM reviews WHERE personal_id = $1")
            .bind(personal.id)
            .fetch_all(&mut *tx)
            .await?;
        let summary = rating_summary(&ratings);

        sqlx::query(
            "UPDATE personal_profiles
             SET average_rating = $2, review_count = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(personal.id)
        .bind(summary.average_rating)
        .bind(summary.review_count)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            personal_id = %personal.id,
            average_rating = summary.average_rating,
            review_count = summary.review_count,
            "recomputed personal rating"
        );

        self.notifications
            .notify(
                personal.user_id,
                NotificationKind::ReviewReceived,
                "New review",
                format!("{} rated you {}/5", student.name, review.rating),
                Some(serde_json::json!({ "review_id": review.id })),
            )
            .await;

        Ok(review)
    }

    pub async fn list_reviews(&self, personal_id: Uuid, limit: Option<i64>, offset: Option<i64>) -> AppResult<Vec<ReviewView>> {
        let limit = limit.unwrap_or(20).clamp(1, 100);
        let offset = offset.unwrap_or(0).max(0);

        let reviews = sqlx::query_as::<_, ReviewView>(
            "SELECT r.id, r.personal_id, r.student_id, s.name AS student_name, r.rating, r.comment, r.created_at
             FROM reviews r
             JOIN students s ON s.id = r.student_id
             WHERE r.personal_id = $1
             ORDER BY r.created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(personal_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_summary_empty() {
        let summary = rating_summary(&[]);
        assert_eq!(summary.review_count, 0);
        assert_eq!(summary.average_rating, 0.0);
    }

    #[test]
    fn test_rating_summary_rounds_to_two_decimals() {
        let summary = rating_summary(&[5, 4, 4]);
        assert_eq!(summary.review_count, 3);
        assert_eq!(summary.average_rating, 4.33);
    }

    #[test]
    fn test_rating_summary_single_review() {
        assert_eq!(
            rating_summary(&[2]),
            RatingSummary {
                average_rating: 2.0,
                review_count: 1
            }
        );
    }
}
