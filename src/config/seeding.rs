use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{AuthService, RegisterRequest, UserRole};
use crate::models::*;
use crate::services::*;

pub const DEMO_PERSONAL_EMAIL: &str = "coach.demo@example.com";
pub const DEMO_STUDENT_EMAIL: &str = "student.demo@example.com";
const DEMO_PASSWORD: &str = "Password123";

/// Inserts a demo personal with one linked student, a workout assigned to
/// them and a weekly availability block. Safe to run on every startup.
pub struct DatabaseSeeder {
    pool: PgPool,
    auth: AuthService,
    notifications: NotificationService,
}

impl DatabaseSeeder {
    pub fn new(pool: PgPool, jwt_secret: &str, notifications: NotificationService) -> Self {
        Self {
            auth: AuthService::new(pool.clone(), jwt_secret),
            pool,
            notifications,
        }
    }

    pub async fn seed_all(&self) -> Result<()> {
        if self.user_id_by_email(DEMO_PERSONAL_EMAIL).await?.is_some() {
            tracing::info!("demo data already present, skipping seeding");
            return Ok(());
        }

        tracing::info!("Starting database seeding...");

        let personal_user = self
            .register(DEMO_PERSONAL_EMAIL, "Demo Personal", UserRole::Personal)
            .await?;
        self.register(DEMO_STUDENT_EMAIL, "Demo Student", UserRole::Student)
            .await?;

        let profiles = ProfileService::new(self.pool.clone(), self.notifications.clone());
        let student = profiles
            .link_student_by_email(personal_user, DEMO_STUDENT_EMAIL)
            .await?;

        self.seed_workout(personal_user, student.id).await?;
        self.seed_availability(personal_user).await?;

        tracing::info!("Database seeding completed!");
        Ok(())
    }

    async fn register(&self, email: &str, name: &str, role: UserRole) -> Result<Uuid> {
        let response = self
            .auth
            .register(RegisterRequest {
                email: email.to_string(),
                password: DEMO_PASSWORD.to_string(),
                name: name.to_string(),
                role,
            })
            .await?;
        tracing::info!(email, ?role, "created demo user");
        Ok(response.user.id)
    }

    async fn seed_workout(&self, personal_user: Uuid, student_id: Uuid) -> Result<()> {
        let draft = SuggestionService::new().suggest(&SuggestionRequest {
            goal: FitnessGoal::Hypertrophy,
            level: WorkoutDifficulty::Beginner,
            focus: None,
            available_minutes: Some(45),
        })?;

        let workouts = WorkoutService::new(self.pool.clone(), self.notifications.clone());
        let workout = workouts
            .create_workout(
                personal_user,
                CreateWorkoutRequest {
                    name: draft.name,
                    description: Some(draft.description),
                    difficulty: draft.difficulty,
                    estimated_minutes: Some(draft.estimated_minutes),
                    exercises: draft.exercises,
                },
            )
            .await?;

        workouts
            .assign_workout(personal_user, workout.workout.id, AssignWorkoutRequest { student_id })
            .await?;
        Ok(())
    }

    async fn seed_availability(&self, personal_user: Uuid) -> Result<()> {
        let scheduling = SchedulingService::new(self.pool.clone(), self.notifications.clone());
        let monday = next_monday(Utc::now().date_naive());

        for (day_offset, start_hour, end_hour) in [(0, 8, 12), (2, 14, 18), (4, 8, 12)] {
            let date = monday + Duration::days(day_offset);
            let (Some(starts_at), Some(ends_at)) = (
                date.and_hms_opt(start_hour, 0, 0),
                date.and_hms_opt(end_hour, 0, 0),
            ) else {
                continue;
            };

            scheduling
                .create_slot(
                    personal_user,
                    CreateSlotRequest {
                        starts_at: starts_at.and_utc(),
                        ends_at: ends_at.and_utc(),
                        is_recurring: true,
                    },
                )
                .await?;
        }
        Ok(())
    }

    async fn user_id_by_email(&self, email: &str) -> Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }
}

fn next_monday(today: NaiveDate) -> NaiveDate {
    let days_ahead = (7 - today.weekday().num_days_from_monday()) % 7;
    let days_ahead = if days_ahead == 0 { 7 } else { days_ahead };
    today + Duration::days(i64::from(days_ahead))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn next_monday_always_moves_forward() {
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let wednesday = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        assert_eq!(next_monday(monday), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        assert_eq!(next_monday(wednesday), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        assert_eq!(next_monday(sunday), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        assert_eq!(next_monday(sunday).weekday(), Weekday::Mon);
    }
}
