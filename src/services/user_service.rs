use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{ListUsersQuery, PlatformStats, RoleCount, StatusCount, UserSummary};

/// Account administration for admins
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_users(&self, query: &ListUsersQuery) -> AppResult<Vec<UserSummary>> {
        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let offset = query.offset.unwrap_or(0).max(0);

        let users = sqlx::query_as::<_, UserSummary>(
            "SELECT id, email, name, role, created_at FROM users
             WHERE ($1::user_role IS NULL OR role = $1)
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(query.role)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(users)
    }

    pub async fn get_user(&self, user_id: Uuid) -> AppResult<UserSummary> {
        sqlx::query_as::<_, UserSummary>("SELECT id, email, name, role, created_at FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(AppError::NotFound("User"))
    }

    #[tracing::instrument(skip(self))]
    pub async fn platform_stats(&self) -> AppResult<PlatformStats> {
        let users_by_role = sqlx::query_as::<_, RoleCount>(
            "SELECT role, COUNT(*) AS count FROM users GROUP BY role ORDER BY role",
        )
        .fetch_all(&self.db)
        .await?;

        let appointments_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status::text AS status, COUNT(*) AS count FROM appointments GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.db)
        .await?;

        let active_assignments =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM student_workouts WHERE status = 'active'")
                .fetch_one(&self.db)
                .await?;

        Ok(PlatformStats {
            users_by_role,
            appointments_by_status,
            active_assignments,
            generated_at: Utc::now(),
        })
    }
}
