use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::errors::{AppError, AppResult};
use crate::models::{
    NotificationKind, PersonalDetail, PersonalProfile, PersonalSearchQuery, ReviewView, Student,
    UpdatePersonalProfileRequest, UpdateStudentRequest,
};
use crate::services::NotificationService;

pub(crate) const PERSONAL_COLUMNS: &str = "id, user_id, display_name, bio, specialties, city, hourly_rate, \
     average_rating, review_count, accepting_students, created_at, updated_at";

pub(crate) const STUDENT_COLUMNS: &str =
    "id, user_id, name, birth_date, goal, personal_id, created_at, updated_at";

/// Resolve the personal profile owned by an authenticated user
pub async fn personal_for_user(db: &PgPool, user_id: Uuid) -> AppResult<PersonalProfile> {
    sqlx::query_as::<_, PersonalProfile>(&format!(
        "SELECT {PERSONAL_COLUMNS} FROM personal_profiles WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or(AppError::NotFound("Personal profile"))
}

/// Resolve the student row owned by an authenticated user
pub async fn student_for_user(db: &PgPool, user_id: Uuid) -> AppResult<Student> {
    sqlx::query_as::<_, Student>(&format!("SELECT {STUDENT_COLUMNS} FROM students WHERE user_id = $1"))
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("Student profile"))
}

pub async fn personal_by_id(db: &PgPool, personal_id: Uuid) -> AppResult<PersonalProfile> {
    sqlx::query_as::<_, PersonalProfile>(&format!(
        "SELECT {PERSONAL_COLUMNS} FROM personal_profiles WHERE id = $1"
    ))
    .bind(personal_id)
    .fetch_optional(db)
    .await?
    .ok_or(AppError::NotFound("Personal"))
}

pub async fn student_by_id(db: &PgPool, student_id: Uuid) -> AppResult<Student> {
    sqlx::query_as::<_, Student>(&format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1"))
        .bind(student_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("Student"))
}

/// A student that is linked to the given personal, or 404
pub async fn student_of_personal(db: &PgPool, personal_id: Uuid, student_id: Uuid) -> AppResult<Student> {
    let student = student_by_id(db, student_id).await?;
    if student.personal_id != Some(personal_id) {
        return Err(AppError::NotFound("Student"));
    }
    Ok(student)
}

/// Trim, lowercase and de-duplicate specialties, keeping first-seen order
pub fn normalize_specialties(specialties: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(specialties.len());
    for specialty in specialties {
        let value = specialty.trim().to_lowercase();
        if !value.is_empty() && !normalized.contains(&value) {
            normalized.push(value);
        }
    }
    normalized
}

#[derive(Clone)]
pub struct ProfileService {
    db: PgPool,
    notifications: NotificationService,
}

impl ProfileService {
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    #[tracing::instrument(skip(self))]
    pub async fn search_personals(&self, query: &PersonalSearchQuery) -> AppResult<Vec<PersonalProfile>> {
        let limit = query.limit.unwrap_or(20).clamp(1, 100);
        let offset = query.offset.unwrap_or(0).max(0);

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {PERSONAL_COLUMNS} FROM personal_profiles WHERE 1 = 1"
        ));

        if let Some(specialty) = query.specialty.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            builder.push(" AND ").push_bind(specialty.to_lowercase()).push(" = ANY(specialties)");
        }
        if let Some(city) = query.city.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            builder.push(" AND city ILIKE ").push_bind(format!("%{}%", city));
        }
        if let Some(min_rating) = query.min_rating {
            builder.push(" AND average_rating >= ").push_bind(min_rating);
        }
        if let Some(max_rate) = query.max_rate {
            builder.push(" AND hourly_rate <= ").push_bind(max_rate);
        }
        if query.accepting_only.unwrap_or(false) {
            builder.push(" AND accepting_students");
        }

        builder
            .push(" ORDER BY average_rating DESC, review_count DESC, display_name ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let personals = builder
            .build_query_as::<PersonalProfile>()
            .fetch_all(&self.db)
            .await?;

        Ok(personals)
    }

    pub async fn get_personal_detail(&self, personal_id: Uuid) -> AppResult<PersonalDetail> {
        let profile = personal_by_id(&self.db, personal_id).await?;

        let recent_reviews = sqlx::query_as::<_, ReviewView>(
            "SELECT r.id, r.personal_id, r.student_id, s.name AS student_name, r.rating, r.comment, r.created_at
             FROM reviews r
             JOIN students s ON s.id = r.student_id
             WHERE r.personal_id = $1
             ORDER BY r.created_at DESC
             LIMIT 10",
        )
        .bind(personal_id)
        .fetch_all(&self.db)
        .await?;

        Ok(PersonalDetail {
            profile,
            recent_reviews,
        })
    }

    pub async fn get_my_personal_profile(&self, user_id: Uuid) -> AppResult<PersonalProfile> {
        personal_for_user(&self.db, user_id).await
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn update_personal_profile(
        &self,
        user_id: Uuid,
        request: UpdatePersonalProfileRequest,
    ) -> AppResult<PersonalProfile> {
        request.validate()?;

        let specialties = request.specialties.as_deref().map(normalize_specialties);

        let profile = sqlx::query_as::<_, PersonalProfile>(&format!(
            "UPDATE personal_profiles
             SET display_name = COALESCE($2, display_name),
                 bio = COALESCE($3, bio),
                 specialties = COALESCE($4, specialties),
                 city = COALESCE($5, city),
                 hourly_rate = COALESCE($6, hourly_rate),
                 accepting_students = COALESCE($7, accepting_students),
                 updated_at = $8
             WHERE user_id = $1
             RETURNING {PERSONAL_COLUMNS}"
        ))
        .bind(user_id)
        .bind(request.display_name)
        .bind(request.bio)
        .bind(specialties)
        .bind(request.city)
        .bind(request.hourly_rate)
        .bind(request.accepting_students)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Personal profile"))?;

        Ok(profile)
    }

    pub async fn get_my_student_profile(&self, user_id: Uuid) -> AppResult<Student> {
        student_for_user(&self.db, user_id).await
    }

    pub async fn update_student_profile(&self, user_id: Uuid, request: UpdateStudentRequest) -> AppResult<Student> {
        request.validate()?;

        let student = sqlx::query_as::<_, Student>(&format!(
            "UPDATE students
             SET name = COALESCE($2, name),
                 birth_date = COALESCE($3, birth_date),
                 goal = COALESCE($4, goal),
                 updated_at = $5
             WHERE user_id = $1
             RETURNING {STUDENT_COLUMNS}"
        ))
        .bind(user_id)
        .bind(request.name)
        .bind(request.birth_date)
        .bind(request.goal)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Student profile"))?;

        Ok(student)
    }

    /// Student picks a personal from the marketplace
    #[tracing::instrument(skip(self))]
    pub async fn hire_personal(&self, user_id: Uuid, personal_id: Uuid) -> AppResult<Student> {
        let student = student_for_user(&self.db, user_id).await?;
        let personal = personal_by_id(&self.db, personal_id).await?;

        if student.personal_id == Some(personal.id) {
            return Ok(student);
        }
        if !personal.accepting_students {
            return Err(AppError::conflict("This personal is not accepting new students"));
        }

        let student = self.set_student_personal(student.id, Some(personal.id)).await?;

        self.notifications
            .notify(
                personal.user_id,
                NotificationKind::StudentLinked,
                "New student",
                format!("{} is now training with you", student.name),
                Some(serde_json::json!({ "student_id": student.id })),
            )
            .await;

        Ok(student)
    }

    pub async fn leave_personal(&self, user_id: Uuid) -> AppResult<Student> {
        let student = student_for_user(&self.db, user_id).await?;
        if student.personal_id.is_none() {
            return Ok(student);
        }

        self.set_student_personal(student.id, None).await
    }

    pub async fn list_my_students(&self, user_id: Uuid) -> AppResult<Vec<Student>> {
        let personal = personal_for_user(&self.db, user_id).await?;

        let students = sqlx::query_as::<_, Student>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE personal_id = $1 ORDER BY name ASC"
        ))
        .bind(personal.id)
        .fetch_all(&self.db)
        .await?;

        Ok(students)
    }

    /// Personal links an existing student account by email
    pub async fn link_student_by_email(&self, user_id: Uuid, email: &str) -> AppResult<Student> {
        let personal = personal_for_user(&self.db, user_id).await?;

        let student = sqlx::query_as::<_, Student>(
            "SELECT s.id, s.user_id, s.name, s.birth_date, s.goal, s.personal_id, s.created_at, s.updated_at
             FROM students s
             JOIN users u ON u.id = s.user_id
             WHERE u.email = $1",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Student"))?;

        match student.personal_id {
            Some(current) if current == personal.id => return Ok(student),
            Some(_) => return Err(AppError::conflict("Student already trains with another personal")),
            None => {}
        }

        let student = self.set_student_personal(student.id, Some(personal.id)).await?;

        self.notifications
            .notify(
                student.user_id,
                NotificationKind::StudentLinked,
                "You have a new personal",
                format!("{} added you as a student", personal.display_name),
                Some(serde_json::json!({ "personal_id": personal.id })),
            )
            .await;

        Ok(student)
    }

    pub async fn get_student_for_personal(&self, user_id: Uuid, student_id: Uuid) -> AppResult<Student> {
        let personal = personal_for_user(&self.db, user_id).await?;
        student_of_personal(&self.db, personal.id, student_id).await
    }

    async fn set_student_personal(&self, student_id: Uuid, personal_id: Option<Uuid>) -> AppResult<Student> {
        let student = sqlx::query_as::<_, Student>(&format!(
            "UPDATE students SET personal_id = $2, updated_at = $3 WHERE id = $1 RETURNING {STUDENT_COLUMNS}"
        ))
        .bind(student_id)
        .bind(personal_id)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(student_id = %student_id, personal_id = ?personal_id, "updated student link");
        Ok(student)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_specialties() {
        let input = vec![
            " Hypertrophy ".to_string(),
            "running".to_string(),
            "HYPERTROPHY".to_string(),
            "   ".to_string(),
        ];

        assert_eq!(normalize_specialties(&input), vec!["hypertrophy", "running"]);
    }
}
