use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::errors::{AppError, AppResult};
use crate::models::{
    AssignWorkoutRequest, AssignmentDetail, AssignmentQuery, AssignmentStatus, AssignmentView,
    CompleteWorkoutRequest, CreateWorkoutRequest, ExerciseInput, NotificationKind, ReplaceExercisesRequest,
    StudentWorkout, UpdateWorkoutRequest, Workout, WorkoutExercise, WorkoutWithExercises,
};
use crate::services::profile_service::{personal_by_id, personal_for_user, student_for_user, student_of_personal};
use crate::services::NotificationService;

const WORKOUT_COLUMNS: &str =
    "id, personal_id, name, description, difficulty, estimated_minutes, created_at, updated_at";

const EXERCISE_COLUMNS: &str = "id, workout_id, position, name, sets, reps, rest_seconds, weight_kg, notes";

const ASSIGNMENT_COLUMNS: &str =
    "id, workout_id, student_id, status, feedback, rating, assigned_at, completed_at, updated_at";

const ASSIGNMENT_VIEW_SELECT: &str = "SELECT sw.id, sw.workout_id, w.name AS workout_name, w.difficulty, \
     sw.student_id, s.name AS student_name, sw.status, sw.feedback, sw.rating, sw.assigned_at, sw.completed_at \
     FROM student_workouts sw \
     JOIN workouts w ON w.id = sw.workout_id \
     JOIN students s ON s.id = sw.student_id";

const DEFAULT_REST_SECONDS: i32 = 60;

/// Validate each exercise of a list; the derive only checks the list length
pub fn validate_exercises(exercises: &[ExerciseInput]) -> AppResult<()> {
    for exercise in exercises {
        exercise.validate()?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct WorkoutService {
    db: PgPool,
    notifications: NotificationService,
}

impl WorkoutService {
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn create_workout(&self, user_id: Uuid, request: CreateWorkoutRequest) -> AppResult<WorkoutWithExercises> {
        request.validate()?;
        validate_exercises(&request.exercises)?;

        let personal = personal_for_user(&self.db, user_id).await?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let workout = sqlx::query_as::<_, Workout>(&format!(
            "INSERT INTO workouts (id, personal_id, name, description, difficulty, estimated_minutes, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING {WORKOUT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(personal.id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.difficulty)
        .bind(request.estimated_minutes)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let exercises = insert_exercises(&mut tx, workout.id, &request.exercises).await?;

        tx.commit().await?;

        tracing::info!(workout_id = %workout.id, exercises = exercises.len(), "created workout");
        Ok(WorkoutWithExercises { workout, exercises })
    }

    pub async fn list_workouts(&self, user_id: Uuid) -> AppResult<Vec<Workout>> {
        let personal = personal_for_user(&self.db, user_id).await?;

        let workouts = sqlx::query_as::<_, Workout>(&format!(
            "SELECT {WORKOUT_COLUMNS} FROM workouts WHERE personal_id = $1 ORDER BY created_at DESC"
        ))
        .bind(personal.id)
        .fetch_all(&self.db)
        .await?;

        Ok(workouts)
    }

    pub async fn get_workout(&self, user_id: Uuid, workout_id: Uuid) -> AppResult<WorkoutWithExercises> {
        let personal = personal_for_user(&self.db, user_id).await?;
        let workout = self.owned_workout(personal.id, workout_id).await?;
        let exercises = self.exercises_of(workout.id).await?;

        Ok(WorkoutWithExercises { workout, exercises })
    }

    pub async fn update_workout(
        &self,
        user_id: Uuid,
        workout_id: Uuid,
        request: UpdateWorkoutRequest,
    ) -> AppResult<Workout> {
        request.validate()?;
        let personal = personal_for_user(&self.db, user_id).await?;

        sqlx::query_as::<_, Workout>(&format!(
            "UPDATE workouts
             SET name = COALESCE($3, name),
                 description = COALESCE($4, description),
                 difficulty = COALESCE($5, difficulty),
                 estimated_minutes = COALESCE($6, estimated_minutes),
                 updated_at = $7
             WHERE id = $1 AND personal_id = $2
             RETURNING {WORKOUT_COLUMNS}"
        ))
        .bind(workout_id)
        .bind(personal.id)
        .bind(request.name)
        .bind(request.description)
        .bind(request.difficulty)
        .bind(request.estimated_minutes)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Workout"))
    }

    /// Swap the whole exercise list, renumbering positions from zero
    #[tracing::instrument(skip(self, request))]
    pub async fn replace_exercises(
        &self,
        user_id: Uuid,
        workout_id: Uuid,
        request: ReplaceExercisesRequest,
    ) -> AppResult<WorkoutWithExercises> {
        request.validate()?;
        validate_exercises(&request.exercises)?;

        let personal = personal_for_user(&self.db, user_id).await?;
        let workout = self.owned_workout(personal.id, workout_id).await?;

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM workout_exercises WHERE workout_id = $1")
            .bind(workout.id)
            .execute(&mut *tx)
            .await?;

        let exercises = insert_exercises(&mut tx, workout.id, &request.exercises).await?;

        let workout = sqlx::query_as::<_, Workout>(&format!(
            "UPDATE workouts SET updated_at = $2 WHERE id = $1 RETURNING {WORKOUT_COLUMNS}"
        ))
        .bind(workout.id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(WorkoutWithExercises { workout, exercises })
    }

    pub async fn delete_workout(&self, user_id: Uuid, workout_id: Uuid) -> AppResult<()> {
        let personal = personal_for_user(&self.db, user_id).await?;

        let result = sqlx::query("DELETE FROM workouts WHERE id = $1 AND personal_id = $2")
            .bind(workout_id)
            .bind(personal.id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Workout"));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn assign_workout(
        &self,
        user_id: Uuid,
        workout_id: Uuid,
        request: AssignWorkoutRequest,
    ) -> AppResult<StudentWorkout> {
        let personal = personal_for_user(&self.db, user_id).await?;
        let workout = self.owned_workout(personal.id, workout_id).await?;
        let student = student_of_personal(&self.db, personal.id, request.student_id).await?;

        let now = Utc::now();
        let assignment = sqlx::query_as::<_, StudentWorkout>(&format!(
            "INSERT INTO student_workouts (id, workout_id, student_id, status, assigned_at, updated_at)
             VALUES ($1, $2, $3, 'active', $4, $4)
             RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(workout.id)
        .bind(student.id)
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(|err| match AppError::from(err) {
            AppError::Conflict(_) => AppError::conflict("Workout is already assigned to this student"),
            other => other,
        })?;

        self.notifications
            .notify(
                student.user_id,
                NotificationKind::WorkoutAssigned,
                "New workout assigned",
                format!("{} assigned you \"{}\"", personal.display_name, workout.name),
                Some(serde_json::json!({
                    "assignment_id": assignment.id,
                    "workout_id": workout.id,
                })),
            )
            .await;

        Ok(assignment)
    }

    pub async fn list_student_assignments_for_personal(
        &self,
        user_id: Uuid,
        student_id: Uuid,
        query: &AssignmentQuery,
    ) -> AppResult<Vec<AssignmentView>> {
        let personal = personal_for_user(&self.db, user_id).await?;
        let student = student_of_personal(&self.db, personal.id, student_id).await?;

        let assignments = sqlx::query_as::<_, AssignmentView>(&format!(
            "{ASSIGNMENT_VIEW_SELECT}
             WHERE sw.student_id = $1 AND w.personal_id = $2
               AND ($3::assignment_status IS NULL OR sw.status = $3)
             ORDER BY sw.assigned_at DESC"
        ))
        .bind(student.id)
        .bind(personal.id)
        .bind(query.status)
        .fetch_all(&self.db)
        .await?;

        Ok(assignments)
    }

    pub async fn list_my_assignments(&self, user_id: Uuid, query: &AssignmentQuery) -> AppResult<Vec<AssignmentView>> {
        let student = student_for_user(&self.db, user_id).await?;

        let assignments = sqlx::query_as::<_, AssignmentView>(&format!(
            "{ASSIGNMENT_VIEW_SELECT}
             WHERE sw.student_id = $1 AND ($2::assignment_status IS NULL OR sw.status = $2)
             ORDER BY sw.assigned_at DESC"
        ))
        .bind(student.id)
        .bind(query.status)
        .fetch_all(&self.db)
        .await?;

        Ok(assignments)
    }

    pub async fn get_my_assignment(&self, user_id: Uuid, assignment_id: Uuid) -> AppResult<AssignmentDetail> {
        let student = student_for_user(&self.db, user_id).await?;
        let assignment = self.assignment_view(student.id, assignment_id).await?;
        let exercises = self.exercises_of(assignment.workout_id).await?;

        Ok(AssignmentDetail { assignment, exercises })
    }

    /// Student marks an active assignment as done
    #[tracing::instrument(skip(self, request))]
    pub async fn complete_assignment(
        &self,
        user_id: Uuid,
        assignment_id: Uuid,
        request: CompleteWorkoutRequest,
    ) -> AppResult<StudentWorkout> {
        request.validate()?;

        let student = student_for_user(&self.db, user_id).await?;
        let current = self.assignment_of_student(student.id, assignment_id).await?;
        ensure_transition(current.status, AssignmentStatus::Completed)?;

        let now = Utc::now();
        let completed = sqlx::query_as::<_, StudentWorkout>(&format!(
            "UPDATE student_workouts
             SET status = 'completed', feedback = $3, rating = $4, completed_at = $5, updated_at = $5
             WHERE id = $1 AND status = $2
             RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(current.id)
        .bind(current.status)
        .bind(request.feedback)
        .bind(request.rating)
        .bind(now)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::conflict("Assignment changed concurrently"))?;

        if let Some(personal_user) = self.personal_user_of_workout(completed.workout_id).await? {
            self.notifications
                .notify(
                    personal_user,
                    NotificationKind::WorkoutCompleted,
                    "Workout completed",
                    format!("{} completed a workout", student.name),
                    Some(serde_json::json!({
                        "assignment_id": completed.id,
                        "rating": completed.rating,
                        "feedback": completed.feedback,
                    })),
                )
                .await;
        }

        Ok(completed)
    }

    /// Personal pauses or resumes an assignment of one of their workouts
    #[tracing::instrument(skip(self))]
    pub async fn set_assignment_status(
        &self,
        user_id: Uuid,
        assignment_id: Uuid,
        status: AssignmentStatus,
    ) -> AppResult<StudentWorkout> {
        if status == AssignmentStatus::Completed {
            return Err(AppError::bad_request("Only the student can complete a workout"));
        }

        let personal = personal_for_user(&self.db, user_id).await?;
        let current = sqlx::query_as::<_, StudentWorkout>(
            "SELECT sw.id, sw.workout_id, sw.student_id, sw.status, sw.feedback, sw.rating,
                    sw.assigned_at, sw.completed_at, sw.updated_at
             FROM student_workouts sw
             JOIN workouts w ON w.id = sw.workout_id
             WHERE sw.id = $1 AND w.personal_id = $2",
        )
        .bind(assignment_id)
        .bind(personal.id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Assignment"))?;

        ensure_transition(current.status, status)?;

        let updated = sqlx::query_as::<_, StudentWorkout>(&format!(
            "UPDATE student_workouts SET status = $3, updated_at = $4
             WHERE id = $1 AND status = $2
             RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(current.id)
        .bind(current.status)
        .bind(status)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::conflict("Assignment changed concurrently"))?;

        Ok(updated)
    }

    async fn owned_workout(&self, personal_id: Uuid, workout_id: Uuid) -> AppResult<Workout> {
        sqlx::query_as::<_, Workout>(&format!(
            "SELECT {WORKOUT_COLUMNS} FROM workouts WHERE id = $1 AND personal_id = $2"
        ))
        .bind(workout_id)
        .bind(personal_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Workout"))
    }

    async fn exercises_of(&self, workout_id: Uuid) -> AppResult<Vec<WorkoutExercise>> {
        let exercises = sqlx::query_as::<_, WorkoutExercise>(&format!(
            "SELECT {EXERCISE_COLUMNS} FROM workout_exercises WHERE workout_id = $1 ORDER BY position ASC"
        ))
        .bind(workout_id)
        .fetch_all(&self.db)
        .await?;

        Ok(exercises)
    }

    async fn assignment_of_student(&self, student_id: Uuid, assignment_id: Uuid) -> AppResult<StudentWorkout> {
        sqlx::query_as::<_, StudentWorkout>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM student_workouts WHERE id = $1 AND student_id = $2"
        ))
        .bind(assignment_id)
        .bind(student_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Assignment"))
    }

    async fn assignment_view(&self, student_id: Uuid, assignment_id: Uuid) -> AppResult<AssignmentView> {
        sqlx::query_as::<_, AssignmentView>(&format!(
            "{ASSIGNMENT_VIEW_SELECT} WHERE sw.id = $1 AND sw.student_id = $2"
        ))
        .bind(assignment_id)
        .bind(student_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Assignment"))
    }

    async fn personal_user_of_workout(&self, workout_id: Uuid) -> AppResult<Option<Uuid>> {
        let personal_id = sqlx::query_scalar::<_, Uuid>("SELECT personal_id FROM workouts WHERE id = $1")
            .bind(workout_id)
            .fetch_optional(&self.db)
            .await?;

        match personal_id {
            Some(id) => Ok(Some(personal_by_id(&self.db, id).await?.user_id)),
            None => Ok(None),
        }
    }
}

fn ensure_transition(from: AssignmentStatus, to: AssignmentStatus) -> AppResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(AppError::invalid_transition(from, to))
    }
}

async fn insert_exercises(
    tx: &mut Transaction<'_, Postgres>,
    workout_id: Uuid,
    exercises: &[ExerciseInput],
) -> AppResult<Vec<WorkoutExercise>> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO workout_exercises (id, workout_id, position, name, sets, reps, rest_seconds, weight_kg, notes) ",
    );

    builder.push_values(exercises.iter().enumerate(), |mut row, (position, exercise)| {
        row.push_bind(Uuid::new_v4())
            .push_bind(workout_id)
            .push_bind(position as i32)
            .push_bind(exercise.name.trim().to_string())
            .push_bind(exercise.sets)
            .push_bind(exercise.reps)
            .push_bind(exercise.rest_seconds.unwrap_or(DEFAULT_REST_SECONDS))
            .push_bind(exercise.weight_kg)
            .push_bind(exercise.notes.clone());
    });
    builder.push(format!(" RETURNING {EXERCISE_COLUMNS}"));

    let mut inserted = builder
        .build_query_as::<WorkoutExercise>()
        .fetch_all(&mut **tx)
        .await?;
    inserted.sort_by_key(|exercise| exercise.position);

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn exercise(name: &str, sets: i32, reps: i32) -> ExerciseInput {
        ExerciseInput {
            name: name.to_string(),
            sets,
            reps,
            rest_seconds: None,
            weight_kg: None,
            notes: None,
        }
    }

    #[test]
    fn test_validate_exercises_reports_nested_errors() {
        let valid = vec![exercise("Squat", 4, 8), exercise("Plank", 3, 1)];
        assert!(validate_exercises(&valid).is_ok());

        let invalid = vec![exercise("Squat", 4, 8), exercise("", 3, 10)];
        assert_matches!(validate_exercises(&invalid), Err(AppError::Validation(_)));
    }

    #[test]
    fn test_whitespace_exercise_name_is_rejected() {
        let blank = vec![exercise("Squat", 4, 8), exercise(" \t ", 3, 10)];
        assert_matches!(validate_exercises(&blank), Err(AppError::Validation(_)));
    }

    #[test]
    fn test_ensure_transition() {
        assert!(ensure_transition(AssignmentStatus::Active, AssignmentStatus::Completed).is_ok());
        assert_matches!(
            ensure_transition(AssignmentStatus::Completed, AssignmentStatus::Active),
            Err(AppError::InvalidTransition { .. })
        );
        assert_matches!(
            ensure_transition(AssignmentStatus::Paused, AssignmentStatus::Completed),
            Err(AppError::InvalidTransition { .. })
        );
    }
}
