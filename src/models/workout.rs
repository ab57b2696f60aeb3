use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "workout_difficulty", rename_all = "snake_case")]
pub enum WorkoutDifficulty {
    Beginner,
    Intermediate,
    Advanced,
}

/// Lifecycle of a workout assigned to a student
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "assignment_status", rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Paused,
    Completed,
}

impl AssignmentStatus {
    /// `active <-> paused`, `active -> completed`; completed is terminal.
    pub fn can_transition_to(self, next: AssignmentStatus) -> bool {
        use AssignmentStatus::*;
        matches!((self, next), (Active, Paused) | (Paused, Active) | (Active, Completed))
    }

    pub fn is_terminal(self) -> bool {
        self == AssignmentStatus::Completed
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            AssignmentStatus::Active => "active",
            AssignmentStatus::Paused => "paused",
            AssignmentStatus::Completed => "completed",
        };
        f.write_str(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Workout {
    pub id: Uuid,
    pub personal_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub difficulty: WorkoutDifficulty,
    pub estimated_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkoutExercise {
    pub id: Uuid,
    pub workout_id: Uuid,
    pub position: i32,
    pub name: String,
    pub sets: i32,
    pub reps: i32,
    pub rest_seconds: i32,
    pub weight_kg: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkoutWithExercises {
    #[serde(flatten)]
    pub workout: Workout,
    pub exercises: Vec<WorkoutExercise>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExerciseInput {
    #[validate(length(min = 1, max = 120), custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(range(min = 1, max = 20))]
    pub sets: i32,
    #[validate(range(min = 1, max = 200))]
    pub reps: i32,
    #[validate(range(min = 0, max = 900))]
    pub rest_seconds: Option<i32>,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub weight_kg: Option<f64>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Names are stored trimmed, so whitespace alone counts as empty
fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWorkoutRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub difficulty: WorkoutDifficulty,
    #[validate(range(min = 1, max = 600))]
    pub estimated_minutes: Option<i32>,
    #[validate(length(min = 1, max = 50))]
    pub exercises: Vec<ExerciseInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateWorkoutRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub difficulty: Option<WorkoutDifficulty>,
    #[validate(range(min = 1, max = 600))]
    pub estimated_minutes: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceExercisesRequest {
    #[validate(length(min = 1, max = 50))]
    pub exercises: Vec<ExerciseInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentWorkout {
    pub id: Uuid,
    pub workout_id: Uuid,
    pub student_id: Uuid,
    pub status: AssignmentStatus,
    pub feedback: Option<String>,
    pub rating: Option<i32>,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Assignment joined with workout and student names
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AssignmentView {
    pub id: Uuid,
    pub workout_id: Uuid,
    pub workout_name: String,
    pub difficulty: WorkoutDifficulty,
    pub student_id: Uuid,
    pub student_name: String,
    pub status: AssignmentStatus,
    pub feedback: Option<String>,
    pub rating: Option<i32>,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct AssignmentDetail {
    pub assignment: AssignmentView,
    pub exercises: Vec<WorkoutExercise>,
}

#[derive(Debug, Deserialize)]
pub struct AssignWorkoutRequest {
    pub student_id: Uuid,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CompleteWorkoutRequest {
    #[validate(length(max = 2000))]
    pub feedback: Option<String>,
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAssignmentStatusRequest {
    pub status: AssignmentStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssignmentQuery {
    pub status: Option<AssignmentStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_transitions() {
        use AssignmentStatus::*;

        assert!(Active.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));

        assert!(!Paused.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Completed.can_transition_to(Paused));
        assert!(!Active.can_transition_to(Active));
        assert!(Completed.is_terminal());
    }

    #[test]
    fn test_create_workout_requires_exercises() {
        let request = CreateWorkoutRequest {
            name: "Leg day".to_string(),
            description: None,
            difficulty: WorkoutDifficulty::Beginner,
            estimated_minutes: Some(45),
            exercises: vec![],
        };

        assert!(request.validate().unwrap_err().field_errors().contains_key("exercises"));
    }

    #[test]
    fn test_exercise_input_ranges() {
        let exercise = ExerciseInput {
            name: "Squat".to_string(),
            sets: 0,
            reps: 10,
            rest_seconds: Some(60),
            weight_kg: Some(80.0),
            notes: None,
        };

        assert!(exercise.validate().unwrap_err().field_errors().contains_key("sets"));
    }

    #[test]
    fn test_exercise_name_cannot_be_blank() {
        let mut exercise = ExerciseInput {
            name: "   ".to_string(),
            sets: 3,
            reps: 10,
            rest_seconds: None,
            weight_kg: None,
            notes: None,
        };

        let errors = exercise.validate().unwrap_err();
        assert_eq!(errors.field_errors()["name"][0].code, "blank");

        exercise.name = " Front squat ".to_string();
        assert!(exercise.validate().is_ok());
    }
}
