use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    jwt_auth_middleware, personal_only_middleware, student_only_middleware, AuthService, UserSession,
};
use crate::errors::{AppError, AppResult};
use crate::models::{
    AssignWorkoutRequest, AssignmentDetail, AssignmentQuery, AssignmentView, CompleteWorkoutRequest,
    CreateWorkoutRequest, ReplaceExercisesRequest, StudentWorkout, SuggestedWorkout, SuggestionRequest,
    UpdateAssignmentStatusRequest, UpdateWorkoutRequest, Workout, WorkoutWithExercises,
};
use crate::services::{NotificationService, SuggestionService, WorkoutService};

#[derive(Clone)]
pub struct WorkoutsAppState {
    pub workouts: WorkoutService,
    pub suggestions: SuggestionService,
}

impl WorkoutsAppState {
    fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self {
            workouts: WorkoutService::new(db, notifications),
            suggestions: SuggestionService::new(),
        }
    }
}

/// Workout authoring and assignment, for personals
pub fn workouts_routes(db: PgPool, auth_service: AuthService, notifications: NotificationService) -> Router {
    Router::new()
        .route("/", get(list_workouts).post(create_workout))
        .route("/:workout_id", get(get_workout).put(update_workout).delete(delete_workout))
        .route("/:workout_id/exercises", put(replace_exercises))
        .route("/:workout_id/assign", post(assign_workout))
        .route("/assignments/:assignment_id/status", put(update_assignment_status))
        .route_layer(middleware::from_fn(personal_only_middleware))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(WorkoutsAppState::new(db, notifications))
}

/// A student's assigned workouts
pub fn assignments_routes(db: PgPool, auth_service: AuthService, notifications: NotificationService) -> Router {
    Router::new()
        .route("/", get(list_my_assignments))
        .route("/:assignment_id", get(get_my_assignment))
        .route("/:assignment_id/complete", post(complete_assignment))
        .route_layer(middleware::from_fn(student_only_middleware))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(WorkoutsAppState::new(db, notifications))
}

/// Generated workout drafts
pub fn suggestions_routes(db: PgPool, auth_service: AuthService, notifications: NotificationService) -> Router {
    Router::new()
        .route("/", post(suggest_workout))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(WorkoutsAppState::new(db, notifications))
}

async fn list_workouts(
    State(state): State<WorkoutsAppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<Vec<Workout>>> {
    Ok(Json(state.workouts.list_workouts(session.user_id).await?))
}

/// Create a workout with its exercises
#[tracing::instrument(skip(state, session, request))]
async fn create_workout(
    State(state): State<WorkoutsAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<CreateWorkoutRequest>, AppError>,
) -> AppResult<(StatusCode, Json<WorkoutWithExercises>)> {
    let workout = state.workouts.create_workout(session.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(workout)))
}

async fn get_workout(
    State(state): State<WorkoutsAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(workout_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<WorkoutWithExercises>> {
    Ok(Json(state.workouts.get_workout(session.user_id, workout_id).await?))
}

async fn update_workout(
    State(state): State<WorkoutsAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(workout_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateWorkoutRequest>, AppError>,
) -> AppResult<Json<Workout>> {
    Ok(Json(
        state
            .workouts
            .update_workout(session.user_id, workout_id, request)
            .await?,
    ))
}

async fn delete_workout(
    State(state): State<WorkoutsAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(workout_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<StatusCode> {
    state.workouts.delete_workout(session.user_id, workout_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn replace_exercises(
    State(state): State<WorkoutsAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(workout_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<ReplaceExercisesRequest>, AppError>,
) -> AppResult<Json<WorkoutWithExercises>> {
    Ok(Json(
        state
            .workouts
            .replace_exercises(session.user_id, workout_id, request)
            .await?,
    ))
}

async fn assign_workout(
    State(state): State<WorkoutsAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(workout_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<AssignWorkoutRequest>, AppError>,
) -> AppResult<(StatusCode, Json<StudentWorkout>)> {
    let assignment = state
        .workouts
        .assign_workout(session.user_id, workout_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// Pause or resume an assignment
async fn update_assignment_status(
    State(state): State<WorkoutsAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(assignment_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateAssignmentStatusRequest>, AppError>,
) -> AppResult<Json<StudentWorkout>> {
    Ok(Json(
        state
            .workouts
            .set_assignment_status(session.user_id, assignment_id, request.status)
            .await?,
    ))
}

async fn list_my_assignments(
    State(state): State<WorkoutsAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<AssignmentQuery>, AppError>,
) -> AppResult<Json<Vec<AssignmentView>>> {
    Ok(Json(state.workouts.list_my_assignments(session.user_id, &query).await?))
}

async fn get_my_assignment(
    State(state): State<WorkoutsAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(assignment_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<AssignmentDetail>> {
    Ok(Json(
        state
            .workouts
            .get_my_assignment(session.user_id, assignment_id)
            .await?,
    ))
}

/// Finish an assignment with optional feedback and rating
#[tracing::instrument(skip(state, session, body))]
async fn complete_assignment(
    State(state): State<WorkoutsAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(assignment_id), _): WithRejection<Path<Uuid>, AppError>,
    body: Bytes,
) -> AppResult<Json<StudentWorkout>> {
    let request = parse_completion(&body)?;
    Ok(Json(
        state
            .workouts
            .complete_assignment(session.user_id, assignment_id, request)
            .await?,
    ))
}

/// An empty body completes without feedback; anything else must be valid JSON
fn parse_completion(body: &[u8]) -> AppResult<CompleteWorkoutRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CompleteWorkoutRequest::default());
    }
    let Json(request) = Json::<CompleteWorkoutRequest>::from_bytes(body)?;
    Ok(request)
}

async fn suggest_workout(
    State(state): State<WorkoutsAppState>,
    WithRejection(Json(request), _): WithRejection<Json<SuggestionRequest>, AppError>,
) -> AppResult<Json<SuggestedWorkout>> {
    Ok(Json(state.suggestions.suggest(&request)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn empty_completion_body_means_no_feedback() {
        let request = parse_completion(b"").unwrap();
        assert_eq!(request.feedback, None);
        assert_eq!(request.rating, None);

        assert!(parse_completion(b"  \n").is_ok());
    }

    #[test]
    fn completion_body_is_parsed() {
        let request = parse_completion(br#"{"feedback":"Tough legs day","rating":4}"#).unwrap();
        assert_eq!(request.feedback.as_deref(), Some("Tough legs day"));
        assert_eq!(request.rating, Some(4));
    }

    #[test]
    fn malformed_completion_body_is_rejected() {
        assert_matches!(parse_completion(br#"{"rating":"five"}"#), Err(AppError::BadRequest(_)));
        assert_matches!(parse_completion(b"rating=5"), Err(AppError::BadRequest(_)));
    }
}
