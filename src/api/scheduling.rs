use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{delete, get, put},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{jwt_auth_middleware, personal_only_middleware, AuthService, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{
    Appointment, AppointmentQuery, AppointmentView, AvailabilityOccurrence, AvailabilitySlot, BookAppointmentRequest,
    CreatePersonalEventRequest, CreateSlotRequest, EventRangeQuery, PersonalEvent, SlotQuery,
    UpdateAppointmentStatusRequest, UpdatePersonalEventRequest,
};
use crate::services::{NotificationService, SchedulingService};

#[derive(Clone)]
pub struct SchedulingAppState {
    pub scheduling: SchedulingService,
}

fn state(db: PgPool, notifications: NotificationService) -> SchedulingAppState {
    SchedulingAppState {
        scheduling: SchedulingService::new(db, notifications),
    }
}

/// Availability slots. Anyone signed in can read; personals manage their own.
pub fn availability_routes(db: PgPool, auth_service: AuthService, notifications: NotificationService) -> Router {
    Router::new()
        .route(
            "/",
            get(list_availability).merge(
                axum::routing::post(create_slot).route_layer(middleware::from_fn(personal_only_middleware)),
            ),
        )
        .route(
            "/:slot_id",
            delete(delete_slot).route_layer(middleware::from_fn(personal_only_middleware)),
        )
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(state(db, notifications))
}

pub fn appointments_routes(db: PgPool, auth_service: AuthService, notifications: NotificationService) -> Router {
    Router::new()
        .route("/", get(list_appointments).post(book_appointment))
        .route("/:appointment_id/status", put(update_appointment_status))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(state(db, notifications))
}

/// Ad-hoc calendar events of a personal
pub fn events_routes(db: PgPool, auth_service: AuthService, notifications: NotificationService) -> Router {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/:event_id", put(update_event).delete(delete_event))
        .route_layer(middleware::from_fn(personal_only_middleware))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(state(db, notifications))
}

async fn list_availability(
    State(state): State<SchedulingAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<SlotQuery>, AppError>,
) -> AppResult<Json<Vec<AvailabilityOccurrence>>> {
    Ok(Json(state.scheduling.list_availability(&session, &query).await?))
}

async fn create_slot(
    State(state): State<SchedulingAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<CreateSlotRequest>, AppError>,
) -> AppResult<(StatusCode, Json<AvailabilitySlot>)> {
    let slot = state.scheduling.create_slot(session.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

async fn delete_slot(
    State(state): State<SchedulingAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(slot_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<StatusCode> {
    state.scheduling.delete_slot(session.user_id, slot_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_appointments(
    State(state): State<SchedulingAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<AppointmentQuery>, AppError>,
) -> AppResult<Json<Vec<AppointmentView>>> {
    Ok(Json(state.scheduling.list_appointments(&session, &query).await?))
}

/// Book an appointment; conflicts with an existing booking answer 409
#[tracing::instrument(skip(state, session, request))]
async fn book_appointment(
    State(state): State<SchedulingAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<BookAppointmentRequest>, AppError>,
) -> AppResult<(StatusCode, Json<Appointment>)> {
    let appointment = state.scheduling.book_appointment(&session, request).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn update_appointment_status(
    State(state): State<SchedulingAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(appointment_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateAppointmentStatusRequest>, AppError>,
) -> AppResult<Json<Appointment>> {
    Ok(Json(
        state
            .scheduling
            .update_appointment_status(&session, appointment_id, request.status)
            .await?,
    ))
}

async fn list_events(
    State(state): State<SchedulingAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<EventRangeQuery>, AppError>,
) -> AppResult<Json<Vec<PersonalEvent>>> {
    Ok(Json(state.scheduling.list_events(session.user_id, &query).await?))
}

async fn create_event(
    State(state): State<SchedulingAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<CreatePersonalEventRequest>, AppError>,
) -> AppResult<(StatusCode, Json<PersonalEvent>)> {
    let event = state.scheduling.create_event(session.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn update_event(
    State(state): State<SchedulingAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(event_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdatePersonalEventRequest>, AppError>,
) -> AppResult<Json<PersonalEvent>> {
    Ok(Json(
        state
            .scheduling
            .update_event(session.user_id, event_id, request)
            .await?,
    ))
}

async fn delete_event(
    State(state): State<SchedulingAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(event_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<StatusCode> {
    state.scheduling.delete_event(session.user_id, event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
