use axum::{
    extract::{Query, State},
    middleware,
    response::Json,
    routing::get,
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use sqlx::PgPool;

use crate::auth::{jwt_auth_middleware, AuthService, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{CalendarQuery, CalendarView, CalendarViewKind};
use crate::services::{CalendarService, NotificationService, SchedulingService};

#[derive(Clone)]
pub struct CalendarAppState {
    pub calendar: CalendarService,
}

pub fn calendar_routes(db: PgPool, auth_service: AuthService, notifications: NotificationService) -> Router {
    let scheduling = SchedulingService::new(db.clone(), notifications);
    let state = CalendarAppState {
        calendar: CalendarService::new(db, scheduling),
    };

    Router::new()
        .route("/week", get(week_view))
        .route("/day", get(day_view))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(state)
}

/// Monday-to-Sunday grid for the week containing `date`
#[tracing::instrument(skip(state, session))]
async fn week_view(
    State(state): State<CalendarAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<CalendarQuery>, AppError>,
) -> AppResult<Json<CalendarView>> {
    Ok(Json(state.calendar.view(&session, CalendarViewKind::Week, &query).await?))
}

#[tracing::instrument(skip(state, session))]
async fn day_view(
    State(state): State<CalendarAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<CalendarQuery>, AppError>,
) -> AppResult<Json<CalendarView>> {
    Ok(Json(state.calendar.view(&session, CalendarViewKind::Day, &query).await?))
}
