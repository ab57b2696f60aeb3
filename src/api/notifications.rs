use axum::{
    extract::{Path, Query, State},
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{jwt_auth_middleware, AuthService, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{Notification, NotificationQuery, UnreadCount};
use crate::services::NotificationService;

#[derive(Clone)]
pub struct NotificationsAppState {
    pub notifications: NotificationService,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub marked: usize,
}

/// Inbox of the signed-in user. Notifications live in memory only.
pub fn notification_routes(auth_service: AuthService, notifications: NotificationService) -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/:notification_id/read", post(mark_read))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(NotificationsAppState { notifications })
}

async fn list_notifications(
    State(state): State<NotificationsAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<NotificationQuery>, AppError>,
) -> AppResult<Json<Vec<Notification>>> {
    Ok(Json(state.notifications.list(session.user_id, &query).await))
}

async fn unread_count(
    State(state): State<NotificationsAppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<UnreadCount>> {
    let unread = state.notifications.unread_count(session.user_id).await;
    Ok(Json(UnreadCount { unread }))
}

async fn mark_read(
    State(state): State<NotificationsAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(notification_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Notification>> {
    Ok(Json(
        state
            .notifications
            .mark_read(session.user_id, notification_id)
            .await?,
    ))
}

async fn mark_all_read(
    State(state): State<NotificationsAppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<MarkAllReadResponse>> {
    let marked = state.notifications.mark_all_read(session.user_id).await;
    Ok(Json(MarkAllReadResponse { marked }))
}
