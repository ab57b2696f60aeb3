use axum::{routing::get, Router};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use super::auth::{admin_routes, auth_routes};
use super::calendar::calendar_routes;
use super::finance::finance_routes;
use super::health::health_check;
use super::marketplace::{personals_routes, profile_routes, students_routes};
use super::notifications::notification_routes;
use super::quotes::quotes_routes;
use super::scheduling::{appointments_routes, availability_routes, events_routes};
use super::store::store_routes;
use super::workouts::{assignments_routes, suggestions_routes, workouts_routes};
use crate::auth::{cors_layer, security_headers_layer, AuthService};
use crate::services::NotificationService;

pub fn create_routes(db: PgPool, jwt_secret: &str, notifications: NotificationService) -> Router {
    let auth_service = AuthService::new(db.clone(), jwt_secret);

    let api_v1 = Router::new()
        .nest("/auth", auth_routes(auth_service.clone()))
        .nest("/admin", admin_routes(db.clone(), auth_service.clone()))
        // Marketplace and relationships
        .nest("/personals", personals_routes(db.clone(), auth_service.clone(), notifications.clone()))
        .nest("/profile", profile_routes(db.clone(), auth_service.clone(), notifications.clone()))
        .nest("/students", students_routes(db.clone(), auth_service.clone(), notifications.clone()))
        // Training
        .nest("/workouts", workouts_routes(db.clone(), auth_service.clone(), notifications.clone()))
        .nest("/assignments", assignments_routes(db.clone(), auth_service.clone(), notifications.clone()))
        .nest("/suggestions", suggestions_routes(db.clone(), auth_service.clone(), notifications.clone()))
        // Scheduling
        .nest("/availability", availability_routes(db.clone(), auth_service.clone(), notifications.clone()))
        .nest("/appointments", appointments_routes(db.clone(), auth_service.clone(), notifications.clone()))
        .nest("/events", events_routes(db.clone(), auth_service.clone(), notifications.clone()))
        .nest("/calendar", calendar_routes(db.clone(), auth_service.clone(), notifications.clone()))
        // Business
        .nest("/quotes", quotes_routes(db.clone(), auth_service.clone(), notifications.clone()))
        .nest("/finance", finance_routes(db.clone(), auth_service.clone()))
        .nest("/store", store_routes(db, auth_service.clone(), notifications.clone()))
        .nest("/notifications", notification_routes(auth_service, notifications));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .layer(security_headers_layer())
        .layer(cors_layer())
}
