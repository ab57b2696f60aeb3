use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    jwt_auth_middleware, personal_only_middleware, student_only_middleware, AuthService, UserSession,
};
use crate::errors::{AppError, AppResult};
use crate::models::{CreateQuoteRequest, QuoteQuery, QuoteRequest, RespondQuoteRequest};
use crate::services::{NotificationService, QuoteService};

#[derive(Clone)]
pub struct QuotesAppState {
    pub quotes: QuoteService,
}

pub fn quotes_routes(db: PgPool, auth_service: AuthService, notifications: NotificationService) -> Router {
    let state = QuotesAppState {
        quotes: QuoteService::new(db, notifications),
    };

    Router::new()
        .route(
            "/",
            post(request_quote).route_layer(middleware::from_fn(student_only_middleware)),
        )
        .route(
            "/sent",
            get(list_sent).route_layer(middleware::from_fn(student_only_middleware)),
        )
        .route(
            "/received",
            get(list_received).route_layer(middleware::from_fn(personal_only_middleware)),
        )
        .route(
            "/:quote_id/respond",
            post(respond_quote).route_layer(middleware::from_fn(personal_only_middleware)),
        )
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(state)
}

async fn request_quote(
    State(state): State<QuotesAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<CreateQuoteRequest>, AppError>,
) -> AppResult<(StatusCode, Json<QuoteRequest>)> {
    let quote = state.quotes.request_quote(session.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

async fn list_sent(
    State(state): State<QuotesAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<QuoteQuery>, AppError>,
) -> AppResult<Json<Vec<QuoteRequest>>> {
    Ok(Json(state.quotes.list_outgoing(session.user_id, &query).await?))
}

async fn list_received(
    State(state): State<QuotesAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<QuoteQuery>, AppError>,
) -> AppResult<Json<Vec<QuoteRequest>>> {
    Ok(Json(state.quotes.list_incoming(session.user_id, &query).await?))
}

/// Accept with a price or decline
async fn respond_quote(
    State(state): State<QuotesAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(quote_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<RespondQuoteRequest>, AppError>,
) -> AppResult<Json<QuoteRequest>> {
    Ok(Json(state.quotes.respond(session.user_id, quote_id, request).await?))
}
