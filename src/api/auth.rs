use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use axum_extra::{
    extract::WithRejection,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    admin_only_middleware, jwt_auth_middleware, rate_limit_middleware, AuthError, AuthResponse, AuthService,
    ChangePasswordRequest, LoginRequest, MessageResponse, RateLimitConfig, RateLimiter, RefreshTokenRequest,
    RegisterRequest, TokenResponse, UserInfo, UserSession,
};
use crate::errors::{AppError, AppResult};
use crate::models::{ListUsersQuery, PlatformStats, UserSummary};
use crate::services::UserService;

/// Authentication routes
pub fn auth_routes(auth_service: AuthService) -> Router {
    let rate_limiter = RateLimiter::from_config(&RateLimitConfig::default());

    Router::new()
        .route(
            "/register",
            post(register).route_layer(middleware::from_fn_with_state(
                rate_limiter.clone(),
                rate_limit_middleware,
            )),
        )
        .route(
            "/login",
            post(login).route_layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware)),
        )
        .route("/refresh", post(refresh_token))
        .route(
            "/logout",
            post(logout).route_layer(middleware::from_fn_with_state(
                auth_service.clone(),
                jwt_auth_middleware,
            )),
        )
        .route(
            "/me",
            get(me).route_layer(middleware::from_fn_with_state(
                auth_service.clone(),
                jwt_auth_middleware,
            )),
        )
        .route(
            "/change-password",
            post(change_password).route_layer(middleware::from_fn_with_state(
                auth_service.clone(),
                jwt_auth_middleware,
            )),
        )
        .with_state(auth_service)
}

/// Register a new personal or student
#[tracing::instrument(skip(auth_service, request))]
async fn register(
    State(auth_service): State<AuthService>,
    WithRejection(Json(request), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let response = auth_service.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Login user
#[tracing::instrument(skip(auth_service, request))]
async fn login(
    State(auth_service): State<AuthService>,
    WithRejection(Json(request), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<Json<AuthResponse>, AuthError> {
    let response = auth_service.login(request).await?;
    Ok(Json(response))
}

/// Refresh access token
#[tracing::instrument(skip(auth_service, request))]
async fn refresh_token(
    State(auth_service): State<AuthService>,
    WithRejection(Json(request), _): WithRejection<Json<RefreshTokenRequest>, AppError>,
) -> Result<Json<TokenResponse>, AuthError> {
    let response = auth_service.refresh_token(request).await?;
    Ok(Json(response))
}

/// Logout user
#[tracing::instrument(skip(auth_service, bearer))]
async fn logout(
    State(auth_service): State<AuthService>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<MessageResponse>, AuthError> {
    let response = auth_service.logout(bearer.token()).await?;
    Ok(Json(response))
}

/// Current user, including the id of their personal or student profile
#[tracing::instrument(skip(auth_service, session))]
async fn me(
    State(auth_service): State<AuthService>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<UserInfo>, AuthError> {
    Ok(Json(auth_service.me(&session).await?))
}

/// Change user password
#[tracing::instrument(skip(auth_service, session, request))]
async fn change_password(
    State(auth_service): State<AuthService>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<ChangePasswordRequest>, AppError>,
) -> Result<Json<MessageResponse>, AuthError> {
    Ok(Json(auth_service.change_password(&session, request).await?))
}

#[derive(Clone)]
pub struct AdminAppState {
    pub users: UserService,
}

/// Admin endpoints
pub fn admin_routes(db: PgPool, auth_service: AuthService) -> Router {
    let state = AdminAppState {
        users: UserService::new(db),
    };

    Router::new()
        .route("/users", get(list_users))
        .route("/users/:user_id", get(get_user))
        .route("/stats", get(platform_stats))
        .route_layer(middleware::from_fn(admin_only_middleware))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(state)
}

/// List users, optionally filtered by role
async fn list_users(
    State(state): State<AdminAppState>,
    WithRejection(Query(query), _): WithRejection<Query<ListUsersQuery>, AppError>,
) -> AppResult<Json<Vec<UserSummary>>> {
    Ok(Json(state.users.list_users(&query).await?))
}

async fn get_user(
    State(state): State<AdminAppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<UserSummary>> {
    Ok(Json(state.users.get_user(user_id).await?))
}

/// User counts by role and appointment counts by status
async fn platform_stats(State(state): State<AdminAppState>) -> AppResult<Json<PlatformStats>> {
    Ok(Json(state.users.platform_stats().await?))
}
