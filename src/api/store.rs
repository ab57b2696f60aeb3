use axum::{
    extract::{Path, State},
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
use crate::models::{CreateProductRequest, Order, OrderView, Product, UpdateProductRequest};
use crate::services::{NotificationService, StoreService};

#[derive(Clone)]
pub struct StoreAppState {
    pub store: StoreService,
}

/// Personals manage products; students buy them. Public listing lives under
/// `/personals/:id/products`.
pub fn store_routes(db: PgPool, auth_service: AuthService, notifications: NotificationService) -> Router {
    let state = StoreAppState {
        store: StoreService::new(db, notifications),
    };

    Router::new()
        .route(
            "/products",
            get(list_my_products)
                .post(create_product)
                .route_layer(middleware::from_fn(personal_only_middleware)),
        )
        .route(
            "/products/:product_id",
            put(update_product)
                .delete(deactivate_product)
                .route_layer(middleware::from_fn(personal_only_middleware)),
        )
        .route(
            "/products/:product_id/purchase",
            post(purchase).route_layer(middleware::from_fn(student_only_middleware)),
        )
        .route(
            "/orders",
            get(list_my_orders).route_layer(middleware::from_fn(student_only_middleware)),
        )
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(state)
}

async fn list_my_products(
    State(state): State<StoreAppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.store.list_my_products(session.user_id).await?))
}

async fn create_product(
    State(state): State<StoreAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<CreateProductRequest>, AppError>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let product = state.store.create_product(session.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(state): State<StoreAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(product_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateProductRequest>, AppError>,
) -> AppResult<Json<Product>> {
    Ok(Json(
        state
            .store
            .update_product(session.user_id, product_id, request)
            .await?,
    ))
}

/// Products are deactivated rather than deleted so orders keep their history
async fn deactivate_product(
    State(state): State<StoreAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(product_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Product>> {
    Ok(Json(
        state
            .store
            .deactivate_product(session.user_id, product_id)
            .await?,
    ))
}

#[tracing::instrument(skip(state, session))]
async fn purchase(
    State(state): State<StoreAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(product_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<(StatusCode, Json<Order>)> {
    let order = state.store.purchase(session.user_id, product_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_my_orders(
    State(state): State<StoreAppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<Vec<OrderView>>> {
    Ok(Json(state.store.list_my_orders(session.user_id).await?))
}
