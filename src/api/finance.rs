use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::get,
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{jwt_auth_middleware, personal_only_middleware, AuthService, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateFinancialRecordRequest, FinanceQuery, FinancialRecord, FinancialSummary, UpdateFinancialRecordRequest,
};
use crate::services::FinanceService;

#[derive(Clone)]
pub struct FinanceAppState {
    pub finance: FinanceService,
}

/// Income and expense bookkeeping for personals
pub fn finance_routes(db: PgPool, auth_service: AuthService) -> Router {
    let state = FinanceAppState {
        finance: FinanceService::new(db),
    };

    Router::new()
        .route("/records", get(list_records).post(create_record))
        .route(
            "/records/:record_id",
            get(get_record).put(update_record).delete(delete_record),
        )
        .route("/summary", get(summary))
        .route_layer(middleware::from_fn(personal_only_middleware))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(state)
}

async fn list_records(
    State(state): State<FinanceAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<FinanceQuery>, AppError>,
) -> AppResult<Json<Vec<FinancialRecord>>> {
    Ok(Json(state.finance.list_records(session.user_id, &query).await?))
}

async fn create_record(
    State(state): State<FinanceAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<CreateFinancialRecordRequest>, AppError>,
) -> AppResult<(StatusCode, Json<FinancialRecord>)> {
    let record = state.finance.create_record(session.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_record(
    State(state): State<FinanceAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(record_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<FinancialRecord>> {
    Ok(Json(state.finance.get_record(session.user_id, record_id).await?))
}

async fn update_record(
    State(state): State<FinanceAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(record_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateFinancialRecordRequest>, AppError>,
) -> AppResult<Json<FinancialRecord>> {
    Ok(Json(
        state
            .finance
            .update_record(session.user_id, record_id, request)
            .await?,
    ))
}

async fn delete_record(
    State(state): State<FinanceAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(record_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<StatusCode> {
    state.finance.delete_record(session.user_id, record_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Totals for a period, defaulting to the current month
async fn summary(
    State(state): State<FinanceAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Query(query), _): WithRejection<Query<FinanceQuery>, AppError>,
) -> AppResult<Json<FinancialSummary>> {
    Ok(Json(state.finance.summary(session.user_id, &query).await?))
}
