use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    jwt_auth_middleware, personal_only_middleware, student_only_middleware, AuthService, UserSession,
};
use crate::errors::{AppError, AppResult};
use crate::models::{
    AssignmentQuery, AssignmentView, AvailabilityOccurrence, CreateReviewRequest, LinkStudentRequest,
    PersonalDetail, PersonalProfile, PersonalSearchQuery, Product, Review, ReviewView, SlotQuery, Student,
    UpdatePersonalProfileRequest, UpdateStudentRequest,
};
use crate::services::{
    NotificationService, ProfileService, ReviewService, SchedulingService, StoreService, WorkoutService,
};

#[derive(Clone)]
pub struct MarketplaceAppState {
    pub profiles: ProfileService,
    pub reviews: ReviewService,
    pub scheduling: SchedulingService,
    pub store: StoreService,
    pub workouts: WorkoutService,
}

impl MarketplaceAppState {
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self {
            profiles: ProfileService::new(db.clone(), notifications.clone()),
            reviews: ReviewService::new(db.clone(), notifications.clone()),
            scheduling: SchedulingService::new(db.clone(), notifications.clone()),
            store: StoreService::new(db.clone(), notifications.clone()),
            workouts: WorkoutService::new(db, notifications),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Public marketplace browsing plus student actions on a personal
pub fn personals_routes(db: PgPool, auth_service: AuthService, notifications: NotificationService) -> Router {
    let state = MarketplaceAppState::new(db, notifications);

    Router::new()
        .route("/", get(search_personals))
        .route("/:personal_id", get(get_personal))
        .route(
            "/:personal_id/reviews",
            get(list_reviews).merge(
                post(create_review)
                    .route_layer(middleware::from_fn(student_only_middleware))
                    .route_layer(middleware::from_fn_with_state(
                        auth_service.clone(),
                        jwt_auth_middleware,
                    )),
            ),
        )
        .route(
            "/:personal_id/hire",
            post(hire_personal)
                .route_layer(middleware::from_fn(student_only_middleware))
                .route_layer(middleware::from_fn_with_state(
                    auth_service.clone(),
                    jwt_auth_middleware,
                )),
        )
        .route("/:personal_id/availability", get(personal_availability))
        .route("/:personal_id/products", get(personal_products))
        .with_state(state)
}

/// Own profile for either role
pub fn profile_routes(db: PgPool, auth_service: AuthService, notifications: NotificationService) -> Router {
    let state = MarketplaceAppState::new(db, notifications);

    Router::new()
        .route(
            "/personal",
            get(get_my_personal_profile)
                .put(update_my_personal_profile)
                .route_layer(middleware::from_fn(personal_only_middleware)),
        )
        .route(
            "/student",
            get(get_my_student_profile)
                .put(update_my_student_profile)
                .route_layer(middleware::from_fn(student_only_middleware)),
        )
        .route(
            "/student/leave",
            post(leave_personal).route_layer(middleware::from_fn(student_only_middleware)),
        )
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(state)
}

/// A personal's roster
pub fn students_routes(db: PgPool, auth_service: AuthService, notifications: NotificationService) -> Router {
    let state = MarketplaceAppState::new(db, notifications);

    Router::new()
        .route("/", get(list_my_students))
        .route("/link", post(link_student))
        .route("/:student_id", get(get_student))
        .route("/:student_id/assignments", get(list_student_assignments))
        .route_layer(middleware::from_fn(personal_only_middleware))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(state)
}

/// Search personals by specialty, city, rating and price
#[tracing::instrument(skip(state))]
async fn search_personals(
    State(state): State<MarketplaceAppState>,
    WithRejection(Query(query), _): WithRejection<Query<PersonalSearchQuery>, AppError>,
) -> AppResult<Json<Vec<PersonalProfile>>> {
    Ok(Json(state.profiles.search_personals(&query).await?))
}

async fn get_personal(
    State(state): State<MarketplaceAppState>,
    WithRejection(Path(personal_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<PersonalDetail>> {
    Ok(Json(state.profiles.get_personal_detail(personal_id).await?))
}

async fn list_reviews(
    State(state): State<MarketplaceAppState>,
    WithRejection(Path(personal_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Query(page), _): WithRejection<Query<PageQuery>, AppError>,
) -> AppResult<Json<Vec<ReviewView>>> {
    Ok(Json(
        state
            .reviews
            .list_reviews(personal_id, page.limit, page.offset)
            .await?,
    ))
}

async fn create_review(
    State(state): State<MarketplaceAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(personal_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<CreateReviewRequest>, AppError>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let review = state
        .reviews
        .create_review(session.user_id, personal_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn hire_personal(
    State(state): State<MarketplaceAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(personal_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Student>> {
    Ok(Json(state.profiles.hire_personal(session.user_id, personal_id).await?))
}

/// Availability of a personal, recurring slots expanded into the range
async fn personal_availability(
    State(state): State<MarketplaceAppState>,
    WithRejection(Path(personal_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Query(query), _): WithRejection<Query<SlotQuery>, AppError>,
) -> AppResult<Json<Vec<AvailabilityOccurrence>>> {
    let query = SlotQuery {
        personal_id: Some(personal_id),
        ..query
    };
    Ok(Json(state.scheduling.public_availability(&query).await?))
}

async fn personal_products(
    State(state): State<MarketplaceAppState>,
    WithRejection(Path(personal_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.store.list_storefront(personal_id).await?))
}

async fn get_my_personal_profile(
    State(state): State<MarketplaceAppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<PersonalProfile>> {
    Ok(Json(state.profiles.get_my_personal_profile(session.user_id).await?))
}

async fn update_my_personal_profile(
    State(state): State<MarketplaceAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<UpdatePersonalProfileRequest>, AppError>,
) -> AppResult<Json<PersonalProfile>> {
    Ok(Json(
        state
            .profiles
            .update_personal_profile(session.user_id, request)
            .await?,
    ))
}

async fn get_my_student_profile(
    State(state): State<MarketplaceAppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<Student>> {
    Ok(Json(state.profiles.get_my_student_profile(session.user_id).await?))
}

async fn update_my_student_profile(
    State(state): State<MarketplaceAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateStudentRequest>, AppError>,
) -> AppResult<Json<Student>> {
    Ok(Json(
        state
            .profiles
            .update_student_profile(session.user_id, request)
            .await?,
    ))
}

async fn leave_personal(
    State(state): State<MarketplaceAppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<Student>> {
    Ok(Json(state.profiles.leave_personal(session.user_id).await?))
}

async fn list_my_students(
    State(state): State<MarketplaceAppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<Vec<Student>>> {
    Ok(Json(state.profiles.list_my_students(session.user_id).await?))
}

/// Attach an existing student account to the calling personal
async fn link_student(
    State(state): State<MarketplaceAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Json(request), _): WithRejection<Json<LinkStudentRequest>, AppError>,
) -> AppResult<Json<Student>> {
    request.validate()?;
    Ok(Json(
        state
            .profiles
            .link_student_by_email(session.user_id, &request.email)
            .await?,
    ))
}

async fn get_student(
    State(state): State<MarketplaceAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(student_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Student>> {
    Ok(Json(
        state
            .profiles
            .get_student_for_personal(session.user_id, student_id)
            .await?,
    ))
}

async fn list_student_assignments(
    State(state): State<MarketplaceAppState>,
    Extension(session): Extension<UserSession>,
    WithRejection(Path(student_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Query(query), _): WithRejection<Query<AssignmentQuery>, AppError>,
) -> AppResult<Json<Vec<AssignmentView>>> {
    Ok(Json(
        state
            .workouts
            .list_student_assignments_for_personal(session.user_id, student_id, &query)
            .await?,
    ))
}
