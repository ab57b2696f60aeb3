use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateQuoteRequest, NotificationKind, QuoteQuery, QuoteRequest, QuoteStatus, RespondQuoteRequest,
};
use crate::services::profile_service::{personal_by_id, personal_for_user, student_by_id, student_for_user};
use crate::services::NotificationService;

const QUOTE_COLUMNS: &str = "id, personal_id, student_id, message, goal, sessions_per_week, status, \
     proposed_price, response_message, responded_at, created_at";

#[derive(Clone)]
pub struct QuoteService {
    db: PgPool,
    notifications: NotificationService,
}

impl QuoteService {
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn request_quote(&self, user_id: Uuid, request: CreateQuoteRequest) -> AppResult<QuoteRequest> {
        request.validate()?;

        let student = student_for_user(&self.db, user_id).await?;
        let personal = personal_by_id(&self.db, request.personal_id).await?;

        let pending = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM quote_requests
                 WHERE personal_id = $1 AND student_id = $2 AND status = 'pending'
             )",
        )
        .bind(personal.id)
        .bind(student.id)
        .fetch_one(&self.db)
        .await?;

        if pending {
            return Err(AppError::conflict("A quote request to this personal is already pending"));
        }

        let quote = sqlx::query_as::<_, QuoteRequest>(&format!(
            "INSERT INTO quote_requests (id, personal_id, student_id, message, goal, sessions_per_week, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)
             RETURNING {QUOTE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(personal.id)
        .bind(student.id)
        .bind(request.message)
        .bind(request.goal)
        .bind(request.sessions_per_week)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        self.notifications
            .notify(
                personal.user_id,
                NotificationKind::QuoteReceived,
                "New quote request",
                format!("{} asked you for a quote", student.name),
                Some(serde_json::json!({ "quote_id": quote.id })),
            )
            .await;

        Ok(quote)
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn respond(
        &self,
        user_id: Uuid,
        quote_id: Uuid,
        request: RespondQuoteRequest,
    ) -> AppResult<QuoteRequest> {
        request.validate()?;

        let personal = personal_for_user(&self.db, user_id).await?;
        let quote = self.get_for_personal(personal.id, quote_id).await?;

        let next = if request.accept {
            QuoteStatus::Accepted
        } else {
            QuoteStatus::Declined
        };
        if !quote.status.can_transition_to(next) {
            return Err(AppError::invalid_transition(quote.status, next));
        }
        if next == QuoteStatus::Accepted && request.proposed_price.is_none() {
            return Err(AppError::bad_request("An accepted quote needs a proposed price"));
        }

        let updated = sqlx::query_as::<_, QuoteRequest>(&format!(
            "UPDATE quote_requests
             SET status = $2, proposed_price = $3, response_message = $4, responded_at = $5
             WHERE id = $1 AND status = 'pending'
             RETURNING {QUOTE_COLUMNS}"
        ))
        .bind(quote.id)
        .bind(next)
        .bind(request.proposed_price)
        .bind(request.response_message)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::conflict("Quote request was answered concurrently"))?;

        let student = student_by_id(&self.db, updated.student_id).await?;
        self.notifications
            .notify(
                student.user_id,
                NotificationKind::QuoteAnswered,
                "Your quote request was answered",
                format!("{} {} your request", personal.display_name, next),
                Some(serde_json::json!({
                    "quote_id": updated.id,
                    "status": next,
                    "proposed_price": updated.proposed_price,
                })),
            )
            .await;

        Ok(updated)
    }

    pub async fn list_incoming(&self, user_id: Uuid, query: &QuoteQuery) -> AppResult<Vec<QuoteRequest>> {
        let personal = personal_for_user(&self.db, user_id).await?;

        let quotes = sqlx::query_as::<_, QuoteRequest>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quote_requests
             WHERE personal_id = $1 AND ($2::quote_status IS NULL OR status = $2)
             ORDER BY created_at DESC"
        ))
        .bind(personal.id)
        .bind(query.status)
        .fetch_all(&self.db)
        .await?;

        Ok(quotes)
    }

    pub async fn list_outgoing(&self, user_id: Uuid, query: &QuoteQuery) -> AppResult<Vec<QuoteRequest>> {
        let student = student_for_user(&self.db, user_id).await?;

        let quotes = sqlx::query_as::<_, QuoteRequest>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quote_requests
             WHERE student_id = $1 AND ($2::quote_status IS NULL OR status = $2)
             ORDER BY created_at DESC"
        ))
        .bind(student.id)
        .bind(query.status)
        .fetch_all(&self.db)
        .await?;

        Ok(quotes)
    }

    async fn get_for_personal(&self, personal_id: Uuid, quote_id: Uuid) -> AppResult<QuoteRequest> {
        sqlx::query_as::<_, QuoteRequest>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quote_requests WHERE id = $1 AND personal_id = $2"
        ))
        .bind(quote_id)
        .bind(personal_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Quote request"))
    }
}
