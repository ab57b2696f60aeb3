use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "quote_status", rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    Accepted,
    Declined,
}

impl QuoteStatus {
    /// Only pending requests can be answered, and only once
    pub fn can_transition_to(self, next: QuoteStatus) -> bool {
        matches!(
            (self, next),
            (QuoteStatus::Pending, QuoteStatus::Accepted) | (QuoteStatus::Pending, QuoteStatus::Declined)
        )
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            QuoteStatus::Pending => "pending",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Declined => "declined",
        };
        f.write_str(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuoteRequest {
    pub id: Uuid,
    pub personal_id: Uuid,
    pub student_id: Uuid,
    pub message: String,
    pub goal: Option<String>,
    pub sessions_per_week: Option<i32>,
    pub status: QuoteStatus,
    pub proposed_price: Option<f64>,
    pub response_message: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuoteRequest {
    pub personal_id: Uuid,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    #[validate(length(max = 500))]
    pub goal: Option<String>,
    #[validate(range(min = 1, max = 14))]
    pub sessions_per_week: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RespondQuoteRequest {
    pub accept: bool,
    #[validate(range(min = 0.0))]
    pub proposed_price: Option<f64>,
    #[validate(length(max = 2000))]
    pub response_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub status: Option<QuoteStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_transitions() {
        assert!(QuoteStatus::Pending.can_transition_to(QuoteStatus::Accepted));
        assert!(QuoteStatus::Pending.can_transition_to(QuoteStatus::Declined));
        assert!(!QuoteStatus::Accepted.can_transition_to(QuoteStatus::Declined));
        assert!(!QuoteStatus::Declined.can_transition_to(QuoteStatus::Pending));
    }
}
