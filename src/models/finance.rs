use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "financial_kind", rename_all = "snake_case")]
pub enum FinancialKind {
    Income,
    Expense,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FinancialRecord {
    pub id: Uuid,
    pub personal_id: Uuid,
    pub kind: FinancialKind,
    pub category: String,
    pub amount: f64,
    pub description: Option<String>,
    pub occurred_on: NaiveDate,
    pub student_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFinancialRecordRequest {
    pub kind: FinancialKind,
    #[validate(length(min = 1, max = 60))]
    pub category: String,
    #[validate(range(min = 0.01, max = 1000000.0))]
    pub amount: f64,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub occurred_on: NaiveDate,
    pub student_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFinancialRecordRequest {
    pub kind: Option<FinancialKind>,
    #[validate(length(min = 1, max = 60))]
    pub category: Option<String>,
    #[validate(range(min = 0.01, max = 1000000.0))]
    pub amount: Option<f64>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub occurred_on: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FinanceQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub kind: Option<FinancialKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub kind: FinancialKind,
    pub category: String,
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    pub by_category: Vec<CategoryTotal>,
}
