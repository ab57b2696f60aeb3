use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::errors::{AppError, AppResult};
use crate::models::{
    CategoryTotal, CreateFinancialRecordRequest, FinanceQuery, FinancialKind, FinancialRecord, FinancialSummary,
    UpdateFinancialRecordRequest,
};
use crate::services::profile_service::{personal_for_user, student_of_personal};

pub(crate) const RECORD_COLUMNS: &str =
    "id, personal_id, kind, category, amount, description, occurred_on, student_id, created_at";

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Default summary period: first day of the current month up to today
pub fn default_period(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today.with_day(1).unwrap_or(today), today)
}

/// Totals for a set of records. Categories are grouped case-insensitively and
/// sorted by kind, then by total descending.
pub fn summarize(records: &[FinancialRecord], from: NaiveDate, to: NaiveDate) -> FinancialSummary {
    let mut totals: BTreeMap<(FinancialKind, String), (String, f64, usize)> = BTreeMap::new();
    let mut total_income = 0.0;
    let mut total_expense = 0.0;

    for record in records {
        match record.kind {
            FinancialKind::Income => total_income += record.amount,
            FinancialKind::Expense => total_expense += record.amount,
        }

        let key = (record.kind, record.category.trim().to_lowercase());
        let slot = totals
            .entry(key)
            .or_insert_with(|| (record.category.trim().to_string(), 0.0, 0));
        slot.1 += record.amount;
        slot.2 += 1;
    }

    let mut by_category: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|((kind, _), (category, total, count))| CategoryTotal {
            kind,
            category,
            total: round_cents(total),
            count,
        })
        .collect();
    by_category.sort_by(|a, b| a.kind.cmp(&b.kind).then(b.total.total_cmp(&a.total)));

    FinancialSummary {
        from,
        to,
        total_income: round_cents(total_income),
        total_expense: round_cents(total_expense),
        balance: round_cents(total_income - total_expense),
        by_category,
    }
}

#[derive(Clone)]
pub struct FinanceService {
    db: PgPool,
}

impl FinanceService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn create_record(
        &self,
        user_id: Uuid,
        request: CreateFinancialRecordRequest,
    ) -> AppResult<FinancialRecord> {
        request.validate()?;
        let personal = personal_for_user(&self.db, user_id).await?;

        if let Some(student_id) = request.student_id {
            student_of_personal(&self.db, personal.id, student_id).await?;
        }

        let record = sqlx::query_as::<_, FinancialRecord>(&format!(
            "INSERT INTO financial_records (id, personal_id, kind, category, amount, description, occurred_on, student_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(personal.id)
        .bind(request.kind)
        .bind(request.category.trim())
        .bind(request.amount)
        .bind(request.description)
        .bind(request.occurred_on)
        .bind(request.student_id)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok(record)
    }

    pub async fn list_records(&self, user_id: Uuid, query: &FinanceQuery) -> AppResult<Vec<FinancialRecord>> {
        let personal = personal_for_user(&self.db, user_id).await?;
        self.records_between(personal.id, query.from, query.to, query.kind).await
    }

    pub async fn get_record(&self, user_id: Uuid, record_id: Uuid) -> AppResult<FinancialRecord> {
        let personal = personal_for_user(&self.db, user_id).await?;
        self.owned_record(personal.id, record_id).await
    }

    pub async fn update_record(
        &self,
        user_id: Uuid,
        record_id: Uuid,
        request: UpdateFinancialRecordRequest,
    ) -> AppResult<FinancialRecord> {
        request.validate()?;
        let personal = personal_for_user(&self.db, user_id).await?;

        sqlx::query_as::<_, FinancialRecord>(&format!(
            "UPDATE financial_records
             SET kind = COALESCE($3, kind),
                 category = COALESCE($4, category),
                 amount = COALESCE($5, amount),
                 description = COALESCE($6, description),
                 occurred_on = COALESCE($7, occurred_on)
             WHERE id = $1 AND personal_id = $2
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(record_id)
        .bind(personal.id)
        .bind(request.kind)
        .bind(request.category.as_deref().map(str::trim))
        .bind(request.amount)
        .bind(request.description)
        .bind(request.occurred_on)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Financial record"))
    }

    pub async fn delete_record(&self, user_id: Uuid, record_id: Uuid) -> AppResult<()> {
        let personal = personal_for_user(&self.db, user_id).await?;

        let result = sqlx::query("DELETE FROM financial_records WHERE id = $1 AND personal_id = $2")
            .bind(record_id)
            .bind(personal.id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Financial record"));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn summary(&self, user_id: Uuid, query: &FinanceQuery) -> AppResult<FinancialSummary> {
        let personal = personal_for_user(&self.db, user_id).await?;

        let (default_from, default_to) = default_period(Utc::now().date_naive());
        let from = query.from.unwrap_or(default_from);
        let to = query.to.unwrap_or(default_to);
        if from > to {
            return Err(AppError::bad_request("`from` must not be after `to`"));
        }

        let records = self.records_between(personal.id, Some(from), Some(to), query.kind).await?;
        Ok(summarize(&records, from, to))
    }

    async fn records_between(
        &self,
        personal_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        kind: Option<FinancialKind>,
    ) -> AppResult<Vec<FinancialRecord>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {RECORD_COLUMNS} FROM financial_records WHERE personal_id = "
        ));
        builder.push_bind(personal_id);

        if let Some(from) = from {
            builder.push(" AND occurred_on >= ").push_bind(from);
        }
        if let Some(to) = to {
            builder.push(" AND occurred_on <= ").push_bind(to);
        }
        if let Some(kind) = kind {
            builder.push(" AND kind = ").push_bind(kind);
        }
        builder.push(" ORDER BY occurred_on DESC, created_at DESC");

        let records = builder
            .build_query_as::<FinancialRecord>()
            .fetch_all(&self.db)
            .await?;

        Ok(records)
    }

    async fn owned_record(&self, personal_id: Uuid, record_id: Uuid) -> AppResult<FinancialRecord> {
        sqlx::query_as::<_, FinancialRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM financial_records WHERE id = $1 AND personal_id = $2"
        ))
        .bind(record_id)
        .bind(personal_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Financial record"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(kind: FinancialKind, category: &str, amount: f64) -> FinancialRecord {
        FinancialRecord {
            id: Uuid::new_v4(),
            personal_id: Uuid::new_v4(),
            kind,
            category: category.to_string(),
            amount,
            description: None,
            occurred_on: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            student_id: None,
            created_at: Utc::now(),
        }
    }

    fn march() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
    }

    #[test]
    fn test_summarize_totals_and_balance() {
        let (from, to) = march();
        let records = vec![
            record(FinancialKind::Income, "Sessions", 300.0),
            record(FinancialKind::Income, "sessions ", 150.5),
            record(FinancialKind::Income, "Store", 49.9),
            record(FinancialKind::Expense, "Gym rent", 200.0),
            record(FinancialKind::Expense, "Equipment", 80.25),
        ];

        let summary = summarize(&records, from, to);

        assert_eq!(summary.total_income, 500.4);
        assert_eq!(summary.total_expense, 280.25);
        assert_eq!(summary.balance, 220.15);

        let categories: Vec<_> = summary
            .by_category
            .iter()
            .map(|c| (c.kind, c.category.as_str(), c.total, c.count))
            .collect();
        assert_eq!(
            categories,
            vec![
                (FinancialKind::Income, "Sessions", 450.5, 2),
                (FinancialKind::Income, "Store", 49.9, 1),
                (FinancialKind::Expense, "Gym rent", 200.0, 1),
                (FinancialKind::Expense, "Equipment", 80.25, 1),
            ]
        );
    }

    #[test]
    fn test_summarize_empty_period() {
        let (from, to) = march();
        let summary = summarize(&[], from, to);

        assert_eq!(summary.balance, 0.0);
        assert!(summary.by_category.is_empty());
    }

    #[test]
    fn test_negative_balance() {
        let (from, to) = march();
        let summary = summarize(&[record(FinancialKind::Expense, "Rent", 120.0)], from, to);
        assert_eq!(summary.balance, -120.0);
    }

    #[test]
    fn test_default_period_starts_on_first_of_month() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        assert_eq!(default_period(today), (NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), today));
    }
}
