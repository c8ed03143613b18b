//! Record store adapter
//!
//! Idempotent persistence for expense records, keyed by the stable
//! `expense_id` and by a (user, associated message) lookup used to resume
//! edit/delete flows. In-memory backing for development and tests, Postgres
//! backing for deployment.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use uuid::Uuid;

use crate::draft::DraftExpense;
use crate::error::ExpenseError;
use crate::models::{RateSnapshot, UpsertStatus};
use crate::Result;

/// Trait for expense record persistence
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// Insert the draft or update the record with the same `expense_id`.
    /// Updates replace all mutable fields in place, preserving `expense_id`
    /// and the originally stamped `created_at`.
    async fn upsert(&self, draft: &DraftExpense) -> Result<(Uuid, UpsertStatus)>;

    /// Full-field lookup by the report message association. The sole
    /// mechanism for rehydrating a draft in edit/delete flows.
    async fn find_by_message(&self, user_id: i64, message_id: i64) -> Result<Option<DraftExpense>>;

    /// Returns `true` if a record was deleted, `false` if none matched.
    async fn delete_by_message(&self, user_id: i64, message_id: i64) -> Result<bool>;
}

fn require<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| {
        ExpenseError::Internal(format!("upsert on non-ready draft: missing {}", field))
    })
}

//
// ================= In-memory store =================
//

/// In-memory expense store for development and tests
pub struct InMemoryExpenseStore {
    records: Arc<RwLock<HashMap<Uuid, DraftExpense>>>,
}

impl InMemoryExpenseStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

impl Default for InMemoryExpenseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExpenseStore for InMemoryExpenseStore {
    async fn upsert(&self, draft: &DraftExpense) -> Result<(Uuid, UpsertStatus)> {
        require(draft.user_id, "user_id")?;
        require(draft.category_id, "category_id")?;
        require(draft.spent_on, "spent_on")?;
        require(draft.amount, "amount")?;
        require(draft.currency.as_ref(), "currency")?;
        require(draft.rate_snapshot.as_ref(), "rate_snapshot")?;
        require(draft.comment.as_ref(), "comment")?;
        require(draft.created_at, "created_at")?;

        let mut records = self.records.write().await;
        match records.get_mut(&draft.expense_id) {
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = draft.clone();
                existing.created_at = created_at;
                Ok((draft.expense_id, UpsertStatus::Updated))
            }
            None => {
                records.insert(draft.expense_id, draft.clone());
                Ok((draft.expense_id, UpsertStatus::Inserted))
            }
        }
    }

    async fn find_by_message(&self, user_id: i64, message_id: i64) -> Result<Option<DraftExpense>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.user_id == Some(user_id) && r.associated_message_id == Some(message_id))
            .cloned())
    }

    async fn delete_by_message(&self, user_id: i64, message_id: i64) -> Result<bool> {
        let mut records = self.records.write().await;
        let found = records
            .values()
            .find(|r| r.user_id == Some(user_id) && r.associated_message_id == Some(message_id))
            .map(|r| r.expense_id);
        match found {
            Some(id) => {
                records.remove(&id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

//
// ================= Postgres store =================
//

/// Postgres-backed expense store. Schema is created lazily on first use.
pub struct PgExpenseStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PgExpenseStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| ExpenseError::Database(format!("Failed to configure pool: {}", e)))?;
        Ok(Self::new(pool))
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS expenses (
                      expense_id UUID PRIMARY KEY,
                      user_id BIGINT NOT NULL,
                      category_id UUID NOT NULL,
                      spent_on DATE NOT NULL,
                      amount DOUBLE PRECISION NOT NULL,
                      currency TEXT NOT NULL,
                      rates JSONB NOT NULL,
                      comment TEXT NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL,
                      message_id BIGINT
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_expenses_user_message
                    ON expenses (user_id, message_id);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                ExpenseError::Database(format!("Failed to initialize expenses schema: {}", e))
            })?;
        Ok(())
    }

    fn row_to_draft(row: &sqlx::postgres::PgRow) -> Result<DraftExpense> {
        let rates_json: Value = row
            .try_get("rates")
            .map_err(|e| ExpenseError::Database(format!("Failed to read rates column: {}", e)))?;
        let rate_snapshot: RateSnapshot = serde_json::from_value(rates_json)?;

        let get = |e: sqlx::Error| ExpenseError::Database(format!("Failed to read row: {}", e));

        Ok(DraftExpense {
            expense_id: row.try_get("expense_id").map_err(get)?,
            user_id: Some(row.try_get("user_id").map_err(get)?),
            category_id: Some(row.try_get("category_id").map_err(get)?),
            spent_on: Some(row.try_get("spent_on").map_err(get)?),
            amount: Some(row.try_get("amount").map_err(get)?),
            currency: Some(row.try_get("currency").map_err(get)?),
            rate_snapshot: Some(rate_snapshot),
            comment: Some(row.try_get("comment").map_err(get)?),
            created_at: Some(row.try_get("created_at").map_err(get)?),
            associated_message_id: row.try_get("message_id").map_err(get)?,
        })
    }
}

#[async_trait]
impl ExpenseStore for PgExpenseStore {
    async fn upsert(&self, draft: &DraftExpense) -> Result<(Uuid, UpsertStatus)> {
        self.ensure_schema().await?;

        let user_id = require(draft.user_id, "user_id")?;
        let category_id = require(draft.category_id, "category_id")?;
        let spent_on = require(draft.spent_on, "spent_on")?;
        let amount = require(draft.amount, "amount")?;
        let currency = require(draft.currency.clone(), "currency")?;
        let rates = serde_json::to_value(require(draft.rate_snapshot.as_ref(), "rate_snapshot")?)?;
        let comment = require(draft.comment.clone(), "comment")?;
        let created_at = require(draft.created_at, "created_at")?;

        let existing = sqlx::query("SELECT 1 FROM expenses WHERE expense_id = $1")
            .bind(draft.expense_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ExpenseError::Database(format!("Failed to check existing record: {}", e)))?;

        if existing.is_some() {
            sqlx::query(
                r#"
                UPDATE expenses
                SET category_id = $2, spent_on = $3, amount = $4, currency = $5,
                    rates = $6, comment = $7, message_id = $8
                WHERE expense_id = $1
                "#,
            )
            .bind(draft.expense_id)
            .bind(category_id)
            .bind(spent_on)
            .bind(amount)
            .bind(&currency)
            .bind(&rates)
            .bind(&comment)
            .bind(draft.associated_message_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ExpenseError::Database(format!("Failed to update expense: {}", e)))?;
            return Ok((draft.expense_id, UpsertStatus::Updated));
        }

        sqlx::query(
            r#"
            INSERT INTO expenses
              (expense_id, user_id, category_id, spent_on, amount, currency, rates, comment, created_at, message_id)
            VALUES
              ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(draft.expense_id)
        .bind(user_id)
        .bind(category_id)
        .bind(spent_on)
        .bind(amount)
        .bind(&currency)
        .bind(&rates)
        .bind(&comment)
        .bind(created_at)
        .bind(draft.associated_message_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ExpenseError::Database(format!("Failed to insert expense: {}", e)))?;

        Ok((draft.expense_id, UpsertStatus::Inserted))
    }

    async fn find_by_message(&self, user_id: i64, message_id: i64) -> Result<Option<DraftExpense>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            SELECT expense_id, user_id, category_id, spent_on, amount, currency,
                   rates, comment, created_at, message_id
            FROM expenses
            WHERE user_id = $1 AND message_id = $2
            "#,
        )
        .bind(user_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ExpenseError::Database(format!("Failed to load expense: {}", e)))?;

        row.as_ref().map(Self::row_to_draft).transpose()
    }

    async fn delete_by_message(&self, user_id: i64, message_id: i64) -> Result<bool> {
        self.ensure_schema().await?;

        let result = sqlx::query("DELETE FROM expenses WHERE user_id = $1 AND message_id = $2")
            .bind(user_id)
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ExpenseError::Database(format!("Failed to delete expense: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}
