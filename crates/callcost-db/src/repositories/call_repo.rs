//! Call repository implementation
//!
//! PostgreSQL-backed call store. Each lifecycle transition is a single
//! conditional statement so that concurrent writers can never move a refunded
//! or invalid call back into a cost status.

use callcost_core::{
    models::{Call, CallStatus, NewIncomingCall},
    traits::{CallRepository, InsertOutcome},
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, error, instrument, warn};

/// PostgreSQL implementation of CallRepository
pub struct PgCallRepository {
    pool: PgPool,
}

impl PgCallRepository {
    /// Create a new call repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Parse call status from the column value
    fn parse_status(s: &str) -> AppResult<CallStatus> {
        CallStatus::from_str(s)
            .ok_or_else(|| AppError::Database(format!("Unknown call status in store: {}", s)))
    }

    /// Status values a quote outcome must not overwrite, bound as `TEXT[]`
    fn guarded_statuses() -> Vec<String> {
        CallStatus::quote_guarded()
            .map(|status| status.as_str().to_string())
            .collect()
    }

    /// Guarded transition shared by the quote-outcome writes
    async fn set_quote_outcome(
        &self,
        call_id: &str,
        status: CallStatus,
        cost: Option<Decimal>,
        currency: Option<&str>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE calls
            SET cost = COALESCE($3, cost),
                currency = COALESCE($4, currency),
                status = $2,
                processed_at = NOW()
            WHERE call_id = $1
              AND status <> ALL($5)
            "#,
        )
        .bind(call_id)
        .bind(status.as_str())
        .bind(cost)
        .bind(currency)
        .bind(Self::guarded_statuses())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error moving call {} to {}: {}", call_id, status, e);
            AppError::Database(format!("Failed to update call status: {}", e))
        })?;

        let changed = result.rows_affected() > 0;
        if !changed {
            warn!(call_id = %call_id, target = %status, "Guarded update skipped");
        }

        Ok(changed)
    }
}

#[async_trait]
impl CallRepository for PgCallRepository {
    #[instrument(skip(self))]
    async fn get_status(&self, call_id: &str) -> AppResult<Option<CallStatus>> {
        debug!("Finding status for call: {}", call_id);

        let row: Option<(String,)> = sqlx::query_as("SELECT status FROM calls WHERE call_id = $1")
            .bind(call_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding call {}: {}", call_id, e);
                AppError::Database(format!("Failed to find call status: {}", e))
            })?;

        row.map(|(status,)| Self::parse_status(&status)).transpose()
    }

    #[instrument(skip(self))]
    async fn get_call(&self, call_id: &str) -> AppResult<Option<Call>> {
        debug!("Finding call by id: {}", call_id);

        let row = sqlx::query_as::<sqlx::Postgres, CallRow>(
            r#"
            SELECT
                call_id, caller, receiver, duration_in_seconds, start_timestamp,
                cost, currency, refunded, refund_reason, status, processed_at
            FROM calls
            WHERE call_id = $1
            "#,
        )
        .bind(call_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding call {}: {}", call_id, e);
            AppError::Database(format!("Failed to find call: {}", e))
        })?;

        row.map(Call::try_from).transpose()
    }

    #[instrument(skip(self, call), fields(call_id = %call.call_id))]
    async fn insert_if_absent(&self, call: &Call) -> AppResult<InsertOutcome> {
        debug!("Inserting call with status {}", call.status);

        let result = sqlx::query(
            r#"
            INSERT INTO calls (
                call_id, caller, receiver, duration_in_seconds, start_timestamp,
                cost, currency, refunded, refund_reason, status, processed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            ON CONFLICT (call_id) DO NOTHING
            "#,
        )
        .bind(&call.call_id)
        .bind(&call.caller)
        .bind(&call.receiver)
        .bind(call.duration_in_seconds)
        .bind(call.start_timestamp)
        .bind(call.cost)
        .bind(&call.currency)
        .bind(call.refunded)
        .bind(&call.refund_reason)
        .bind(call.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error inserting call {}: {}", call.call_id, e);
            AppError::Database(format!("Failed to insert call: {}", e))
        })?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::AlreadyExists)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    #[instrument(skip(self))]
    async fn update_cost(&self, call_id: &str, cost: Decimal, currency: &str) -> AppResult<bool> {
        self.set_quote_outcome(call_id, CallStatus::CostFetched, Some(cost), Some(currency))
            .await
    }

    #[instrument(skip(self))]
    async fn mark_fetch_failed(&self, call_id: &str) -> AppResult<bool> {
        self.set_quote_outcome(call_id, CallStatus::CostFetchFailed, None, None)
            .await
    }

    #[instrument(skip(self))]
    async fn mark_invalid(&self, call_id: &str) -> AppResult<bool> {
        self.set_quote_outcome(call_id, CallStatus::Invalid, None, None)
            .await
    }

    #[instrument(skip(self, reason))]
    async fn apply_refund(&self, call_id: &str, reason: &str) -> AppResult<CallStatus> {
        debug!("Applying refund to call: {}", call_id);

        let (status,): (String,) = sqlx::query_as(
            r#"
            INSERT INTO calls (call_id, refunded, refund_reason, status, processed_at)
            VALUES ($1, TRUE, $2, $3, NOW())
            ON CONFLICT (call_id) DO UPDATE
            SET refunded = TRUE,
                refund_reason = EXCLUDED.refund_reason,
                cost = NULL,
                currency = NULL,
                status = CASE
                    WHEN calls.caller IS NOT NULL
                     AND calls.receiver IS NOT NULL
                     AND calls.start_timestamp IS NOT NULL
                    THEN $4
                    ELSE $3
                END,
                processed_at = NOW()
            RETURNING status
            "#,
        )
        .bind(call_id)
        .bind(reason)
        .bind(CallStatus::RefundPartially.as_str())
        .bind(CallStatus::Refunded.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error applying refund to call {}: {}", call_id, e);
            AppError::Database(format!("Failed to apply refund: {}", e))
        })?;

        Self::parse_status(&status)
    }

    #[instrument(skip(self, call), fields(call_id = %call.call_id))]
    async fn fill_missing_data(&self, call: &NewIncomingCall) -> AppResult<bool> {
        debug!("Filling call data on partial refund");

        let result = sqlx::query(
            r#"
            UPDATE calls
            SET caller = $2,
                receiver = $3,
                duration_in_seconds = $4,
                start_timestamp = $5,
                status = $6,
                processed_at = NOW()
            WHERE call_id = $1
              AND status = $7
            "#,
        )
        .bind(&call.call_id)
        .bind(&call.caller)
        .bind(&call.receiver)
        .bind(call.duration_in_seconds)
        .bind(call.start_timestamp)
        .bind(CallStatus::Refunded.as_str())
        .bind(CallStatus::RefundPartially.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error filling call {}: {}", call.call_id, e);
            AppError::Database(format!("Failed to fill missing call data: {}", e))
        })?;

        Ok(result.rows_affected() > 0)
    }
}

/// Internal row type for database mapping
#[derive(Debug, sqlx::FromRow)]
struct CallRow {
    call_id: String,
    caller: Option<String>,
    receiver: Option<String>,
    duration_in_seconds: Option<i64>,
    start_timestamp: Option<DateTime<Utc>>,
    cost: Option<Decimal>,
    currency: Option<String>,
    refunded: bool,
    refund_reason: Option<String>,
    status: String,
    processed_at: DateTime<Utc>,
}

impl TryFrom<CallRow> for Call {
    type Error = AppError;

    fn try_from(row: CallRow) -> Result<Self, Self::Error> {
        Ok(Call {
            status: PgCallRepository::parse_status(&row.status)?,
            call_id: row.call_id,
            caller: row.caller,
            receiver: row.receiver,
            duration_in_seconds: row.duration_in_seconds,
            start_timestamp: row.start_timestamp,
            cost: row.cost,
            // CHAR(3) comes back padded when shorter values slip in
            currency: row.currency.map(|c| c.trim_end().to_string()),
            refunded: row.refunded,
            refund_reason: row.refund_reason,
            processed_at: row.processed_at,
        })
    }
}
