use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use common::{ExecutionId, InvestmentId, PropertyId, UserId};
use domain::{
    DistributionBatch, DistributionResult, Investment, InvestmentStatus, Money, WalletLedgerEntry,
};

use crate::error::{Result, StoreError};
use crate::execution::{WorkflowExecution, WorkflowStatus, WorkflowType};
use crate::intervention::ManualIntervention;
use crate::invocation::{ActivityInvocation, InvocationStatus};
use crate::store::WorkflowStore;

/// PostgreSQL-backed workflow store implementation.
#[derive(Clone)]
pub struct PostgresWorkflowStore {
    pool: PgPool,
}

impl PostgresWorkflowStore {
    /// Creates a new PostgreSQL workflow store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_execution(row: PgRow) -> Result<WorkflowExecution> {
        let type_name: String = row.try_get("workflow_type")?;
        let status_name: String = row.try_get("status")?;
        let workflow_type = WorkflowType::parse(&type_name)
            .ok_or_else(|| StoreError::Serialization(bad_enum("workflow_type", &type_name)))?;
        let status = WorkflowStatus::parse(&status_name)
            .ok_or_else(|| StoreError::Serialization(bad_enum("status", &status_name)))?;

        Ok(WorkflowExecution {
            id: ExecutionId::from_uuid(row.try_get::<Uuid, _>("id")?),
            workflow_type,
            input: row.try_get("input")?,
            status,
            current_step_index: row.try_get::<i32, _>("current_step_index")? as u32,
            failure_reason: row.try_get("failure_reason")?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn row_to_invocation(row: PgRow) -> Result<ActivityInvocation> {
        let status_name: String = row.try_get("status")?;
        let status = InvocationStatus::parse(&status_name)
            .ok_or_else(|| StoreError::Serialization(bad_enum("status", &status_name)))?;

        Ok(ActivityInvocation {
            workflow_id: ExecutionId::from_uuid(row.try_get::<Uuid, _>("workflow_id")?),
            step_name: row.try_get("step_name")?,
            attempt_number: row.try_get::<i32, _>("attempt_number")? as u32,
            status,
            idempotency_key: row.try_get("idempotency_key")?,
            result: row.try_get("result")?,
            error_reason: row.try_get("error_reason")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }

    fn row_to_investment(row: PgRow) -> Result<Investment> {
        let status_name: String = row.try_get("status")?;
        let status = match status_name.as_str() {
            "pending" => InvestmentStatus::Pending,
            "active" => InvestmentStatus::Active,
            "failed" => InvestmentStatus::Failed,
            other => return Err(StoreError::Serialization(bad_enum("status", other))),
        };

        Ok(Investment {
            id: InvestmentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            investor_id: UserId::from_uuid(row.try_get::<Uuid, _>("investor_id")?),
            property_id: PropertyId::from_uuid(row.try_get::<Uuid, _>("property_id")?),
            amount: Money::from_kobo(row.try_get("amount_kobo")?),
            payment_reference: row.try_get("payment_reference")?,
            status,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_ledger_entry(row: PgRow) -> Result<WalletLedgerEntry> {
        Ok(WalletLedgerEntry {
            id: row.try_get("id")?,
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            amount: Money::from_kobo(row.try_get("amount_kobo")?),
            reference_id: row.try_get("reference_id")?,
            balance_after: Money::from_kobo(row.try_get("balance_after_kobo")?),
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

fn bad_enum(column: &str, value: &str) -> serde_json::Error {
    serde_json::Error::io(std::io::Error::other(format!(
        "unexpected {column} value '{value}'"
    )))
}

#[async_trait]
impl WorkflowStore for PostgresWorkflowStore {
    async fn create_execution(&self, execution: &WorkflowExecution) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workflow_executions
                (id, workflow_type, input, status, current_step_index, failure_reason, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(execution.id.as_uuid())
        .bind(execution.workflow_type.as_str())
        .bind(&execution.input)
        .bind(execution.status.as_str())
        .bind(execution.current_step_index as i32)
        .bind(&execution.failure_reason)
        .bind(execution.created_at)
        .bind(execution.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<WorkflowExecution>> {
        let row = sqlx::query(
            r#"
            SELECT id, workflow_type, input, status, current_step_index, failure_reason, created_at, completed_at
            FROM workflow_executions
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_execution).transpose()
    }

    async fn update_execution(&self, execution: &WorkflowExecution) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Validate against the stored copy under a row lock, so the
        // invariants hold even if two workers race on the same execution.
        let row = sqlx::query(
            "SELECT status, current_step_index FROM workflow_executions WHERE id = $1 FOR UPDATE",
        )
        .bind(execution.id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::ExecutionNotFound(execution.id))?;

        let status_name: String = row.try_get("status")?;
        let stored_status = WorkflowStatus::parse(&status_name)
            .ok_or_else(|| StoreError::Serialization(bad_enum("status", &status_name)))?;
        let stored_cursor = row.try_get::<i32, _>("current_step_index")? as u32;

        if stored_status.is_terminal() {
            return Err(StoreError::TerminalExecution {
                execution_id: execution.id,
                status: stored_status,
            });
        }
        if execution.current_step_index < stored_cursor {
            return Err(StoreError::CursorRegression {
                execution_id: execution.id,
                current: stored_cursor,
                attempted: execution.current_step_index,
            });
        }

        sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = $2, current_step_index = $3, failure_reason = $4, completed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(execution.id.as_uuid())
        .bind(execution.status.as_str())
        .bind(execution.current_step_index as i32)
        .bind(&execution.failure_reason)
        .bind(execution.completed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn record_invocation(&self, invocation: &ActivityInvocation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_invocations
                (workflow_id, step_name, attempt_number, status, idempotency_key, result, error_reason, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(invocation.workflow_id.as_uuid())
        .bind(&invocation.step_name)
        .bind(invocation.attempt_number as i32)
        .bind(invocation.status.as_str())
        .bind(&invocation.idempotency_key)
        .bind(&invocation.result)
        .bind(&invocation.error_reason)
        .bind(invocation.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_step_success")
            {
                return StoreError::DuplicateSuccess {
                    execution_id: invocation.workflow_id,
                    step_name: invocation.step_name.clone(),
                };
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn succeeded_invocation(
        &self,
        workflow_id: ExecutionId,
        step_name: &str,
    ) -> Result<Option<ActivityInvocation>> {
        let row = sqlx::query(
            r#"
            SELECT workflow_id, step_name, attempt_number, status, idempotency_key, result, error_reason, recorded_at
            FROM activity_invocations
            WHERE workflow_id = $1 AND step_name = $2 AND status = 'succeeded'
            "#,
        )
        .bind(workflow_id.as_uuid())
        .bind(step_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_invocation).transpose()
    }

    async fn invocations(&self, workflow_id: ExecutionId) -> Result<Vec<ActivityInvocation>> {
        let rows = sqlx::query(
            r#"
            SELECT workflow_id, step_name, attempt_number, status, idempotency_key, result, error_reason, recorded_at
            FROM activity_invocations
            WHERE workflow_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(workflow_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_invocation).collect()
    }

    async fn insert_investment(&self, investment: &Investment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO investments
                (id, investor_id, property_id, amount_kobo, payment_reference, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(investment.id.as_uuid())
        .bind(investment.investor_id.as_uuid())
        .bind(investment.property_id.as_uuid())
        .bind(investment.amount.kobo())
        .bind(&investment.payment_reference)
        .bind(investment.status.as_str())
        .bind(investment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_investment(&self, id: InvestmentId) -> Result<Option<Investment>> {
        let row = sqlx::query(
            r#"
            SELECT id, investor_id, property_id, amount_kobo, payment_reference, status, created_at
            FROM investments
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_investment).transpose()
    }

    async fn update_investment_status(
        &self,
        id: InvestmentId,
        status: InvestmentStatus,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE investments SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvestmentNotFound(id));
        }
        Ok(())
    }

    async fn active_investments_for_property(
        &self,
        property_id: PropertyId,
    ) -> Result<Vec<Investment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, investor_id, property_id, amount_kobo, payment_reference, status, created_at
            FROM investments
            WHERE property_id = $1 AND status = 'active'
            ORDER BY created_at ASC
            "#,
        )
        .bind(property_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_investment).collect()
    }

    async fn append_ledger_entry(
        &self,
        user_id: UserId,
        amount: Money,
        reference_id: &str,
    ) -> Result<WalletLedgerEntry> {
        let mut tx = self.pool.begin().await?;

        // Serialize appends per user so the derived balance is consistent
        // under concurrent credit/debit workflows.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(user_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        // SUM over BIGINT widens to NUMERIC; cast back for decoding.
        let balance: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_kobo), 0)::BIGINT FROM wallet_ledger WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;

        let balance_after = Money::from_kobo(balance + amount.kobo());
        let entry = if amount.is_negative() {
            WalletLedgerEntry::debit(user_id, amount.negated(), reference_id, balance_after)
        } else {
            WalletLedgerEntry::credit(user_id, amount, reference_id, balance_after)
        };

        sqlx::query(
            r#"
            INSERT INTO wallet_ledger
                (id, user_id, amount_kobo, reference_id, balance_after_kobo, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(entry.user_id.as_uuid())
        .bind(entry.amount.kobo())
        .bind(&entry.reference_id)
        .bind(entry.balance_after.kobo())
        .bind(entry.recorded_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(entry)
    }

    async fn ledger_entries(&self, user_id: UserId) -> Result<Vec<WalletLedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, amount_kobo, reference_id, balance_after_kobo, recorded_at
            FROM wallet_ledger
            WHERE user_id = $1
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_ledger_entry).collect()
    }

    async fn wallet_balance(&self, user_id: UserId) -> Result<Money> {
        let balance: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_kobo), 0)::BIGINT FROM wallet_ledger WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_kobo(balance))
    }

    async fn save_batch(&self, batch: &DistributionBatch) -> Result<()> {
        let results = serde_json::to_value(&batch.results)?;

        sqlx::query(
            r#"
            INSERT INTO distribution_batches (id, property_id, total_amount_kobo, distribution_date, results)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET results = EXCLUDED.results
            "#,
        )
        .bind(batch.id.as_uuid())
        .bind(batch.property_id.as_uuid())
        .bind(batch.total_amount.kobo())
        .bind(batch.distribution_date)
        .bind(results)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_batch(&self, id: ExecutionId) -> Result<Option<DistributionBatch>> {
        let row = sqlx::query(
            r#"
            SELECT id, property_id, total_amount_kobo, distribution_date, results
            FROM distribution_batches
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let results: Vec<DistributionResult> =
                    serde_json::from_value(row.try_get("results")?)?;
                Ok(Some(DistributionBatch {
                    id: ExecutionId::from_uuid(row.try_get::<Uuid, _>("id")?),
                    property_id: PropertyId::from_uuid(row.try_get::<Uuid, _>("property_id")?),
                    total_amount: Money::from_kobo(row.try_get("total_amount_kobo")?),
                    distribution_date: row.try_get("distribution_date")?,
                    results,
                }))
            }
            None => Ok(None),
        }
    }

    async fn flag_intervention(&self, intervention: &ManualIntervention) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO manual_interventions (execution_id, step_name, reason, flagged_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(intervention.execution_id.as_uuid())
        .bind(&intervention.step_name)
        .bind(&intervention.reason)
        .bind(intervention.flagged_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn pending_interventions(&self) -> Result<Vec<ManualIntervention>> {
        let rows = sqlx::query(
            r#"
            SELECT execution_id, step_name, reason, flagged_at
            FROM manual_interventions
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ManualIntervention {
                    execution_id: ExecutionId::from_uuid(
                        row.try_get::<Uuid, _>("execution_id")?,
                    ),
                    step_name: row.try_get("step_name")?,
                    reason: row.try_get("reason")?,
                    flagged_at: row.try_get::<DateTime<Utc>, _>("flagged_at")?,
                })
            })
            .collect()
    }
}
