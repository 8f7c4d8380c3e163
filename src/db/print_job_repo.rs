// src/db/print_job_repo.rs

use sqlx::{Executor, Postgres, types::Json};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::print_job::{PrintJob, PrintJobStatus, ReceiptPayload},
};

#[derive(Clone, Default)]
pub struct PrintJobRepository;

impl PrintJobRepository {
    pub fn new() -> Self {
        Self
    }

    /// Cria a impressão da venda. `None` se já existir uma (uma impressão por venda).
    pub async fn insert<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
        sale_id: Uuid,
        payload: &ReceiptPayload,
    ) -> Result<Option<PrintJob>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let job = sqlx::query_as::<_, PrintJob>(
            r#"
            INSERT INTO print_jobs (merchant_id, sale_id, status, payload)
            VALUES ($1, $2, 'PENDING', $3)
            ON CONFLICT (sale_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(merchant_id)
        .bind(sale_id)
        .bind(Json(payload))
        .fetch_optional(executor)
        .await?;
        Ok(job)
    }

    pub async fn find_by_sale<'e, E>(&self, executor: E, merchant_id: Uuid, sale_id: Uuid) -> Result<Option<PrintJob>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let job = sqlx::query_as::<_, PrintJob>(
            "SELECT * FROM print_jobs WHERE sale_id = $1 AND merchant_id = $2",
        )
        .bind(sale_id)
        .bind(merchant_id)
        .fetch_optional(executor)
        .await?;
        Ok(job)
    }

    pub async fn find_for_update<'e, E>(&self, executor: E, merchant_id: Uuid, job_id: Uuid) -> Result<Option<PrintJob>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let job = sqlx::query_as::<_, PrintJob>(
            "SELECT * FROM print_jobs WHERE id = $1 AND merchant_id = $2 FOR UPDATE",
        )
        .bind(job_id)
        .bind(merchant_id)
        .fetch_optional(executor)
        .await?;
        Ok(job)
    }

    /// Reserva a impressão PENDING mais antiga do lojista.
    /// SKIP LOCKED garante que dois terminais nunca recebam o mesmo job.
    pub async fn claim_next<'e, E>(&self, executor: E, merchant_id: Uuid, terminal_id: Option<Uuid>) -> Result<Option<PrintJob>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let job = sqlx::query_as::<_, PrintJob>(
            r#"
            UPDATE print_jobs
            SET status = 'PRINTING',
                terminal_id = $2,
                claimed_at = NOW(),
                attempts = attempts + 1,
                updated_at = NOW()
            WHERE id = (
                SELECT id FROM print_jobs
                WHERE merchant_id = $1 AND status = 'PENDING'
                ORDER BY created_at, id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(merchant_id)
        .bind(terminal_id)
        .fetch_optional(executor)
        .await?;
        Ok(job)
    }

    pub async fn mark_printed<'e, E>(&self, executor: E, job_id: Uuid) -> Result<PrintJob, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let job = sqlx::query_as::<_, PrintJob>(
            r#"
            UPDATE print_jobs
            SET status = 'PRINTED', printed_at = NOW(), error_message = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(job_id)
        .fetch_one(executor)
        .await?;
        Ok(job)
    }

    pub async fn mark_error<'e, E>(&self, executor: E, job_id: Uuid, message: Option<&str>) -> Result<PrintJob, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let job = sqlx::query_as::<_, PrintJob>(
            r#"
            UPDATE print_jobs
            SET status = 'ERROR', error_message = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(message)
        .fetch_one(executor)
        .await?;
        Ok(job)
    }

    /// Devolve para a fila (reimpressão). A reserva anterior é descartada.
    pub async fn requeue<'e, E>(&self, executor: E, job_id: Uuid) -> Result<PrintJob, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let job = sqlx::query_as::<_, PrintJob>(
            r#"
            UPDATE print_jobs
            SET status = 'PENDING', terminal_id = NULL, claimed_at = NULL, error_message = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(job_id)
        .fetch_one(executor)
        .await?;
        Ok(job)
    }

    pub async fn cancel<'e, E>(&self, executor: E, job_id: Uuid) -> Result<PrintJob, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let job = sqlx::query_as::<_, PrintJob>(
            "UPDATE print_jobs SET status = 'CANCELED', updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(job_id)
        .fetch_one(executor)
        .await?;
        Ok(job)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
        status: Option<PrintJobStatus>,
        limit: i64,
    ) -> Result<Vec<PrintJob>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let jobs = sqlx::query_as::<_, PrintJob>(
            r#"
            SELECT * FROM print_jobs
            WHERE merchant_id = $1 AND ($2::print_job_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(merchant_id)
        .bind(status)
        .bind(limit)
        .fetch_all(executor)
        .await?;
        Ok(jobs)
    }
}
