// src/db/payment_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres, types::Json};
use uuid::Uuid;

use crate::{
    common::error::{AppError, is_unique_violation},
    models::payment::{
        PaymentIntent, PaymentIntentStatus, PaymentTransaction, PaymentType, ProviderData, SaleDraft,
    },
};

const IDEMPOTENCY_CONSTRAINT: &str = "uq_payment_intents_idempotency";

pub struct NewIntent<'a> {
    pub merchant_id: Uuid,
    pub terminal_id: Option<Uuid>,
    pub idempotency_key: Option<&'a str>,
    pub payment_type: PaymentType,
    pub amount_cents: i64,
    pub sale_draft: &'a SaleDraft,
}

pub struct ApprovedIntent<'a> {
    pub intent_id: Uuid,
    pub provider: &'a str,
    pub provider_ref: Option<&'a str>,
    pub sale_id: Uuid,
    pub print_job_id: Uuid,
    pub terminal_id: Option<Uuid>,
}

pub struct NewTransaction<'a> {
    pub intent_id: Uuid,
    pub merchant_id: Uuid,
    pub status: PaymentIntentStatus,
    pub provider: &'a str,
    pub provider_ref: Option<&'a str>,
    pub data: &'a ProviderData,
    pub message: Option<&'a str>,
}

#[derive(Clone, Default)]
pub struct PaymentIntentRepository;

impl PaymentIntentRepository {
    pub fn new() -> Self {
        Self
    }

    /// Grava a intenção. Devolve `None` se a chave de idempotência já existe para o lojista.
    pub async fn insert<'e, E>(&self, executor: E, intent: NewIntent<'_>) -> Result<Option<PaymentIntent>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query_as::<_, PaymentIntent>(
            r#"
            INSERT INTO payment_intents (merchant_id, terminal_id, idempotency_key, payment_type, amount_cents, sale_draft)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(intent.merchant_id)
        .bind(intent.terminal_id)
        .bind(intent.idempotency_key)
        .bind(intent.payment_type)
        .bind(intent.amount_cents)
        .bind(Json(intent.sale_draft))
        .fetch_one(executor)
        .await;

        match result {
            Ok(created) => Ok(Some(created)),
            Err(e) if is_unique_violation(&e, IDEMPOTENCY_CONSTRAINT) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, merchant_id: Uuid, intent_id: Uuid) -> Result<Option<PaymentIntent>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let intent = sqlx::query_as::<_, PaymentIntent>(
            "SELECT * FROM payment_intents WHERE id = $1 AND merchant_id = $2",
        )
        .bind(intent_id)
        .bind(merchant_id)
        .fetch_optional(executor)
        .await?;
        Ok(intent)
    }

    /// Trava a linha antes de ler o status: confirmações concorrentes ficam em fila aqui.
    pub async fn find_for_update<'e, E>(&self, executor: E, merchant_id: Uuid, intent_id: Uuid) -> Result<Option<PaymentIntent>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let intent = sqlx::query_as::<_, PaymentIntent>(
            "SELECT * FROM payment_intents WHERE id = $1 AND merchant_id = $2 FOR UPDATE",
        )
        .bind(intent_id)
        .bind(merchant_id)
        .fetch_optional(executor)
        .await?;
        Ok(intent)
    }

    pub async fn find_by_idempotency_key<'e, E>(&self, executor: E, merchant_id: Uuid, key: &str) -> Result<Option<PaymentIntent>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let intent = sqlx::query_as::<_, PaymentIntent>(
            "SELECT * FROM payment_intents WHERE merchant_id = $1 AND idempotency_key = $2",
        )
        .bind(merchant_id)
        .bind(key)
        .fetch_optional(executor)
        .await?;
        Ok(intent)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
        status: Option<PaymentIntentStatus>,
        limit: i64,
    ) -> Result<Vec<PaymentIntent>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let intents = sqlx::query_as::<_, PaymentIntent>(
            r#"
            SELECT * FROM payment_intents
            WHERE merchant_id = $1 AND ($2::payment_intent_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(merchant_id)
        .bind(status)
        .bind(limit)
        .fetch_all(executor)
        .await?;
        Ok(intents)
    }

    pub async fn mark_approved<'e, E>(&self, executor: E, approval: ApprovedIntent<'_>) -> Result<PaymentIntent, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let intent = sqlx::query_as::<_, PaymentIntent>(
            r#"
            UPDATE payment_intents
            SET status = 'APPROVED',
                provider = $2,
                provider_ref = $3,
                sale_id = $4,
                print_job_id = $5,
                terminal_id = COALESCE(terminal_id, $6),
                approved_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(approval.intent_id)
        .bind(approval.provider)
        .bind(approval.provider_ref)
        .bind(approval.sale_id)
        .bind(approval.print_job_id)
        .bind(approval.terminal_id)
        .fetch_one(executor)
        .await?;
        Ok(intent)
    }

    pub async fn mark_failed<'e, E>(
        &self,
        executor: E,
        intent_id: Uuid,
        status: PaymentIntentStatus,
        provider: &str,
        provider_ref: Option<&str>,
        reason: Option<&str>,
    ) -> Result<PaymentIntent, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let intent = sqlx::query_as::<_, PaymentIntent>(
            r#"
            UPDATE payment_intents
            SET status = $2,
                provider = $3,
                provider_ref = COALESCE($4, provider_ref),
                failure_reason = $5,
                failed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(intent_id)
        .bind(status)
        .bind(provider)
        .bind(provider_ref)
        .bind(reason)
        .fetch_one(executor)
        .await?;
        Ok(intent)
    }

    pub async fn set_print_job<'e, E>(&self, executor: E, intent_id: Uuid, print_job_id: Uuid) -> Result<PaymentIntent, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let intent = sqlx::query_as::<_, PaymentIntent>(
            "UPDATE payment_intents SET print_job_id = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(intent_id)
        .bind(print_job_id)
        .fetch_one(executor)
        .await?;
        Ok(intent)
    }

    /// Intenções PENDING criadas antes de `cutoff` (para o expirador).
    pub async fn find_stale_pending<'e, E>(
        &self,
        executor: E,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<(Uuid, Uuid)>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            SELECT merchant_id, id FROM payment_intents
            WHERE status = 'PENDING' AND created_at < $1
            ORDER BY created_at
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    pub async fn record_transaction<'e, E>(&self, executor: E, tx: NewTransaction<'_>) -> Result<PaymentTransaction, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, PaymentTransaction>(
            r#"
            INSERT INTO payment_transactions (
                intent_id, merchant_id, status, provider, provider_ref,
                authorization_code, transaction_id, nsu, card_brand, installments, message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(tx.intent_id)
        .bind(tx.merchant_id)
        .bind(tx.status)
        .bind(tx.provider)
        .bind(tx.provider_ref)
        .bind(tx.data.authorization_code.as_deref())
        .bind(tx.data.transaction_id.as_deref())
        .bind(tx.data.nsu.as_deref())
        .bind(tx.data.card_brand.as_deref())
        .bind(tx.data.installments)
        .bind(tx.message.or(tx.data.message.as_deref()))
        .fetch_one(executor)
        .await?;
        Ok(row)
    }

    pub async fn list_transactions<'e, E>(&self, executor: E, intent_id: Uuid) -> Result<Vec<PaymentTransaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, PaymentTransaction>(
            "SELECT * FROM payment_transactions WHERE intent_id = $1 ORDER BY created_at",
        )
        .bind(intent_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }
}
