// src/db/pairing_code_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::{AppError, is_unique_violation},
    models::terminal::{PairingCode, ProvisioningCode},
};

const PROVISIONING_UNUSED_INDEX: &str = "uq_provisioning_code_unused";
const PAIRING_UNUSED_INDEX: &str = "uq_pairing_code_unused";

/// Códigos de provisionamento (terminal novo) e de pareamento (terminal existente).
#[derive(Clone, Default)]
pub struct PairingCodeRepository;

impl PairingCodeRepository {
    pub fn new() -> Self {
        Self
    }

    /// Um código não usado não pode existir nas duas tabelas ao mesmo tempo.
    pub async fn is_code_in_use<'e, E>(&self, executor: E, code: &str) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let in_use: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM terminal_provisioning_codes WHERE code = $1 AND used_at IS NULL)
                OR EXISTS (SELECT 1 FROM terminal_pairing_codes WHERE code = $1 AND used_at IS NULL)
            "#,
        )
        .bind(code)
        .fetch_one(executor)
        .await?;
        Ok(in_use)
    }

    /// `None` se outro código igual e não usado foi gravado no meio tempo.
    pub async fn insert_provisioning<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
        code: &str,
        name: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<ProvisioningCode>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query_as::<_, ProvisioningCode>(
            r#"
            INSERT INTO terminal_provisioning_codes (merchant_id, code, name, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(merchant_id)
        .bind(code)
        .bind(name)
        .bind(expires_at)
        .fetch_one(executor)
        .await;

        match result {
            Ok(row) => Ok(Some(row)),
            Err(e) if is_unique_violation(&e, PROVISIONING_UNUSED_INDEX) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn insert_pairing<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
        terminal_id: Uuid,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<PairingCode>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query_as::<_, PairingCode>(
            r#"
            INSERT INTO terminal_pairing_codes (merchant_id, terminal_id, code, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(merchant_id)
        .bind(terminal_id)
        .bind(code)
        .bind(expires_at)
        .fetch_one(executor)
        .await;

        match result {
            Ok(row) => Ok(Some(row)),
            Err(e) if is_unique_violation(&e, PAIRING_UNUSED_INDEX) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Expira os códigos de pareamento ainda abertos do terminal (um novo foi emitido).
    pub async fn expire_open_pairing_codes<'e, E>(&self, executor: E, terminal_id: Uuid) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE terminal_pairing_codes
            SET expires_at = LEAST(expires_at, NOW())
            WHERE terminal_id = $1 AND used_at IS NULL
            "#,
        )
        .bind(terminal_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Trava o código para o claim. Prefere o não usado; senão, o uso mais recente (replay).
    pub async fn lock_provisioning<'e, E>(&self, executor: E, code: &str) -> Result<Option<ProvisioningCode>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, ProvisioningCode>(
            r#"
            SELECT * FROM terminal_provisioning_codes
            WHERE code = $1
            ORDER BY (used_at IS NULL) DESC, used_at DESC, created_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(code)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn lock_pairing<'e, E>(&self, executor: E, code: &str) -> Result<Option<PairingCode>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, PairingCode>(
            r#"
            SELECT * FROM terminal_pairing_codes
            WHERE code = $1
            ORDER BY (used_at IS NULL) DESC, used_at DESC, created_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(code)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn mark_provisioning_used<'e, E>(
        &self,
        executor: E,
        code_id: Uuid,
        terminal_id: Uuid,
        device_identifier: &str,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE terminal_provisioning_codes
            SET used_at = NOW(), terminal_id = $2, device_identifier = $3
            WHERE id = $1
            "#,
        )
        .bind(code_id)
        .bind(terminal_id)
        .bind(device_identifier)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn mark_pairing_used<'e, E>(&self, executor: E, code_id: Uuid, device_identifier: &str) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE terminal_pairing_codes SET used_at = NOW(), device_identifier = $2 WHERE id = $1",
        )
        .bind(code_id)
        .bind(device_identifier)
        .execute(executor)
        .await?;
        Ok(())
    }
}
