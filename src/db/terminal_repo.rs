// src/db/terminal_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::terminal::{Terminal, TerminalApiKey, TerminalCredential, TerminalStatus},
};

// Intervalo mínimo entre gravações de heartbeat/uso da chave
const SEEN_THROTTLE_SECS: f64 = 30.0;

#[derive(Clone, Default)]
pub struct TerminalRepository;

impl TerminalRepository {
    pub fn new() -> Self {
        Self
    }

    // ---
    // Terminais
    // ---

    pub async fn create<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
        name: &str,
        identifier: Option<&str>,
        model: Option<&str>,
    ) -> Result<Terminal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let terminal = sqlx::query_as::<_, Terminal>(
            r#"
            INSERT INTO terminals (merchant_id, name, identifier, model, status)
            VALUES ($1, $2, $3, $4, 'OFFLINE')
            RETURNING *
            "#,
        )
        .bind(merchant_id)
        .bind(name)
        .bind(identifier)
        .bind(model)
        .fetch_one(executor)
        .await?;
        Ok(terminal)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, merchant_id: Uuid, terminal_id: Uuid) -> Result<Option<Terminal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let terminal = sqlx::query_as::<_, Terminal>(
            "SELECT * FROM terminals WHERE id = $1 AND merchant_id = $2",
        )
        .bind(terminal_id)
        .bind(merchant_id)
        .fetch_optional(executor)
        .await?;
        Ok(terminal)
    }

    pub async fn find_for_update<'e, E>(&self, executor: E, merchant_id: Uuid, terminal_id: Uuid) -> Result<Option<Terminal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let terminal = sqlx::query_as::<_, Terminal>(
            "SELECT * FROM terminals WHERE id = $1 AND merchant_id = $2 FOR UPDATE",
        )
        .bind(terminal_id)
        .bind(merchant_id)
        .fetch_optional(executor)
        .await?;
        Ok(terminal)
    }

    /// Identificador de hardware é único globalmente (entre todos os lojistas).
    pub async fn find_by_identifier_for_update<'e, E>(&self, executor: E, identifier: &str) -> Result<Option<Terminal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let terminal = sqlx::query_as::<_, Terminal>(
            "SELECT * FROM terminals WHERE identifier = $1 FOR UPDATE",
        )
        .bind(identifier)
        .fetch_optional(executor)
        .await?;
        Ok(terminal)
    }

    pub async fn list<'e, E>(&self, executor: E, merchant_id: Uuid) -> Result<Vec<Terminal>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let terminals = sqlx::query_as::<_, Terminal>(
            "SELECT * FROM terminals WHERE merchant_id = $1 ORDER BY name ASC",
        )
        .bind(merchant_id)
        .fetch_all(executor)
        .await?;
        Ok(terminals)
    }

    /// Atualiza o terminal no claim. Um terminal DISABLED volta para OFFLINE.
    pub async fn update_on_claim<'e, E>(
        &self,
        executor: E,
        terminal_id: Uuid,
        name: Option<&str>,
        identifier: &str,
        model: Option<&str>,
    ) -> Result<Terminal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let terminal = sqlx::query_as::<_, Terminal>(
            r#"
            UPDATE terminals
            SET name = COALESCE($2, name),
                identifier = $3,
                model = COALESCE($4, model),
                status = CASE WHEN status = 'DISABLED' THEN 'OFFLINE'::terminal_status ELSE status END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(terminal_id)
        .bind(name)
        .bind(identifier)
        .bind(model)
        .fetch_one(executor)
        .await?;
        Ok(terminal)
    }

    pub async fn set_status<'e, E>(&self, executor: E, terminal_id: Uuid, status: TerminalStatus) -> Result<Terminal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let terminal = sqlx::query_as::<_, Terminal>(
            "UPDATE terminals SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(terminal_id)
        .bind(status)
        .fetch_one(executor)
        .await?;
        Ok(terminal)
    }

    /// Heartbeat: marca `last_seen_at` (no máximo a cada 30s) e passa OFFLINE -> ONLINE.
    pub async fn touch_seen<'e, E>(&self, executor: E, terminal_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE terminals
            SET last_seen_at = NOW(),
                status = CASE WHEN status = 'OFFLINE' THEN 'ONLINE'::terminal_status ELSE status END
            WHERE id = $1
              AND status <> 'DISABLED'
              AND (last_seen_at IS NULL OR last_seen_at < NOW() - make_interval(secs => $2) OR status = 'OFFLINE')
            "#,
        )
        .bind(terminal_id)
        .bind(SEEN_THROTTLE_SECS)
        .execute(executor)
        .await?;
        Ok(())
    }

    // ---
    // Chaves
    // ---

    pub async fn insert_key<'e, E>(
        &self,
        executor: E,
        terminal_id: Uuid,
        merchant_id: Uuid,
        key_prefix: &str,
        key_hash: &str,
    ) -> Result<TerminalApiKey, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let key = sqlx::query_as::<_, TerminalApiKey>(
            r#"
            INSERT INTO terminal_api_keys (terminal_id, merchant_id, key_prefix, key_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(terminal_id)
        .bind(merchant_id)
        .bind(key_prefix)
        .bind(key_hash)
        .fetch_one(executor)
        .await?;
        Ok(key)
    }

    /// Revoga na hora todas as chaves do terminal, inclusive as que estavam em janela de rotação.
    pub async fn revoke_keys<'e, E>(&self, executor: E, terminal_id: Uuid) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE terminal_api_keys
            SET revoked_at = NOW()
            WHERE terminal_id = $1
              AND (revoked_at IS NULL OR revoked_at > NOW())
            "#,
        )
        .bind(terminal_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Agenda a revogação das chaves ainda sem prazo: continuam valendo por `grace_secs`.
    /// Prazos já agendados não são estendidos.
    pub async fn schedule_key_revocation<'e, E>(&self, executor: E, terminal_id: Uuid, grace_secs: f64) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE terminal_api_keys
            SET revoked_at = NOW() + make_interval(secs => $2)
            WHERE terminal_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(terminal_id)
        .bind(grace_secs)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_credentials_by_prefix<'e, E>(&self, executor: E, key_prefix: &str) -> Result<Vec<TerminalCredential>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, TerminalCredential>(
            r#"
            SELECT
                k.id AS key_id,
                k.terminal_id,
                k.merchant_id,
                k.key_hash,
                k.legacy_key,
                t.status AS terminal_status,
                m.suspended AS merchant_suspended,
                m.login_blocked AS merchant_login_blocked
            FROM terminal_api_keys k
            JOIN terminals t ON t.id = k.terminal_id
            JOIN merchants m ON m.id = k.merchant_id
            WHERE k.key_prefix = $1
              AND (k.revoked_at IS NULL OR k.revoked_at > NOW())
            "#,
        )
        .bind(key_prefix)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Registra o uso da chave. Se `upgraded_hash` vier, a chave legada passa a ser guardada só como hash.
    pub async fn mark_key_used<'e, E>(&self, executor: E, key_id: Uuid, upgraded_hash: Option<&str>) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE terminal_api_keys
            SET last_used_at = NOW(),
                key_hash = COALESCE($2, key_hash),
                legacy_key = CASE WHEN $2::text IS NULL THEN legacy_key ELSE NULL END
            WHERE id = $1
              AND ($2::text IS NOT NULL OR last_used_at IS NULL OR last_used_at < NOW() - make_interval(secs => $3))
            "#,
        )
        .bind(key_id)
        .bind(upgraded_hash)
        .bind(SEEN_THROTTLE_SECS)
        .execute(executor)
        .await?;
        Ok(())
    }
}
