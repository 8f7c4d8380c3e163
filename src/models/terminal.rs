// src/models/terminal.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "terminal_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalStatus {
    Offline,
    Online,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Terminal {
    pub id: Uuid,
    #[schema(ignore)]
    pub merchant_id: Uuid,
    #[schema(example = "Caixa 01")]
    pub name: String,
    #[schema(example = "SN-A910-0001")]
    pub identifier: Option<String>,
    #[schema(example = "A910")]
    pub model: Option<String>,
    pub status: TerminalStatus,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registro de chave. Só o hash fica guardado; o segredo é devolvido uma vez no claim.
#[derive(Clone, FromRow)]
pub struct TerminalApiKey {
    pub id: Uuid,
    pub terminal_id: Uuid,
    pub merchant_id: Uuid,
    pub key_prefix: String,
    pub key_hash: Option<String>,
    pub legacy_key: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for TerminalApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalApiKey")
            .field("id", &self.id)
            .field("terminal_id", &self.terminal_id)
            .field("key_prefix", &self.key_prefix)
            .field("key_hash", &"<redacted>")
            .field("revoked_at", &self.revoked_at)
            .finish()
    }
}

/// Chave candidata na verificação, já com o estado do terminal e do lojista.
#[derive(Clone, FromRow)]
pub struct TerminalCredential {
    pub key_id: Uuid,
    pub terminal_id: Uuid,
    pub merchant_id: Uuid,
    pub key_hash: Option<String>,
    pub legacy_key: Option<String>,
    pub terminal_status: TerminalStatus,
    pub merchant_suspended: bool,
    pub merchant_login_blocked: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProvisioningCode {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub code: String,
    pub name: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub terminal_id: Option<Uuid>,
    pub device_identifier: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PairingCode {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub terminal_id: Uuid,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub device_identifier: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Código curto devolvido ao painel.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCode {
    #[schema(example = "042917")]
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub terminal_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTerminal {
    pub terminal: Terminal,
    pub pairing_code: IssuedCode,
}

/// Resposta do claim: a única vez em que o segredo sai do servidor.
#[derive(Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedCredential {
    pub terminal_id: Uuid,
    #[schema(ignore)]
    pub merchant_id: Uuid,
    pub terminal_name: String,
    #[schema(example = "pdv_3f9a...")]
    pub api_key: String,
}

impl std::fmt::Debug for ClaimedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimedCredential")
            .field("terminal_id", &self.terminal_id)
            .field("merchant_id", &self.merchant_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProvisioningCodePayload {
    /// Nome sugerido para o terminal que usar o código.
    #[validate(length(min = 1, max = 100, message = "O nome deve ter entre 1 e 100 caracteres."))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTerminalPayload {
    #[validate(length(min = 1, max = 100, message = "O nome deve ter entre 1 e 100 caracteres."))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimCodePayload {
    #[validate(length(equal = 6, message = "O código deve ter 6 dígitos."))]
    #[schema(example = "042917")]
    pub code: String,
    /// Identificador de hardware (número de série) do dispositivo.
    #[validate(length(min = 1, max = 128, message = "O identificador do dispositivo é obrigatório."))]
    pub identifier: String,
    #[validate(length(min = 1, max = 100, message = "O nome deve ter entre 1 e 100 caracteres."))]
    pub name: Option<String>,
    #[validate(length(max = 64, message = "Modelo muito longo."))]
    pub model: Option<String>,
}
