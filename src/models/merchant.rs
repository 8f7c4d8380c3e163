// src/models/merchant.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

// Cadastro do lojista é mantido fora deste serviço; aqui só lemos.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Merchant {
    pub id: Uuid,
    pub name: String,
    pub display_name: Option<String>,
    pub document_number: Option<String>,
    pub address: Option<String>,
    pub receipt_footer: Option<String>,
    pub allow_negative_stock: bool,
    pub suspended: bool,
    pub login_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Merchant {
    /// Nome que sai no cupom.
    pub fn receipt_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}
