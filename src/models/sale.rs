// src/models/sale.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{payment::PaymentType, product::CartItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "sale_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    Pending,
    Paid,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: Uuid,
    #[schema(ignore)]
    pub merchant_id: Uuid,
    pub terminal_id: Option<Uuid>,
    #[schema(example = 1500)]
    pub total_cents: i64,
    pub payment_type: PaymentType,
    pub status: SaleStatus,
    pub cash_received_cents: Option<i64>,
    pub change_cents: Option<i64>,
    pub provider: Option<String>,
    pub provider_ref: Option<String>,
    pub authorization_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub position: i32,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

/// Venda com itens e a impressão vinculada (se houver).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub print_job_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCashSalePayload {
    #[validate(length(min = 1, message = "O carrinho deve ter ao menos um item."), nested)]
    pub items: Vec<CartItem>,
    /// Valor entregue pelo cliente.
    #[schema(value_type = f64, example = 20.00)]
    pub cash_received: Decimal,
    pub terminal_id: Option<Uuid>,
}
