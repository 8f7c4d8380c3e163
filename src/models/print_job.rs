// src/models/print_job.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    merchant::Merchant,
    payment::PaymentType,
    sale::{Sale, SaleItem},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "print_job_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrintJobStatus {
    Pending,
    Printing,
    Printed,
    Error,
    Canceled,
}

impl PrintJobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PrintJobStatus::Pending => "PENDING",
            PrintJobStatus::Printing => "PRINTING",
            PrintJobStatus::Printed => "PRINTED",
            PrintJobStatus::Error => "ERROR",
            PrintJobStatus::Canceled => "CANCELED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrintJob {
    pub id: Uuid,
    #[schema(ignore)]
    pub merchant_id: Uuid,
    pub sale_id: Uuid,
    pub status: PrintJobStatus,
    #[schema(value_type = ReceiptPayload)]
    pub payload: Json<ReceiptPayload>,
    pub terminal_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub claimed_at: Option<DateTime<Utc>>,
    pub printed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

/// Cupom congelado no momento da venda. Mudanças posteriores no cadastro não afetam reimpressões.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPayload {
    pub merchant_name: String,
    pub merchant_document: Option<String>,
    pub merchant_address: Option<String>,
    pub sale_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub payment_type: PaymentType,
    pub lines: Vec<ReceiptLine>,
    pub total_cents: i64,
    pub cash_received_cents: Option<i64>,
    pub change_cents: Option<i64>,
    pub authorization_code: Option<String>,
    pub footer: Option<String>,
}

impl ReceiptPayload {
    pub fn snapshot(merchant: &Merchant, sale: &Sale, items: &[SaleItem]) -> Self {
        Self {
            merchant_name: merchant.receipt_name().to_string(),
            merchant_document: merchant.document_number.clone(),
            merchant_address: merchant.address.clone(),
            sale_id: sale.id,
            issued_at: sale.created_at,
            payment_type: sale.payment_type,
            lines: items
                .iter()
                .map(|item| ReceiptLine {
                    name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price_cents,
                    total_cents: item.total_cents,
                })
                .collect(),
            total_cents: sale.total_cents,
            cash_received_cents: sale.cash_received_cents,
            change_cents: sale.change_cents,
            authorization_code: sale.authorization_code.clone(),
            footer: merchant.receipt_footer.clone(),
        }
    }
}

/// Resultado informado pelo terminal depois de tentar imprimir.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Printed,
    Error,
}

// --- Payloads ---

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AckQuery {
    /// Força o ack mesmo se outro terminal reservou a impressão.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrintErrorPayload {
    #[validate(length(max = 500, message = "Mensagem muito longa."))]
    #[schema(example = "Sem papel")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ListPrintJobsQuery {
    pub status: Option<PrintJobStatus>,
    pub limit: Option<i64>,
}
