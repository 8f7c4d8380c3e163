// src/models/payment.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::product::CartItem;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_intent_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentIntentStatus {
    Pending,
    Approved,
    Declined,
    Canceled,
    Error,
    Expired,
}

impl PaymentIntentStatus {
    /// Só PENDING aceita transição; todo o resto é final.
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentIntentStatus::Pending)
    }

    /// Status aceitos por `fail` (tudo que encerra sem aprovar).
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            PaymentIntentStatus::Declined
                | PaymentIntentStatus::Canceled
                | PaymentIntentStatus::Error
                | PaymentIntentStatus::Expired
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentIntentStatus::Pending => "PENDING",
            PaymentIntentStatus::Approved => "APPROVED",
            PaymentIntentStatus::Declined => "DECLINED",
            PaymentIntentStatus::Canceled => "CANCELED",
            PaymentIntentStatus::Error => "ERROR",
            PaymentIntentStatus::Expired => "EXPIRED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Credit,
    Debit,
    Pix,
    Cash,
}

// --- Rascunho congelado da venda ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DraftLine {
    pub product_id: Uuid,
    #[schema(example = "Café expresso")]
    pub product_name: String,
    pub quantity: i32,
    #[schema(example = 750)]
    pub unit_price_cents: i64,
    #[schema(example = 1500)]
    pub total_cents: i64,
}

/// Carrinho precificado no momento da criação da intenção.
/// É a única fonte da venda na confirmação; o catálogo não é consultado de novo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleDraft {
    pub lines: Vec<DraftLine>,
    pub total_cents: i64,
}

// --- Intenção ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: Uuid,
    #[schema(ignore)]
    pub merchant_id: Uuid,
    pub terminal_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
    pub status: PaymentIntentStatus,
    pub payment_type: PaymentType,
    #[schema(example = 1500)]
    pub amount_cents: i64,
    #[schema(value_type = SaleDraft)]
    pub sale_draft: Json<SaleDraft>,
    #[schema(example = "STONE")]
    pub provider: Option<String>,
    pub provider_ref: Option<String>,
    pub sale_id: Option<Uuid>,
    pub print_job_id: Option<Uuid>,
    pub failure_reason: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registro de auditoria de cada chamada que mudou o estado da intenção.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub intent_id: Uuid,
    #[schema(ignore)]
    pub merchant_id: Uuid,
    pub status: PaymentIntentStatus,
    pub provider: String,
    pub provider_ref: Option<String>,
    pub authorization_code: Option<String>,
    pub transaction_id: Option<String>,
    pub nsu: Option<String>,
    pub card_brand: Option<String>,
    pub installments: Option<i32>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

// --- Dados do adquirente ---

const PROVIDER_FIELD_MAX_LEN: usize = 128;

/// Campos do adquirente que aceitamos guardar. Qualquer outro campo
/// (PAN, CVV, trilha, PIN...) é descartado na desserialização.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderData {
    #[serde(default, alias = "authCode", alias = "authorization_code")]
    pub authorization_code: Option<String>,
    #[serde(default, alias = "tid", alias = "transaction_id")]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub nsu: Option<String>,
    #[serde(default, alias = "brand", alias = "card_brand")]
    pub card_brand: Option<String>,
    #[serde(default)]
    pub installments: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProviderData {
    /// Corta espaços e limita o tamanho de cada campo.
    pub fn sanitized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().chars().take(PROVIDER_FIELD_MAX_LEN).collect::<String>())
                .filter(|v| !v.is_empty())
        }

        Self {
            authorization_code: clean(self.authorization_code),
            transaction_id: clean(self.transaction_id),
            nsu: clean(self.nsu),
            card_brand: clean(self.card_brand),
            installments: self.installments.filter(|n| *n > 0),
            message: clean(self.message),
        }
    }
}

// --- Payloads ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentPayload {
    #[validate(length(min = 1, message = "O carrinho deve ter ao menos um item."), nested)]
    pub items: Vec<CartItem>,
    pub payment_type: PaymentType,
    /// Total calculado pelo cliente (opcional). Se vier, precisa bater com o do servidor.
    #[schema(value_type = Option<f64>, example = 15.00)]
    pub amount: Option<Decimal>,
    #[validate(length(min = 1, max = 128, message = "A chave de idempotência deve ter entre 1 e 128 caracteres."))]
    pub idempotency_key: Option<String>,
    /// Só para chamadas do painel; o terminal é inferido da credencial.
    pub terminal_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentIntentPayload {
    #[validate(length(min = 1, max = 64, message = "O adquirente deve ser informado."))]
    #[schema(example = "STONE")]
    pub provider: String,
    #[validate(length(max = 128, message = "Referência muito longa."))]
    pub provider_ref: Option<String>,
    #[serde(default)]
    pub data: ProviderData,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailPaymentIntentPayload {
    pub status: PaymentIntentStatus,
    #[validate(length(min = 1, max = 64, message = "O adquirente deve ser informado."))]
    pub provider: String,
    #[validate(length(max = 128, message = "Referência muito longa."))]
    pub provider_ref: Option<String>,
    #[validate(length(max = 500, message = "Motivo muito longo."))]
    pub reason: Option<String>,
    #[serde(default)]
    pub data: ProviderData,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ListIntentsQuery {
    pub status: Option<PaymentIntentStatus>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_pending_is_open() {
        assert!(!PaymentIntentStatus::Pending.is_terminal());
        assert!(PaymentIntentStatus::Approved.is_terminal());
        assert!(PaymentIntentStatus::Expired.is_terminal());
        assert!(!PaymentIntentStatus::Approved.is_failure());
        assert!(!PaymentIntentStatus::Pending.is_failure());
        assert!(PaymentIntentStatus::Declined.is_failure());
    }

    #[test]
    fn provider_data_drops_unknown_fields() {
        let raw = json!({
            "authCode": "A1B2C3",
            "nsu": "000123",
            "brand": "VISA",
            "pan": "4111111111111111",
            "cvv": "123",
            "track2": ";4111111111111111=2512?"
        });

        let data: ProviderData = serde_json::from_value(raw).unwrap();
        let stored = serde_json::to_string(&data.sanitized()).unwrap();

        assert!(stored.contains("A1B2C3"));
        assert!(stored.contains("VISA"));
        assert!(!stored.contains("4111111111111111"));
        assert!(!stored.contains("cvv"));
    }

    #[test]
    fn provider_data_is_trimmed_and_bounded() {
        let data = ProviderData {
            authorization_code: Some("  XYZ  ".into()),
            message: Some("a".repeat(1000)),
            nsu: Some("   ".into()),
            installments: Some(0),
            ..Default::default()
        }
        .sanitized();

        assert_eq!(data.authorization_code.as_deref(), Some("XYZ"));
        assert_eq!(data.message.map(|m| m.len()), Some(PROVIDER_FIELD_MAX_LEN));
        assert_eq!(data.nsu, None);
        assert_eq!(data.installments, None);
    }

    #[test]
    fn intent_serializes_draft_inline() {
        let draft = SaleDraft {
            lines: vec![DraftLine {
                product_id: Uuid::nil(),
                product_name: "Café".into(),
                quantity: 2,
                unit_price_cents: 750,
                total_cents: 1500,
            }],
            total_cents: 1500,
        };
        let value = serde_json::to_value(Json(draft)).unwrap();
        assert_eq!(value["totalCents"], 1500);
        assert_eq!(value["lines"][0]["unitPriceCents"], 750);
    }
}
