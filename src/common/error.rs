// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    common::{i18n::{I18nStore, DEFAULT_LANGUAGE}, money},
    middleware::i18n::Locale,
    models::{payment::PaymentIntent, print_job::PrintJobStatus},
};

/// Recursos que podem não existir (ou não pertencer ao lojista do chamador).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Merchant,
    Product,
    PaymentIntent,
    Sale,
    Terminal,
    PrintJob,
}

impl Resource {
    fn label(self, lang: &str) -> &'static str {
        match (self, lang) {
            (Resource::Merchant, "en") => "Merchant",
            (Resource::Product, "en") => "Product",
            (Resource::PaymentIntent, "en") => "Payment intent",
            (Resource::Sale, "en") => "Sale",
            (Resource::Terminal, "en") => "Terminal",
            (Resource::PrintJob, "en") => "Print job",
            (Resource::Merchant, _) => "Lojista",
            (Resource::Product, _) => "Produto",
            (Resource::PaymentIntent, _) => "Intenção de pagamento",
            (Resource::Sale, _) => "Venda",
            (Resource::Terminal, _) => "Terminal",
            (Resource::PrintJob, _) => "Impressão",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Requisição inválida: {0}")]
    InvalidInput(String),

    #[error("Carrinho vazio")]
    EmptyCart,

    #[error("Pagamento em dinheiro não gera intenção")]
    CashNotSupported,

    #[error("Valor divergente: esperado {expected_cents}, recebido {received_cents}")]
    AmountMismatch { expected_cents: i64, received_cents: i64 },

    #[error("Dinheiro insuficiente: total {total_cents}, recebido {received_cents}")]
    InsufficientCash { total_cents: i64, received_cents: i64 },

    #[error("Transição de status inválida: {0}")]
    InvalidStatusTransition(String),

    #[error("Estoque insuficiente para {product_name} ({product_id})")]
    InsufficientStock { product_id: Uuid, product_name: String },

    // A intenção foi movida para ERROR e o corpo da resposta carrega o estado final dela.
    #[error("Estoque insuficiente na confirmação da intenção: {product_name}")]
    IntentStockUnavailable {
        product_id: Uuid,
        product_name: String,
        intent: Box<PaymentIntent>,
    },

    #[error("Intenção não está pendente")]
    IntentNotPending(Box<PaymentIntent>),

    #[error("Intenção já aprovada")]
    IntentAlreadyApproved(Box<PaymentIntent>),

    #[error("Recurso não encontrado: {0:?}")]
    ResourceNotFound(Resource),

    #[error("Código não encontrado")]
    CodeNotFound,

    #[error("Código expirado")]
    CodeExpired,

    #[error("Código já utilizado por outro terminal")]
    CodeAlreadyUsedByOtherTerminal,

    #[error("Identificador já pertence a outro lojista")]
    IdentifierInUse,

    #[error("Impressão reservada para outro terminal")]
    PrintJobLocked { terminal_id: Option<Uuid> },

    #[error("Impressão não está em andamento ({0:?})")]
    PrintJobNotClaimed(PrintJobStatus),

    #[error("Operação pertence a outro terminal")]
    TerminalMismatch,

    #[error("Terminal desativado")]
    TerminalDisabled,

    #[error("Lojista suspenso")]
    MerchantSuspended,

    #[error("Lojista bloqueado")]
    MerchantBlocked,

    #[error("Perfil sem permissão")]
    InsufficientRole,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Chave de terminal inválida")]
    InvalidTerminalKey,

    #[error("Não foi possível gerar uma credencial única")]
    CredentialGenerationExhausted,

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

/// Corpo de erro que vai para o cliente.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidInput(_)
            | AppError::EmptyCart
            | AppError::CashNotSupported
            | AppError::AmountMismatch { .. }
            | AppError::InsufficientCash { .. }
            | AppError::InvalidStatusTransition(_) => StatusCode::BAD_REQUEST,

            AppError::InsufficientStock { .. }
            | AppError::IntentStockUnavailable { .. }
            | AppError::IntentNotPending(_)
            | AppError::IntentAlreadyApproved(_)
            | AppError::CodeAlreadyUsedByOtherTerminal
            | AppError::IdentifierInUse
            | AppError::PrintJobLocked { .. }
            | AppError::PrintJobNotClaimed(_) => StatusCode::CONFLICT,

            AppError::ResourceNotFound(_) | AppError::CodeNotFound => StatusCode::NOT_FOUND,
            AppError::CodeExpired => StatusCode::GONE,

            AppError::TerminalMismatch
            | AppError::TerminalDisabled
            | AppError::MerchantSuspended
            | AppError::MerchantBlocked
            | AppError::InsufficientRole => StatusCode::FORBIDDEN,

            AppError::InvalidToken | AppError::InvalidTerminalKey => StatusCode::UNAUTHORIZED,

            AppError::CredentialGenerationExhausted
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Código estável, legível por máquina.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::EmptyCart => "EMPTY_CART",
            AppError::CashNotSupported => "CASH_NOT_SUPPORTED",
            AppError::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            AppError::InsufficientCash { .. } => "INSUFFICIENT_CASH",
            AppError::InvalidStatusTransition(_) => "INVALID_STATUS_TRANSITION",
            AppError::InsufficientStock { .. } | AppError::IntentStockUnavailable { .. } => "INSUFFICIENT_STOCK",
            AppError::IntentNotPending(_) => "INTENT_NOT_PENDING",
            AppError::IntentAlreadyApproved(_) => "INTENT_ALREADY_APPROVED",
            AppError::ResourceNotFound(_) => "NOT_FOUND",
            AppError::CodeNotFound => "CODE_NOT_FOUND",
            AppError::CodeExpired => "CODE_EXPIRED",
            AppError::CodeAlreadyUsedByOtherTerminal => "CODE_ALREADY_USED_BY_OTHER_TERMINAL",
            AppError::IdentifierInUse => "IDENTIFIER_IN_USE",
            AppError::PrintJobLocked { .. } => "PRINT_JOB_LOCKED",
            AppError::PrintJobNotClaimed(_) => "PRINT_JOB_NOT_CLAIMED",
            AppError::TerminalMismatch => "TERMINAL_MISMATCH",
            AppError::TerminalDisabled => "TERMINAL_DISABLED",
            AppError::MerchantSuspended => "MERCHANT_SUSPENDED",
            AppError::MerchantBlocked => "MERCHANT_BLOCKED",
            AppError::InsufficientRole => "INSUFFICIENT_ROLE",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::InvalidTerminalKey => "INVALID_TERMINAL_KEY",
            AppError::CredentialGenerationExhausted
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_) => "INTERNAL_ERROR",
        }
    }

    fn message_args(&self, lang: &str) -> Vec<(&'static str, String)> {
        match self {
            AppError::InvalidInput(reason) | AppError::InvalidStatusTransition(reason) => {
                vec![("reason", reason.clone())]
            }
            AppError::AmountMismatch { expected_cents, received_cents } => vec![
                ("expected", money::from_cents(*expected_cents).to_string()),
                ("received", money::from_cents(*received_cents).to_string()),
            ],
            AppError::InsufficientCash { total_cents, received_cents } => vec![
                ("total", money::from_cents(*total_cents).to_string()),
                ("received", money::from_cents(*received_cents).to_string()),
            ],
            AppError::InsufficientStock { product_name, .. }
            | AppError::IntentStockUnavailable { product_name, .. } => {
                vec![("product", product_name.clone())]
            }
            AppError::IntentNotPending(intent) => vec![("status", intent.status.as_str().to_string())],
            AppError::PrintJobNotClaimed(status) => vec![("status", status.as_str().to_string())],
            AppError::ResourceNotFound(resource) => vec![("resource", resource.label(lang).to_string())],
            _ => Vec::new(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                Some(json!(details))
            }
            AppError::AmountMismatch { expected_cents, received_cents } => Some(json!({
                "expectedCents": expected_cents,
                "receivedCents": received_cents,
            })),
            AppError::InsufficientCash { total_cents, received_cents } => Some(json!({
                "totalCents": total_cents,
                "receivedCents": received_cents,
            })),
            AppError::InsufficientStock { product_id, product_name }
            | AppError::IntentStockUnavailable { product_id, product_name, .. } => Some(json!({
                "productId": product_id,
                "productName": product_name,
            })),
            AppError::PrintJobLocked { terminal_id } => Some(json!({ "terminalId": terminal_id })),
            _ => None,
        }
    }

    fn intent(&self) -> Option<Value> {
        match self {
            AppError::IntentStockUnavailable { intent, .. }
            | AppError::IntentNotPending(intent)
            | AppError::IntentAlreadyApproved(intent) => serde_json::to_value(intent.as_ref()).ok(),
            _ => None,
        }
    }

    /// Converte para o corpo da API no idioma do cliente.
    pub fn to_api_error(self, locale: &Locale, store: &I18nStore) -> ApiError {
        self.render(&locale.0, store)
    }

    fn render(self, lang: &str, store: &I18nStore) -> ApiError {
        let status = self.status();
        if status.is_server_error() {
            // O detalhe fica no log; o cliente recebe só a mensagem genérica.
            tracing::error!("Erro Interno do Servidor: {}", self);
        }

        let code = self.code();
        let message = store.translate(lang, code, &self.message_args(lang));

        ApiError {
            status,
            error: code.to_string(),
            message,
            details: self.details(),
            intent: self.intent(),
        }
    }
}

// Usado quando não há `Locale` à mão (extractors e middlewares): idioma padrão.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.render(DEFAULT_LANGUAGE, &I18nStore::new()).into_response()
    }
}

/// Identifica violação de unicidade numa constraint específica.
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
