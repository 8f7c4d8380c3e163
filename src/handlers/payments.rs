// src/handlers/payments.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::{
        auth::{PanelUser, Principal},
        payment::{
            ConfirmPaymentIntentPayload, CreatePaymentIntentPayload, FailPaymentIntentPayload,
            ListIntentsQuery, PaymentIntent, PaymentTransaction,
        },
    },
    services::payment_intent_service::{ConfirmIntentCommand, CreateIntentCommand, FailIntentCommand},
};

// POST /api/payments/intents
#[utoipa::path(
    post,
    path = "/api/payments/intents",
    tag = "Payments",
    request_body = CreatePaymentIntentPayload,
    responses(
        (status = 201, description = "Intenção criada (ou devolvida pela chave de idempotência)", body = PaymentIntent),
        (status = 400, description = "Carrinho inválido, pagamento em dinheiro ou valor divergente"),
        (status = 409, description = "Estoque insuficiente")
    ),
    security(("terminal_key" = []), ("api_jwt" = []))
)]
pub async fn create_intent(
    State(app_state): State<AppState>,
    locale: Locale,
    principal: Principal,
    Json(payload): Json<CreatePaymentIntentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    // Terminal autenticado sempre vincula a si mesmo; o painel pode escolher
    let terminal_id = principal.terminal_id().or(payload.terminal_id);

    let intent = app_state
        .payment_intent_service
        .create_intent(CreateIntentCommand {
            merchant_id: principal.merchant_id(),
            terminal_id,
            items: payload.items,
            payment_type: payload.payment_type,
            amount: payload.amount,
            idempotency_key: payload.idempotency_key,
        })
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(intent)))
}

// GET /api/payments/intents
#[utoipa::path(
    get,
    path = "/api/payments/intents",
    tag = "Payments",
    params(ListIntentsQuery),
    responses(
        (status = 200, description = "Intenções do lojista (mais recentes primeiro)", body = Vec<PaymentIntent>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_intents(
    State(app_state): State<AppState>,
    locale: Locale,
    user: PanelUser,
    Query(query): Query<ListIntentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let intents = app_state
        .payment_intent_service
        .list_intents(user.merchant_id, query.status, query.limit)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(intents))
}

// GET /api/payments/intents/{id}
#[utoipa::path(
    get,
    path = "/api/payments/intents/{id}",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "ID da intenção")),
    responses(
        (status = 200, description = "Intenção", body = PaymentIntent),
        (status = 403, description = "Intenção vinculada a outro terminal"),
        (status = 404, description = "Não encontrada")
    ),
    security(("terminal_key" = []), ("api_jwt" = []))
)]
pub async fn get_intent(
    State(app_state): State<AppState>,
    locale: Locale,
    principal: Principal,
    Path(intent_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let intent = app_state
        .payment_intent_service
        .get_intent(principal.merchant_id(), intent_id, principal.terminal_id())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(intent))
}

// GET /api/payments/intents/{id}/transactions
#[utoipa::path(
    get,
    path = "/api/payments/intents/{id}/transactions",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "ID da intenção")),
    responses(
        (status = 200, description = "Histórico de chamadas do adquirente", body = Vec<PaymentTransaction>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_transactions(
    State(app_state): State<AppState>,
    locale: Locale,
    user: PanelUser,
    Path(intent_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = app_state
        .payment_intent_service
        .list_transactions(user.merchant_id, intent_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(rows))
}

// POST /api/payments/intents/{id}/confirm
#[utoipa::path(
    post,
    path = "/api/payments/intents/{id}/confirm",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "ID da intenção")),
    request_body = ConfirmPaymentIntentPayload,
    responses(
        (status = 200, description = "Intenção aprovada (repetições devolvem o mesmo resultado)", body = PaymentIntent),
        (status = 403, description = "Intenção vinculada a outro terminal"),
        (status = 409, description = "Intenção não pendente ou estoque insuficiente (corpo traz a intenção)")
    ),
    security(("terminal_key" = []), ("api_jwt" = []))
)]
pub async fn confirm_intent(
    State(app_state): State<AppState>,
    locale: Locale,
    principal: Principal,
    Path(intent_id): Path<Uuid>,
    Json(payload): Json<ConfirmPaymentIntentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let intent = app_state
        .payment_intent_service
        .confirm_intent(ConfirmIntentCommand {
            merchant_id: principal.merchant_id(),
            intent_id,
            terminal_id: principal.terminal_id(),
            provider: payload.provider,
            provider_ref: payload.provider_ref,
            data: payload.data,
        })
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(intent))
}

// POST /api/payments/intents/{id}/fail
#[utoipa::path(
    post,
    path = "/api/payments/intents/{id}/fail",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "ID da intenção")),
    request_body = FailPaymentIntentPayload,
    responses(
        (status = 200, description = "Intenção encerrada sem aprovação", body = PaymentIntent),
        (status = 400, description = "Status de falha inválido"),
        (status = 409, description = "Intenção já aprovada (corpo traz a intenção)")
    ),
    security(("terminal_key" = []), ("api_jwt" = []))
)]
pub async fn fail_intent(
    State(app_state): State<AppState>,
    locale: Locale,
    principal: Principal,
    Path(intent_id): Path<Uuid>,
    Json(payload): Json<FailPaymentIntentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let intent = app_state
        .payment_intent_service
        .fail_intent(FailIntentCommand {
            merchant_id: principal.merchant_id(),
            intent_id,
            terminal_id: principal.terminal_id(),
            status: payload.status,
            provider: payload.provider,
            provider_ref: payload.provider_ref,
            reason: payload.reason,
            data: payload.data,
        })
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(intent))
}
