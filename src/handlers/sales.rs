// src/handlers/sales.rs

use axum::{
    extract::{Path, State},
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
        auth::Principal,
        sale::{CreateCashSalePayload, SaleDetail},
    },
    services::sale_service::CashSaleCommand,
};

// POST /api/sales/cash
#[utoipa::path(
    post,
    path = "/api/sales/cash",
    tag = "Sales",
    request_body = CreateCashSalePayload,
    responses(
        (status = 201, description = "Venda registrada", body = SaleDetail),
        (status = 400, description = "Carrinho inválido ou valor recebido insuficiente"),
        (status = 409, description = "Estoque insuficiente")
    ),
    security(("terminal_key" = []), ("api_jwt" = []))
)]
pub async fn create_cash_sale(
    State(app_state): State<AppState>,
    locale: Locale,
    principal: Principal,
    Json(payload): Json<CreateCashSalePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let detail = app_state
        .sale_service
        .create_cash_sale(CashSaleCommand {
            merchant_id: principal.merchant_id(),
            terminal_id: principal.terminal_id().or(payload.terminal_id),
            items: payload.items,
            cash_received: payload.cash_received,
        })
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(detail)))
}

// GET /api/sales/{id}
#[utoipa::path(
    get,
    path = "/api/sales/{id}",
    tag = "Sales",
    params(("id" = Uuid, Path, description = "ID da venda")),
    responses(
        (status = 200, description = "Venda com itens e impressão", body = SaleDetail),
        (status = 404, description = "Não encontrada")
    ),
    security(("terminal_key" = []), ("api_jwt" = []))
)]
pub async fn get_sale(
    State(app_state): State<AppState>,
    locale: Locale,
    principal: Principal,
    Path(sale_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = app_state
        .sale_service
        .get_sale(principal.merchant_id(), sale_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(detail))
}
