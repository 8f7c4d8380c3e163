// src/handlers/terminals.rs

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
    middleware::{
        i18n::Locale,
        rbac::{MerchantAdmin, RequireRole},
    },
    models::{
        auth::PanelUser,
        terminal::{
            ClaimCodePayload, ClaimedCredential, CreateProvisioningCodePayload, CreateTerminalPayload,
            CreatedTerminal, IssuedCode, Terminal,
        },
    },
    services::terminal_service::ClaimCodeCommand,
};

// POST /api/terminals/pairing-codes
#[utoipa::path(
    post,
    path = "/api/terminals/pairing-codes",
    tag = "Terminals",
    request_body = CreateProvisioningCodePayload,
    responses(
        (status = 201, description = "Código de provisionamento emitido", body = IssuedCode),
        (status = 403, description = "Perfil sem permissão")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_provisioning_code(
    State(app_state): State<AppState>,
    locale: Locale,
    user: PanelUser,
    _guard: RequireRole<MerchantAdmin>,
    Json(payload): Json<CreateProvisioningCodePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let issued = app_state
        .terminal_service
        .create_provisioning_code(user.merchant_id, payload.name.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(issued)))
}

// POST /api/terminals
#[utoipa::path(
    post,
    path = "/api/terminals",
    tag = "Terminals",
    request_body = CreateTerminalPayload,
    responses(
        (status = 201, description = "Terminal criado com código de pareamento", body = CreatedTerminal),
        (status = 403, description = "Perfil sem permissão")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_terminal(
    State(app_state): State<AppState>,
    locale: Locale,
    user: PanelUser,
    _guard: RequireRole<MerchantAdmin>,
    Json(payload): Json<CreateTerminalPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let created = app_state
        .terminal_service
        .create_terminal(user.merchant_id, payload.name.trim())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/terminals
#[utoipa::path(
    get,
    path = "/api/terminals",
    tag = "Terminals",
    responses(
        (status = 200, description = "Terminais do lojista", body = Vec<Terminal>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_terminals(
    State(app_state): State<AppState>,
    locale: Locale,
    user: PanelUser,
) -> Result<impl IntoResponse, ApiError> {
    let terminals = app_state
        .terminal_service
        .list_terminals(user.merchant_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(terminals))
}

// POST /api/terminals/{id}/pairing-code
#[utoipa::path(
    post,
    path = "/api/terminals/{id}/pairing-code",
    tag = "Terminals",
    params(("id" = Uuid, Path, description = "ID do terminal")),
    responses(
        (status = 201, description = "Novo código de pareamento (invalida os anteriores)", body = IssuedCode),
        (status = 404, description = "Terminal não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_pairing_code(
    State(app_state): State<AppState>,
    locale: Locale,
    user: PanelUser,
    _guard: RequireRole<MerchantAdmin>,
    Path(terminal_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let issued = app_state
        .terminal_service
        .create_pairing_code(user.merchant_id, terminal_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(issued)))
}

// POST /api/terminals/{id}/revoke
#[utoipa::path(
    post,
    path = "/api/terminals/{id}/revoke",
    tag = "Terminals",
    params(("id" = Uuid, Path, description = "ID do terminal")),
    responses(
        (status = 200, description = "Terminal desativado e chaves revogadas", body = Terminal),
        (status = 404, description = "Terminal não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn revoke_terminal(
    State(app_state): State<AppState>,
    locale: Locale,
    user: PanelUser,
    _guard: RequireRole<MerchantAdmin>,
    Path(terminal_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let terminal = app_state
        .terminal_service
        .revoke_terminal(user.merchant_id, terminal_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(terminal))
}

// POST /api/terminals/claim
#[utoipa::path(
    post,
    path = "/api/terminals/claim",
    tag = "Terminals",
    request_body = ClaimCodePayload,
    responses(
        (status = 200, description = "Terminal vinculado; a chave só é exibida aqui", body = ClaimedCredential),
        (status = 404, description = "Código inexistente"),
        (status = 409, description = "Código já usado por outro dispositivo"),
        (status = 410, description = "Código expirado")
    )
)]
pub async fn claim(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<ClaimCodePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let credential = app_state
        .terminal_service
        .claim_code(ClaimCodeCommand {
            code: payload.code,
            identifier: payload.identifier,
            name: payload.name,
            model: payload.model,
        })
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(credential))
}
