// src/handlers/print_jobs.rs

use axum::{
    extract::{Path, Query, State},
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
        auth::{PanelUser, TerminalContext},
        print_job::{AckOutcome, AckQuery, ListPrintJobsQuery, PrintErrorPayload, PrintJob},
    },
    services::print_job_service::AcknowledgeCommand,
};

// GET /api/print-jobs/next
#[utoipa::path(
    get,
    path = "/api/print-jobs/next",
    tag = "Print Jobs",
    responses(
        (status = 200, description = "Próxima impressão reservada para o terminal, ou null", body = PrintJob)
    ),
    security(("terminal_key" = []))
)]
pub async fn next_job(
    State(app_state): State<AppState>,
    locale: Locale,
    terminal: TerminalContext,
) -> Result<impl IntoResponse, ApiError> {
    let job = app_state
        .print_job_service
        .dequeue_next(terminal.merchant_id, Some(terminal.terminal_id))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(job))
}

// POST /api/print-jobs/{id}/printed
#[utoipa::path(
    post,
    path = "/api/print-jobs/{id}/printed",
    tag = "Print Jobs",
    params(("id" = Uuid, Path, description = "ID da impressão"), AckQuery),
    responses(
        (status = 200, description = "Impressão concluída", body = PrintJob),
        (status = 409, description = "Reservada por outro terminal ou não está em impressão")
    ),
    security(("terminal_key" = []))
)]
pub async fn mark_printed(
    State(app_state): State<AppState>,
    locale: Locale,
    terminal: TerminalContext,
    Path(job_id): Path<Uuid>,
    Query(query): Query<AckQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let job = app_state
        .print_job_service
        .acknowledge(AcknowledgeCommand {
            merchant_id: terminal.merchant_id,
            job_id,
            outcome: AckOutcome::Printed,
            terminal_id: Some(terminal.terminal_id),
            error_message: None,
            force: query.force,
        })
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(job))
}

// POST /api/print-jobs/{id}/error
#[utoipa::path(
    post,
    path = "/api/print-jobs/{id}/error",
    tag = "Print Jobs",
    params(("id" = Uuid, Path, description = "ID da impressão"), AckQuery),
    request_body = PrintErrorPayload,
    responses(
        (status = 200, description = "Falha registrada", body = PrintJob),
        (status = 409, description = "Reservada por outro terminal ou não está em impressão")
    ),
    security(("terminal_key" = []))
)]
pub async fn mark_error(
    State(app_state): State<AppState>,
    locale: Locale,
    terminal: TerminalContext,
    Path(job_id): Path<Uuid>,
    Query(query): Query<AckQuery>,
    Json(payload): Json<PrintErrorPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let job = app_state
        .print_job_service
        .acknowledge(AcknowledgeCommand {
            merchant_id: terminal.merchant_id,
            job_id,
            outcome: AckOutcome::Error,
            terminal_id: Some(terminal.terminal_id),
            error_message: payload.message,
            force: query.force,
        })
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(job))
}

// GET /api/print-jobs
#[utoipa::path(
    get,
    path = "/api/print-jobs",
    tag = "Print Jobs",
    params(ListPrintJobsQuery),
    responses(
        (status = 200, description = "Fila de impressão do lojista", body = Vec<PrintJob>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_jobs(
    State(app_state): State<AppState>,
    locale: Locale,
    user: PanelUser,
    Query(query): Query<ListPrintJobsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let jobs = app_state
        .print_job_service
        .list(user.merchant_id, query.status, query.limit)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(jobs))
}

// POST /api/print-jobs/{id}/retry
#[utoipa::path(
    post,
    path = "/api/print-jobs/{id}/retry",
    tag = "Print Jobs",
    params(("id" = Uuid, Path, description = "ID da impressão")),
    responses(
        (status = 200, description = "Impressão devolvida à fila", body = PrintJob),
        (status = 400, description = "Transição de status inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn retry_job(
    State(app_state): State<AppState>,
    locale: Locale,
    user: PanelUser,
    _guard: RequireRole<MerchantAdmin>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let job = app_state
        .print_job_service
        .retry(user.merchant_id, job_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(job))
}

// POST /api/print-jobs/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/print-jobs/{id}/cancel",
    tag = "Print Jobs",
    params(("id" = Uuid, Path, description = "ID da impressão")),
    responses(
        (status = 200, description = "Impressão cancelada", body = PrintJob),
        (status = 400, description = "Transição de status inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_job(
    State(app_state): State<AppState>,
    locale: Locale,
    user: PanelUser,
    _guard: RequireRole<MerchantAdmin>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let job = app_state
        .print_job_service
        .cancel(user.merchant_id, job_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(job))
}
