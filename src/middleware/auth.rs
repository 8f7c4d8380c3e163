// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::i18n::Locale,
    models::auth::{PanelUser, Principal, TerminalContext},
};

pub const TERMINAL_KEY_HEADER: &str = "x-terminal-key";

fn terminal_key(request: &Request) -> Option<String> {
    request
        .headers()
        .get(TERMINAL_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Rotas do painel: exige `Authorization: Bearer <jwt>`.
pub async fn panel_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer
        .ok_or_else(|| AppError::InvalidToken.to_api_error(&locale, &app_state.i18n_store))?;

    let user = app_state
        .panel_auth_service
        .validate_token(bearer.token())
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    request.extensions_mut().insert(Principal::Panel(user.clone()));
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Rotas do terminal: exige `X-Terminal-Key`.
pub async fn terminal_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = terminal_key(&request)
        .ok_or_else(|| AppError::InvalidTerminalKey.to_api_error(&locale, &app_state.i18n_store))?;

    let terminal = app_state
        .terminal_service
        .verify_key(&key)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    request.extensions_mut().insert(Principal::Terminal(terminal.clone()));
    request.extensions_mut().insert(terminal);
    Ok(next.run(request).await)
}

/// Rotas compartilhadas: aceita terminal (preferido, se a chave vier) ou painel.
pub async fn principal_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(key) = terminal_key(&request) {
        let terminal = app_state
            .terminal_service
            .verify_key(&key)
            .await
            .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

        request.extensions_mut().insert(Principal::Terminal(terminal.clone()));
        request.extensions_mut().insert(terminal);
        return Ok(next.run(request).await);
    }

    if let Some(TypedHeader(Authorization(bearer))) = bearer {
        let user = app_state
            .panel_auth_service
            .validate_token(bearer.token())
            .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

        request.extensions_mut().insert(Principal::Panel(user.clone()));
        request.extensions_mut().insert(user);
        return Ok(next.run(request).await);
    }

    Err(AppError::InvalidToken.to_api_error(&locale, &app_state.i18n_store))
}

// ---
// Extractors para os handlers
// ---

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AppError::InvalidToken)
    }
}

impl<S> FromRequestParts<S> for PanelUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<PanelUser>()
            .cloned()
            .ok_or(AppError::InvalidToken)
    }
}

impl<S> FromRequestParts<S> for TerminalContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TerminalContext>()
            .cloned()
            .ok_or(AppError::InvalidTerminalKey)
    }
}
