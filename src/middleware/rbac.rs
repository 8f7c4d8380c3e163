// src/middleware/rbac.rs

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{common::error::AppError, models::auth::PanelUser};

/// Define quais perfis do painel passam por um guardião.
pub trait RoleDef: Send + Sync + 'static {
    fn allowed() -> &'static [&'static str];
}

/// Extractor que exige um usuário do painel com um dos perfis de `T`.
pub struct RequireRole<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleDef,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Terminais nunca passam por aqui
        let user = parts
            .extensions
            .get::<PanelUser>()
            .ok_or(AppError::InsufficientRole)?;

        if !T::allowed().contains(&user.role.as_str()) {
            tracing::debug!(user_id = %user.user_id, role = %user.role, "Perfil sem permissão");
            return Err(AppError::InsufficientRole);
        }

        Ok(RequireRole(PhantomData))
    }
}

// ---
// PERFIS
// ---

/// Dono ou administrador do lojista: gerencia terminais e a fila de impressão.
pub struct MerchantAdmin;
impl RoleDef for MerchantAdmin {
    fn allowed() -> &'static [&'static str] {
        &["OWNER", "ADMIN"]
    }
}
