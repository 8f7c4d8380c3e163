// src/services/auth.rs

use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::{
    common::error::AppError,
    models::auth::{Claims, PanelUser},
};

/// Valida os tokens emitidos pelo login do painel (emissão fica em outro serviço).
#[derive(Clone)]
pub struct PanelAuthService {
    jwt_secret: String,
}

impl PanelAuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    pub fn validate_token(&self, token: &str) -> Result<PanelUser, AppError> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());

        let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
            .map_err(|e| {
                tracing::debug!("Token do painel rejeitado: {}", e);
                AppError::InvalidToken
            })?;

        let claims = token_data.claims;
        if claims.role.trim().is_empty() {
            return Err(AppError::InvalidToken);
        }

        Ok(PanelUser {
            user_id: claims.sub,
            merchant_id: claims.merchant_id,
            role: claims.role.to_uppercase(),
        })
    }
}
