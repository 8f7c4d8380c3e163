// src/models/auth.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Claims do JWT emitido pelo painel (o login em si é de outro serviço)
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,          // ID do usuário
    pub merchant_id: Uuid,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

/// Usuário do painel já autenticado.
#[derive(Debug, Clone)]
pub struct PanelUser {
    pub user_id: Uuid,
    pub merchant_id: Uuid,
    pub role: String,
}

/// Terminal autenticado pela chave `X-Terminal-Key`.
#[derive(Debug, Clone)]
pub struct TerminalContext {
    pub terminal_id: Uuid,
    pub merchant_id: Uuid,
}

/// Quem está chamando: usuário do painel ou terminal.
#[derive(Debug, Clone)]
pub enum Principal {
    Panel(PanelUser),
    Terminal(TerminalContext),
}

impl Principal {
    pub fn merchant_id(&self) -> Uuid {
        match self {
            Principal::Panel(user) => user.merchant_id,
            Principal::Terminal(terminal) => terminal.merchant_id,
        }
    }

    pub fn terminal_id(&self) -> Option<Uuid> {
        match self {
            Principal::Panel(_) => None,
            Principal::Terminal(terminal) => Some(terminal.terminal_id),
        }
    }
}
