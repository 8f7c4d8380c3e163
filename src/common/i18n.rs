// src/common/i18n.rs

use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_LANGUAGE: &str = "pt";
pub const SUPPORTED_LANGUAGES: &[&str] = &["pt", "en"];

// Catálogo: código do erro -> mensagem. `{campo}` é substituído pelos argumentos.
const PT: &[(&str, &str)] = &[
    ("VALIDATION_ERROR", "Um ou mais campos são inválidos."),
    ("INVALID_INPUT", "Requisição inválida: {reason}"),
    ("EMPTY_CART", "O carrinho está vazio."),
    ("CASH_NOT_SUPPORTED", "Pagamentos em dinheiro devem ser registrados como venda em dinheiro."),
    ("AMOUNT_MISMATCH", "O valor informado ({received}) difere do total calculado ({expected})."),
    ("INSUFFICIENT_CASH", "Valor recebido ({received}) menor que o total da venda ({total})."),
    ("INVALID_STATUS_TRANSITION", "Transição de status inválida: {reason}"),
    ("INSUFFICIENT_STOCK", "Estoque insuficiente para o produto '{product}'."),
    ("INTENT_NOT_PENDING", "A intenção de pagamento não está mais pendente (status {status})."),
    ("INTENT_ALREADY_APPROVED", "A intenção de pagamento já foi aprovada."),
    ("NOT_FOUND", "{resource} não encontrado(a)."),
    ("CODE_NOT_FOUND", "Código de pareamento não encontrado."),
    ("CODE_EXPIRED", "Código de pareamento expirado."),
    ("CODE_ALREADY_USED_BY_OTHER_TERMINAL", "Este código já foi utilizado por outro terminal."),
    ("IDENTIFIER_IN_USE", "Este identificador de dispositivo já pertence a outro lojista."),
    ("PRINT_JOB_LOCKED", "A impressão está reservada para outro terminal."),
    ("PRINT_JOB_NOT_CLAIMED", "A impressão não está em andamento (status {status})."),
    ("TERMINAL_MISMATCH", "Esta operação pertence a outro terminal."),
    ("TERMINAL_DISABLED", "Terminal desativado."),
    ("MERCHANT_SUSPENDED", "Lojista suspenso."),
    ("MERCHANT_BLOCKED", "Acesso do lojista bloqueado."),
    ("INSUFFICIENT_ROLE", "Seu perfil não permite realizar esta ação."),
    ("INVALID_TOKEN", "Token de autenticação inválido ou ausente."),
    ("INVALID_TERMINAL_KEY", "Chave do terminal inválida ou ausente."),
    ("INTERNAL_ERROR", "Ocorreu um erro inesperado."),
];

const EN: &[(&str, &str)] = &[
    ("VALIDATION_ERROR", "One or more fields are invalid."),
    ("INVALID_INPUT", "Invalid request: {reason}"),
    ("EMPTY_CART", "The cart is empty."),
    ("CASH_NOT_SUPPORTED", "Cash payments must be recorded as a cash sale."),
    ("AMOUNT_MISMATCH", "The supplied amount ({received}) differs from the computed total ({expected})."),
    ("INSUFFICIENT_CASH", "Cash received ({received}) is lower than the sale total ({total})."),
    ("INVALID_STATUS_TRANSITION", "Invalid status transition: {reason}"),
    ("INSUFFICIENT_STOCK", "Insufficient stock for product '{product}'."),
    ("INTENT_NOT_PENDING", "The payment intent is no longer pending (status {status})."),
    ("INTENT_ALREADY_APPROVED", "The payment intent has already been approved."),
    ("NOT_FOUND", "{resource} not found."),
    ("CODE_NOT_FOUND", "Pairing code not found."),
    ("CODE_EXPIRED", "Pairing code expired."),
    ("CODE_ALREADY_USED_BY_OTHER_TERMINAL", "This code was already used by another terminal."),
    ("IDENTIFIER_IN_USE", "This device identifier belongs to another merchant."),
    ("PRINT_JOB_LOCKED", "The print job is reserved for another terminal."),
    ("PRINT_JOB_NOT_CLAIMED", "The print job is not in progress (status {status})."),
    ("TERMINAL_MISMATCH", "This operation belongs to another terminal."),
    ("TERMINAL_DISABLED", "Terminal disabled."),
    ("MERCHANT_SUSPENDED", "Merchant suspended."),
    ("MERCHANT_BLOCKED", "Merchant access blocked."),
    ("INSUFFICIENT_ROLE", "Your role does not allow this action."),
    ("INVALID_TOKEN", "Invalid or missing authentication token."),
    ("INVALID_TERMINAL_KEY", "Invalid or missing terminal key."),
    ("INTERNAL_ERROR", "An unexpected error occurred."),
];

/// Mensagens traduzidas dos erros da API.
#[derive(Clone)]
pub struct I18nStore {
    catalogs: Arc<HashMap<&'static str, HashMap<&'static str, &'static str>>>,
}

impl Default for I18nStore {
    fn default() -> Self {
        Self::new()
    }
}

impl I18nStore {
    pub fn new() -> Self {
        let mut catalogs = HashMap::new();
        catalogs.insert("pt", PT.iter().copied().collect());
        catalogs.insert("en", EN.iter().copied().collect());
        Self { catalogs: Arc::new(catalogs) }
    }

    /// Traduz `code` para `lang`. Cai para o idioma padrão e, em último caso, devolve o próprio código.
    pub fn translate(&self, lang: &str, code: &str, args: &[(&'static str, String)]) -> String {
        let template = self
            .lookup(lang, code)
            .or_else(|| self.lookup(DEFAULT_LANGUAGE, code))
            .unwrap_or(code);

        render(template, args)
    }

    fn lookup(&self, lang: &str, code: &str) -> Option<&'static str> {
        self.catalogs.get(lang).and_then(|c| c.get(code)).copied()
    }
}

fn render(template: &str, args: &[(&'static str, String)]) -> String {
    let mut out = template.to_string();
    for (name, value) in args {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}

pub fn is_supported(lang: &str) -> bool {
    SUPPORTED_LANGUAGES.contains(&lang)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_with_placeholders() {
        let store = I18nStore::new();
        let msg = store.translate("en", "INSUFFICIENT_STOCK", &[("product", "Café".to_string())]);
        assert_eq!(msg, "Insufficient stock for product 'Café'.");
    }

    #[test]
    fn unknown_language_falls_back_to_portuguese() {
        let store = I18nStore::new();
        assert_eq!(store.translate("de", "CODE_EXPIRED", &[]), "Código de pareamento expirado.");
    }

    #[test]
    fn unknown_code_is_returned_verbatim() {
        let store = I18nStore::new();
        assert_eq!(store.translate("pt", "SOMETHING_ELSE", &[]), "SOMETHING_ELSE");
    }

    #[test]
    fn catalogs_cover_the_same_codes() {
        let pt: Vec<&str> = PT.iter().map(|(c, _)| *c).collect();
        let en: Vec<&str> = EN.iter().map(|(c, _)| *c).collect();
        assert_eq!(pt, en);
    }
}
