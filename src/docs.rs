// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- PAYMENTS ---
        handlers::payments::create_intent,
        handlers::payments::list_intents,
        handlers::payments::get_intent,
        handlers::payments::list_transactions,
        handlers::payments::confirm_intent,
        handlers::payments::fail_intent,

        // --- SALES ---
        handlers::sales::create_cash_sale,
        handlers::sales::get_sale,

        // --- TERMINALS ---
        handlers::terminals::create_provisioning_code,
        handlers::terminals::create_terminal,
        handlers::terminals::list_terminals,
        handlers::terminals::create_pairing_code,
        handlers::terminals::revoke_terminal,
        handlers::terminals::claim,

        // --- PRINT JOBS ---
        handlers::print_jobs::next_job,
        handlers::print_jobs::mark_printed,
        handlers::print_jobs::mark_error,
        handlers::print_jobs::list_jobs,
        handlers::print_jobs::retry_job,
        handlers::print_jobs::cancel_job,
    ),
    components(
        schemas(
            // --- Payments ---
            models::product::CartItem,
            models::payment::PaymentIntentStatus,
            models::payment::PaymentType,
            models::payment::DraftLine,
            models::payment::SaleDraft,
            models::payment::PaymentIntent,
            models::payment::PaymentTransaction,
            models::payment::ProviderData,
            models::payment::CreatePaymentIntentPayload,
            models::payment::ConfirmPaymentIntentPayload,
            models::payment::FailPaymentIntentPayload,

            // --- Sales ---
            models::sale::SaleStatus,
            models::sale::Sale,
            models::sale::SaleItem,
            models::sale::SaleDetail,
            models::sale::CreateCashSalePayload,

            // --- Terminals ---
            models::terminal::TerminalStatus,
            models::terminal::Terminal,
            models::terminal::IssuedCode,
            models::terminal::CreatedTerminal,
            models::terminal::ClaimedCredential,
            models::terminal::CreateProvisioningCodePayload,
            models::terminal::CreateTerminalPayload,
            models::terminal::ClaimCodePayload,

            // --- Print Jobs ---
            models::print_job::PrintJobStatus,
            models::print_job::PrintJob,
            models::print_job::ReceiptLine,
            models::print_job::ReceiptPayload,
            models::print_job::PrintErrorPayload,
        )
    ),
    tags(
        (name = "Payments", description = "Intenções de pagamento (PIX, débito, crédito)"),
        (name = "Sales", description = "Vendas e venda direta em dinheiro"),
        (name = "Terminals", description = "Cadastro, pareamento e revogação de terminais"),
        (name = "Print Jobs", description = "Fila de impressão de comprovantes")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
        components.add_security_scheme(
            "terminal_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Terminal-Key"))),
        );
    }
}
