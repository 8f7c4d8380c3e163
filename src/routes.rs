// src/routes.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::AppState,
    docs::ApiDoc,
    handlers,
    middleware::auth::{panel_guard, principal_guard, terminal_guard},
};

/// Monta o router completo da API.
pub fn build_router(app_state: AppState) -> Router {
    // Painel ou terminal
    let payment_routes = Router::new()
        .route(
            "/intents",
            post(handlers::payments::create_intent).get(handlers::payments::list_intents),
        )
        .route("/intents/{id}", get(handlers::payments::get_intent))
        .route("/intents/{id}/transactions", get(handlers::payments::list_transactions))
        .route("/intents/{id}/confirm", post(handlers::payments::confirm_intent))
        .route("/intents/{id}/fail", post(handlers::payments::fail_intent))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            principal_guard,
        ));

    let sale_routes = Router::new()
        .route("/cash", post(handlers::sales::create_cash_sale))
        .route("/{id}", get(handlers::sales::get_sale))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            principal_guard,
        ));

    // O claim é a única rota sem credencial
    let terminal_public_routes = Router::new()
        .route("/claim", post(handlers::terminals::claim));

    let terminal_panel_routes = Router::new()
        .route(
            "/",
            post(handlers::terminals::create_terminal).get(handlers::terminals::list_terminals),
        )
        .route("/pairing-codes", post(handlers::terminals::create_provisioning_code))
        .route("/{id}/pairing-code", post(handlers::terminals::create_pairing_code))
        .route("/{id}/revoke", post(handlers::terminals::revoke_terminal))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            panel_guard,
        ));

    let print_terminal_routes = Router::new()
        .route("/next", get(handlers::print_jobs::next_job))
        .route("/{id}/printed", post(handlers::print_jobs::mark_printed))
        .route("/{id}/error", post(handlers::print_jobs::mark_error))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            terminal_guard,
        ));

    let print_panel_routes = Router::new()
        .route("/", get(handlers::print_jobs::list_jobs))
        .route("/{id}/retry", post(handlers::print_jobs::retry_job))
        .route("/{id}/cancel", post(handlers::print_jobs::cancel_job))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            panel_guard,
        ));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/payments", payment_routes)
        .nest("/api/sales", sale_routes)
        .nest("/api/terminals", terminal_public_routes.merge(terminal_panel_routes))
        .nest("/api/print-jobs", print_terminal_routes.merge(print_panel_routes))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
}
