//src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use pdv_backend::{
    config::{AppState, Config},
    routes::build_router,
    services::payment_intent_service::spawn_expiry_sweeper,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar
    let config = Config::from_env()?;
    let app_state = AppState::new(config).await?;

    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    if let Some(every) = app_state.config.intent_sweep_interval {
        spawn_expiry_sweeper(app_state.payment_intent_service.clone(), every);
        tracing::info!(every_secs = every.as_secs(), "Expirador de intenções iniciado");
    }

    let listener = TcpListener::bind(&app_state.config.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    let app = build_router(app_state);
    axum::serve(listener, app).await?;

    Ok(())
}
