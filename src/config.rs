// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::i18n::I18nStore,
    db::{
        MerchantRepository, PairingCodeRepository, PaymentIntentRepository, PrintJobRepository,
        ProductRepository, SaleRepository, TerminalRepository,
    },
    services::{
        auth::PanelAuthService, payment_intent_service::PaymentIntentService,
        print_job_service::PrintJobService, sale_service::SaleService, stock_service::StockService,
        terminal_service::TerminalService,
    },
};

// Janela permitida para o TTL dos códigos de pareamento (5 a 10 minutos)
const MIN_CODE_TTL_SECS: i64 = 300;
const MAX_CODE_TTL_SECS: i64 = 600;

/// Configuração lida do ambiente (.env).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub pairing_code_ttl: chrono::Duration,
    pub key_rotation_grace: chrono::Duration,
    pub intent_ttl: chrono::Duration,
    /// `None` desliga o expirador de intenções.
    pub intent_sweep_interval: Option<Duration>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Monta a configuração a partir de uma função de busca (facilita testes).
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> anyhow::Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("{} deve ser definida", key))
        };

        let code_ttl_secs: i64 = parse_or(&lookup, "PAIRING_CODE_TTL_SECS", 300)?;
        let sweep_secs: u64 = parse_or(&lookup, "INTENT_SWEEP_INTERVAL_SECS", 60)?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            db_acquire_timeout: Duration::from_secs(parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 3)?),
            pairing_code_ttl: chrono::Duration::seconds(code_ttl_secs.clamp(MIN_CODE_TTL_SECS, MAX_CODE_TTL_SECS)),
            key_rotation_grace: chrono::Duration::seconds(parse_or(&lookup, "KEY_ROTATION_GRACE_SECS", 300)?),
            intent_ttl: chrono::Duration::minutes(parse_or(&lookup, "INTENT_TTL_MINUTES", 30)?),
            intent_sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} inválida: '{}'", key, raw)),
        None => Ok(default),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<Config>,
    pub i18n_store: I18nStore,
    pub panel_auth_service: PanelAuthService,
    pub terminal_service: TerminalService,
    pub payment_intent_service: PaymentIntentService,
    pub print_job_service: PrintJobService,
    pub sale_service: SaleService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_acquire_timeout)
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::from_pool(db_pool, config))
    }

    /// Monta o grafo de dependências sobre uma pool já criada.
    pub fn from_pool(db_pool: PgPool, config: Config) -> Self {
        let merchant_repo = MerchantRepository::new();
        let product_repo = ProductRepository::new();
        let sale_repo = SaleRepository::new();
        let intent_repo = PaymentIntentRepository::new();
        let terminal_repo = TerminalRepository::new();
        let code_repo = PairingCodeRepository::new();
        let print_job_repo = PrintJobRepository::new();

        let stock_service = StockService::new(product_repo.clone());
        let print_job_service = PrintJobService::new(
            print_job_repo.clone(),
            sale_repo.clone(),
            merchant_repo.clone(),
            db_pool.clone(),
        );
        let sale_service = SaleService::new(
            sale_repo.clone(),
            product_repo.clone(),
            merchant_repo.clone(),
            print_job_repo,
            stock_service.clone(),
            print_job_service.clone(),
            db_pool.clone(),
        );
        let payment_intent_service = PaymentIntentService::new(
            intent_repo,
            product_repo,
            merchant_repo.clone(),
            sale_repo,
            stock_service,
            print_job_service.clone(),
            db_pool.clone(),
            config.intent_ttl,
        );
        let terminal_service = TerminalService::new(
            terminal_repo,
            code_repo,
            merchant_repo,
            db_pool.clone(),
            config.pairing_code_ttl,
            config.key_rotation_grace,
        );
        let panel_auth_service = PanelAuthService::new(config.jwt_secret.clone());

        Self {
            db_pool,
            config: Arc::new(config),
            i18n_store: I18nStore::new(),
            panel_auth_service,
            terminal_service,
            payment_intent_service,
            print_job_service,
            sale_service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn applies_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/pdv"), ("JWT_SECRET", "s")]).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.db_acquire_timeout, Duration::from_secs(3));
        assert_eq!(config.pairing_code_ttl, chrono::Duration::seconds(300));
        assert_eq!(config.key_rotation_grace, chrono::Duration::seconds(300));
        assert_eq!(config.intent_ttl, chrono::Duration::minutes(30));
        assert_eq!(config.intent_sweep_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn requires_database_url_and_secret() {
        assert!(config_from(&[("JWT_SECRET", "s")]).is_err());
        assert!(config_from(&[("DATABASE_URL", "postgres://x"), ("JWT_SECRET", "  ")]).is_err());
    }

    #[test]
    fn clamps_code_ttl_and_disables_sweeper() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("PAIRING_CODE_TTL_SECS", "3600"),
            ("INTENT_SWEEP_INTERVAL_SECS", "0"),
        ])
        .unwrap();

        assert_eq!(config.pairing_code_ttl, chrono::Duration::seconds(600));
        assert_eq!(config.intent_sweep_interval, None);
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("DB_MAX_CONNECTIONS", "muitas"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("DB_MAX_CONNECTIONS"));
    }
}
