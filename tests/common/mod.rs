//! Infraestrutura compartilhada dos testes de integração.
//!
//! Os testes que tocam o banco exigem um Postgres descartável em `TEST_DATABASE_URL`
//! e ficam marcados com `#[ignore]`.
//!
//! Run with: TEST_DATABASE_URL=postgres://... cargo test -- --ignored

#![allow(dead_code)]

use pdv_backend::config::{AppState, Config};
use rust_decimal::Decimal;
use sqlx::{PgPool, postgres::PgPoolOptions};
use uuid::Uuid;

pub const JWT_SECRET: &str = "segredo-de-teste";

pub fn test_config(database_url: &str) -> Config {
    test_config_with(database_url, &[])
}

/// Como `test_config`, com variáveis extras (ex.: `KEY_ROTATION_GRACE_SECS`).
pub fn test_config_with(database_url: &str, overrides: &[(&str, &str)]) -> Config {
    let database_url = database_url.to_string();
    Config::from_lookup(|key| {
        if let Some((_, value)) = overrides.iter().find(|(name, _)| *name == key) {
            return Some(value.to_string());
        }
        match key {
            "DATABASE_URL" => Some(database_url.clone()),
            "JWT_SECRET" => Some(JWT_SECRET.to_string()),
            "DB_MAX_CONNECTIONS" => Some("10".to_string()),
            "INTENT_SWEEP_INTERVAL_SECS" => Some("0".to_string()),
            _ => None,
        }
    })
    .expect("configuração de teste inválida")
}

/// Estado ligado ao banco de teste, já com as migrações aplicadas.
pub async fn test_state() -> AppState {
    test_state_with(&[]).await
}

pub async fn test_state_with(overrides: &[(&str, &str)]) -> AppState {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL deve ser definida");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("Falha ao conectar ao banco de teste");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Falha ao rodar as migrações");

    AppState::from_pool(pool, test_config_with(&url, overrides))
}

/// Cada teste cria o próprio lojista, então os testes não se enxergam.
pub async fn seed_merchant(pool: &PgPool) -> Uuid {
    sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO merchants (name, display_name, receipt_footer) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(format!("Loja {}", Uuid::new_v4()))
    .bind("Padaria Teste")
    .bind("Obrigado pela preferência!")
    .fetch_one(pool)
    .await
    .expect("Falha ao criar lojista")
}

pub async fn seed_product(pool: &PgPool, merchant_id: Uuid, name: &str, price: Decimal, stock: i32) -> Uuid {
    sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO products (merchant_id, name, price, stock) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(merchant_id)
    .bind(name)
    .bind(price)
    .bind(stock)
    .fetch_one(pool)
    .await
    .expect("Falha ao criar produto")
}

pub async fn stock_of(pool: &PgPool, product_id: Uuid) -> i32 {
    sqlx::query_scalar::<_, i32>("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("Falha ao ler estoque")
}

pub async fn set_merchant_flag(pool: &PgPool, merchant_id: Uuid, column: &str, value: bool) {
    let sql = match column {
        "suspended" => "UPDATE merchants SET suspended = $2 WHERE id = $1",
        "login_blocked" => "UPDATE merchants SET login_blocked = $2 WHERE id = $1",
        "allow_negative_stock" => "UPDATE merchants SET allow_negative_stock = $2 WHERE id = $1",
        other => panic!("coluna desconhecida: {other}"),
    };
    sqlx::query(sql)
        .bind(merchant_id)
        .bind(value)
        .execute(pool)
        .await
        .expect("Falha ao atualizar lojista");
}

pub fn device_id() -> String {
    format!("SN-{}", Uuid::new_v4().simple())
}
