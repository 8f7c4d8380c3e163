// src/db/sale_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        payment::{DraftLine, PaymentType},
        sale::{Sale, SaleItem, SaleStatus},
    },
};

/// Dados para gravar uma venda.
pub struct NewSale<'a> {
    pub merchant_id: Uuid,
    pub terminal_id: Option<Uuid>,
    pub total_cents: i64,
    pub payment_type: PaymentType,
    pub status: SaleStatus,
    pub cash_received_cents: Option<i64>,
    pub change_cents: Option<i64>,
    pub provider: Option<&'a str>,
    pub provider_ref: Option<&'a str>,
    pub authorization_code: Option<&'a str>,
}

#[derive(Clone, Default)]
pub struct SaleRepository;

impl SaleRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn create_sale<'e, E>(&self, executor: E, sale: NewSale<'_>) -> Result<Sale, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let created = sqlx::query_as::<_, Sale>(
            r#"
            INSERT INTO sales (
                merchant_id, terminal_id, total_cents, payment_type, status,
                cash_received_cents, change_cents, provider, provider_ref, authorization_code
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(sale.merchant_id)
        .bind(sale.terminal_id)
        .bind(sale.total_cents)
        .bind(sale.payment_type)
        .bind(sale.status)
        .bind(sale.cash_received_cents)
        .bind(sale.change_cents)
        .bind(sale.provider)
        .bind(sale.provider_ref)
        .bind(sale.authorization_code)
        .fetch_one(executor)
        .await?;
        Ok(created)
    }

    /// Grava todos os itens numa ida só (UNNEST), preservando a ordem do rascunho.
    pub async fn add_items<'e, E>(
        &self,
        executor: E,
        sale_id: Uuid,
        lines: &[DraftLine],
    ) -> Result<Vec<SaleItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
        let names: Vec<String> = lines.iter().map(|l| l.product_name.clone()).collect();
        let quantities: Vec<i32> = lines.iter().map(|l| l.quantity).collect();
        let unit_prices: Vec<i64> = lines.iter().map(|l| l.unit_price_cents).collect();
        let totals: Vec<i64> = lines.iter().map(|l| l.total_cents).collect();

        let mut items = sqlx::query_as::<_, SaleItem>(
            r#"
            INSERT INTO sale_items (sale_id, position, product_id, product_name, quantity, unit_price_cents, total_cents)
            SELECT $1, t.ord::int4, t.product_id, t.product_name, t.quantity, t.unit_price_cents, t.total_cents
            FROM UNNEST($2::uuid[], $3::text[], $4::int4[], $5::int8[], $6::int8[])
                WITH ORDINALITY AS t(product_id, product_name, quantity, unit_price_cents, total_cents, ord)
            RETURNING *
            "#,
        )
        .bind(sale_id)
        .bind(&product_ids)
        .bind(&names)
        .bind(&quantities)
        .bind(&unit_prices)
        .bind(&totals)
        .fetch_all(executor)
        .await?;

        // RETURNING não garante ordem
        items.sort_by_key(|item| item.position);
        Ok(items)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, merchant_id: Uuid, sale_id: Uuid) -> Result<Option<Sale>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = $1 AND merchant_id = $2")
            .bind(sale_id)
            .bind(merchant_id)
            .fetch_optional(executor)
            .await?;
        Ok(sale)
    }

    pub async fn list_items<'e, E>(&self, executor: E, sale_id: Uuid) -> Result<Vec<SaleItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT * FROM sale_items WHERE sale_id = $1 ORDER BY position",
        )
        .bind(sale_id)
        .fetch_all(executor)
        .await?;
        Ok(items)
    }

    /// Preenche dados do adquirente que faltavam (replay de confirmação). Nunca sobrescreve.
    pub async fn backfill_authorization<'e, E>(
        &self,
        executor: E,
        sale_id: Uuid,
        provider: &str,
        provider_ref: Option<&str>,
        authorization_code: Option<&str>,
    ) -> Result<Sale, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            UPDATE sales
            SET provider = COALESCE(provider, $2),
                provider_ref = COALESCE(provider_ref, $3),
                authorization_code = COALESCE(authorization_code, $4),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(sale_id)
        .bind(provider)
        .bind(provider_ref)
        .bind(authorization_code)
        .fetch_one(executor)
        .await?;
        Ok(sale)
    }
}
