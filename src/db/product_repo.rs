// src/db/product_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::product::Product};

#[derive(Clone, Default)]
pub struct ProductRepository;

impl ProductRepository {
    pub fn new() -> Self {
        Self
    }

    /// Produtos do lojista para precificar o carrinho (inclusive inativos, o serviço decide).
    pub async fn find_by_ids<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
        product_ids: &[Uuid],
    ) -> Result<Vec<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE merchant_id = $1 AND id = ANY($2)",
        )
        .bind(merchant_id)
        .bind(product_ids)
        .fetch_all(executor)
        .await?;
        Ok(products)
    }

    /// Débito condicional: um único UPDATE que só passa se houver saldo
    /// (ou se o lojista permitir estoque negativo). Retorna `false` se não debitou.
    pub async fn try_debit<'e, E>(
        &self,
        executor: E,
        merchant_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        allow_negative: bool,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - $3, updated_at = NOW()
            WHERE id = $1 AND merchant_id = $2 AND ($4 OR stock >= $3)
            "#,
        )
        .bind(product_id)
        .bind(merchant_id)
        .bind(quantity)
        .bind(allow_negative)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
