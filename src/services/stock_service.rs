// src/services/stock_service.rs

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{common::error::AppError, db::ProductRepository, models::payment::DraftLine};

/// Primitiva de débito de estoque. Nunca abre transação própria:
/// roda na transação (ou savepoint) do chamador, que desfaz tudo se der erro.
#[derive(Clone)]
pub struct StockService {
    product_repo: ProductRepository,
}

impl StockService {
    pub fn new(product_repo: ProductRepository) -> Self {
        Self { product_repo }
    }

    /// Debita todas as linhas ou falha na primeira sem saldo.
    /// As linhas são processadas em ordem de `product_id` para que vendas
    /// concorrentes travem as linhas de produto sempre na mesma ordem.
    pub async fn debit_lines(
        &self,
        conn: &mut PgConnection,
        merchant_id: Uuid,
        allow_negative_stock: bool,
        lines: &[DraftLine],
    ) -> Result<(), AppError> {
        let mut ordered: Vec<&DraftLine> = lines.iter().collect();
        ordered.sort_by_key(|line| line.product_id);

        for line in ordered {
            let debited = self
                .product_repo
                .try_debit(&mut *conn, merchant_id, line.product_id, line.quantity, allow_negative_stock)
                .await?;

            if !debited {
                return Err(AppError::InsufficientStock {
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                });
            }
        }

        Ok(())
    }
}
