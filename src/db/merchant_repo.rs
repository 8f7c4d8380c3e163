// src/db/merchant_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::merchant::Merchant};

#[derive(Clone, Default)]
pub struct MerchantRepository;

impl MerchantRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, merchant_id: Uuid) -> Result<Option<Merchant>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let merchant = sqlx::query_as::<_, Merchant>("SELECT * FROM merchants WHERE id = $1")
            .bind(merchant_id)
            .fetch_optional(executor)
            .await?;
        Ok(merchant)
    }
}
