// src/services/sale_service.rs

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    common::{
        error::{AppError, Resource},
        money,
    },
    db::{MerchantRepository, PrintJobRepository, ProductRepository, SaleRepository, sale_repo::NewSale},
    models::{
        payment::PaymentType,
        product::CartItem,
        sale::{SaleDetail, SaleStatus},
    },
    services::{pricing, print_job_service::PrintJobService, stock_service::StockService},
};

pub struct CashSaleCommand {
    pub merchant_id: Uuid,
    pub terminal_id: Option<Uuid>,
    pub items: Vec<CartItem>,
    pub cash_received: Decimal,
}

#[derive(Clone)]
pub struct SaleService {
    sale_repo: SaleRepository,
    product_repo: ProductRepository,
    merchant_repo: MerchantRepository,
    print_job_repo: PrintJobRepository,
    stock_service: StockService,
    print_job_service: PrintJobService,
    pool: PgPool,
}

impl SaleService {
    pub fn new(
        sale_repo: SaleRepository,
        product_repo: ProductRepository,
        merchant_repo: MerchantRepository,
        print_job_repo: PrintJobRepository,
        stock_service: StockService,
        print_job_service: PrintJobService,
        pool: PgPool,
    ) -> Self {
        Self {
            sale_repo,
            product_repo,
            merchant_repo,
            print_job_repo,
            stock_service,
            print_job_service,
            pool,
        }
    }

    /// Venda em dinheiro: estoque, venda e itens numa transação só.
    /// A impressão é criada depois do commit; se falhar, a venda continua valendo
    /// e o cupom é gerado na próxima leitura da venda.
    pub async fn create_cash_sale(&self, cmd: CashSaleCommand) -> Result<SaleDetail, AppError> {
        let cart = pricing::merge_cart(&cmd.items)?;
        let received_cents = money::to_cents(cmd.cash_received)
            .filter(|c| *c >= 0)
            .ok_or_else(|| AppError::InvalidInput("valor recebido inválido".into()))?;

        let mut tx = self.pool.begin().await?;

        let merchant = self
            .merchant_repo
            .find_by_id(&mut *tx, cmd.merchant_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::Merchant))?;

        let product_ids: Vec<Uuid> = cart.iter().map(|i| i.product_id).collect();
        let products = self.product_repo.find_by_ids(&mut *tx, cmd.merchant_id, &product_ids).await?;
        let draft = pricing::build_draft(&cart, &products, merchant.allow_negative_stock)?;

        if received_cents < draft.total_cents {
            return Err(AppError::InsufficientCash {
                total_cents: draft.total_cents,
                received_cents,
            });
        }

        // 1. Estoque (se faltar, o drop da transação desfaz tudo)
        self.stock_service
            .debit_lines(&mut tx, merchant.id, merchant.allow_negative_stock, &draft.lines)
            .await?;

        // 2. Venda + itens
        let sale = self
            .sale_repo
            .create_sale(
                &mut *tx,
                NewSale {
                    merchant_id: merchant.id,
                    terminal_id: cmd.terminal_id,
                    total_cents: draft.total_cents,
                    payment_type: PaymentType::Cash,
                    status: SaleStatus::Paid,
                    cash_received_cents: Some(received_cents),
                    change_cents: Some(received_cents - draft.total_cents),
                    provider: None,
                    provider_ref: None,
                    authorization_code: None,
                },
            )
            .await?;
        let items = self.sale_repo.add_items(&mut *tx, sale.id, &draft.lines).await?;

        // 3. Salva
        tx.commit().await?;

        info!(sale_id = %sale.id, total_cents = sale.total_cents, "Venda em dinheiro registrada");

        let print_job_id = match self.print_job_service.enqueue(merchant.id, sale.id).await {
            Ok(job) => Some(job.id),
            Err(e) => {
                warn!(sale_id = %sale.id, "Falha ao enfileirar impressão: {}", e);
                None
            }
        };

        Ok(SaleDetail { sale, items, print_job_id })
    }

    /// Lê a venda. Vendas pagas sem impressão (falha pós-commit) ganham uma agora.
    pub async fn get_sale(&self, merchant_id: Uuid, sale_id: Uuid) -> Result<SaleDetail, AppError> {
        let sale = self
            .sale_repo
            .find_by_id(&self.pool, merchant_id, sale_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::Sale))?;
        let items = self.sale_repo.list_items(&self.pool, sale.id).await?;

        let mut print_job_id = self
            .print_job_repo
            .find_by_sale(&self.pool, merchant_id, sale.id)
            .await?
            .map(|job| job.id);

        if print_job_id.is_none() && sale.status == SaleStatus::Paid {
            match self.print_job_service.enqueue(merchant_id, sale.id).await {
                Ok(job) => print_job_id = Some(job.id),
                Err(e) => warn!(sale_id = %sale.id, "Impressão ainda indisponível: {}", e),
            }
        }

        Ok(SaleDetail { sale, items, print_job_id })
    }
}
