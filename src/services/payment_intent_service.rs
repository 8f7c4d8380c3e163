// src/services/payment_intent_service.rs

use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Acquire, PgConnection, PgPool};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    common::{
        error::{AppError, Resource},
        money,
    },
    db::{
        MerchantRepository, PaymentIntentRepository, ProductRepository, SaleRepository,
        payment_repo::{ApprovedIntent, NewIntent, NewTransaction},
        sale_repo::NewSale,
    },
    models::{
        payment::{PaymentIntent, PaymentIntentStatus, PaymentTransaction, PaymentType, ProviderData},
        product::CartItem,
        sale::SaleStatus,
    },
    services::{pricing, print_job_service::PrintJobService, stock_service::StockService},
};

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;
const SWEEP_BATCH: i64 = 100;
const EXPIRY_PROVIDER: &str = "SYSTEM";

pub struct CreateIntentCommand {
    pub merchant_id: Uuid,
    pub terminal_id: Option<Uuid>,
    pub items: Vec<CartItem>,
    pub payment_type: PaymentType,
    pub amount: Option<Decimal>,
    pub idempotency_key: Option<String>,
}

pub struct ConfirmIntentCommand {
    pub merchant_id: Uuid,
    pub intent_id: Uuid,
    pub terminal_id: Option<Uuid>,
    pub provider: String,
    pub provider_ref: Option<String>,
    pub data: ProviderData,
}

pub struct FailIntentCommand {
    pub merchant_id: Uuid,
    pub intent_id: Uuid,
    pub terminal_id: Option<Uuid>,
    pub status: PaymentIntentStatus,
    pub provider: String,
    pub provider_ref: Option<String>,
    pub reason: Option<String>,
    pub data: ProviderData,
}

/// Um terminal só mexe em intenções sem terminal ou vinculadas a ele mesmo.
/// Chamadas do painel (`caller = None`) passam.
pub fn ensure_terminal_may_operate(intent: &PaymentIntent, caller: Option<Uuid>) -> Result<(), AppError> {
    match (intent.terminal_id, caller) {
        (Some(bound), Some(caller)) if bound != caller => Err(AppError::TerminalMismatch),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct PaymentIntentService {
    intent_repo: PaymentIntentRepository,
    product_repo: ProductRepository,
    merchant_repo: MerchantRepository,
    sale_repo: SaleRepository,
    stock_service: StockService,
    print_job_service: PrintJobService,
    pool: PgPool,
    intent_ttl: chrono::Duration,
}

impl PaymentIntentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        intent_repo: PaymentIntentRepository,
        product_repo: ProductRepository,
        merchant_repo: MerchantRepository,
        sale_repo: SaleRepository,
        stock_service: StockService,
        print_job_service: PrintJobService,
        pool: PgPool,
        intent_ttl: chrono::Duration,
    ) -> Self {
        Self {
            intent_repo,
            product_repo,
            merchant_repo,
            sale_repo,
            stock_service,
            print_job_service,
            pool,
            intent_ttl,
        }
    }

    // ---
    // CRIAÇÃO
    // ---

    pub async fn create_intent(&self, cmd: CreateIntentCommand) -> Result<PaymentIntent, AppError> {
        if cmd.payment_type == PaymentType::Cash {
            return Err(AppError::CashNotSupported);
        }

        // Replay barato antes de precificar de novo
        if let Some(key) = cmd.idempotency_key.as_deref() {
            if let Some(existing) = self
                .intent_repo
                .find_by_idempotency_key(&self.pool, cmd.merchant_id, key)
                .await?
            {
                debug!(intent_id = %existing.id, "Intenção devolvida pela chave de idempotência");
                return Ok(existing);
            }
        }

        let cart = pricing::merge_cart(&cmd.items)?;
        let client_cents = cmd
            .amount
            .map(|amount| {
                money::to_cents(amount).ok_or_else(|| AppError::InvalidInput("valor inválido".into()))
            })
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        let merchant = self
            .merchant_repo
            .find_by_id(&mut *tx, cmd.merchant_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::Merchant))?;

        let product_ids: Vec<Uuid> = cart.iter().map(|i| i.product_id).collect();
        let products = self.product_repo.find_by_ids(&mut *tx, merchant.id, &product_ids).await?;
        let draft = pricing::build_draft(&cart, &products, merchant.allow_negative_stock)?;
        if draft.total_cents <= 0 {
            return Err(AppError::InvalidInput("o total da venda deve ser maior que zero".into()));
        }

        if let Some(received_cents) = client_cents {
            if received_cents != draft.total_cents {
                return Err(AppError::AmountMismatch {
                    expected_cents: draft.total_cents,
                    received_cents,
                });
            }
        }

        let inserted = self
            .intent_repo
            .insert(
                &mut *tx,
                NewIntent {
                    merchant_id: merchant.id,
                    terminal_id: cmd.terminal_id,
                    idempotency_key: cmd.idempotency_key.as_deref(),
                    payment_type: cmd.payment_type,
                    amount_cents: draft.total_cents,
                    sale_draft: &draft,
                },
            )
            .await?;

        match inserted {
            Some(intent) => {
                tx.commit().await?;
                info!(
                    intent_id = %intent.id,
                    amount_cents = intent.amount_cents,
                    payment_type = ?intent.payment_type,
                    "Intenção de pagamento criada"
                );
                Ok(intent)
            }
            None => {
                // Corrida na mesma chave: a transação abortou, lê o vencedor fora dela
                tx.rollback().await?;
                let key = cmd.idempotency_key.as_deref().unwrap_or_default();
                self.intent_repo
                    .find_by_idempotency_key(&self.pool, merchant.id, key)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("intenção com chave '{}' não encontrada após conflito", key).into())
            }
        }
    }

    // ---
    // CONFIRMAÇÃO
    // ---

    /// Aprova a intenção: debita estoque, cria venda, itens, transação e impressão
    /// numa transação só. Reenvios de uma intenção já aprovada devolvem o mesmo resultado.
    pub async fn confirm_intent(&self, cmd: ConfirmIntentCommand) -> Result<PaymentIntent, AppError> {
        let data = cmd.data.clone().sanitized();
        let mut tx = self.pool.begin().await?;

        // 1. Trava a intenção antes de olhar o status
        let intent = self
            .intent_repo
            .find_for_update(&mut *tx, cmd.merchant_id, cmd.intent_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::PaymentIntent))?;

        ensure_terminal_may_operate(&intent, cmd.terminal_id)?;

        match intent.status {
            PaymentIntentStatus::Pending => {}
            PaymentIntentStatus::Approved => {
                let intent = self.replay_approved(&mut tx, intent, &cmd, &data).await?;
                tx.commit().await?;
                return Ok(intent);
            }
            _ => return Err(AppError::IntentNotPending(Box::new(intent))),
        }

        let merchant = self
            .merchant_repo
            .find_by_id(&mut *tx, intent.merchant_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::Merchant))?;
        let draft = intent.sale_draft.0.clone();

        // 2. Estoque num savepoint: se faltar, só o débito é desfeito
        let shortage = {
            let mut savepoint = tx.begin().await?;
            match self
                .stock_service
                .debit_lines(&mut savepoint, merchant.id, merchant.allow_negative_stock, &draft.lines)
                .await
            {
                Ok(()) => {
                    savepoint.commit().await?;
                    None
                }
                Err(AppError::InsufficientStock { product_id, product_name }) => {
                    savepoint.rollback().await?;
                    Some((product_id, product_name))
                }
                Err(e) => return Err(e),
            }
        };

        if let Some((product_id, product_name)) = shortage {
            let reason = format!("Estoque insuficiente para {}", product_name);
            let failed = self
                .intent_repo
                .mark_failed(
                    &mut *tx,
                    intent.id,
                    PaymentIntentStatus::Error,
                    &cmd.provider,
                    cmd.provider_ref.as_deref(),
                    Some(&reason),
                )
                .await?;
            self.intent_repo
                .record_transaction(
                    &mut *tx,
                    NewTransaction {
                        intent_id: intent.id,
                        merchant_id: intent.merchant_id,
                        status: PaymentIntentStatus::Error,
                        provider: &cmd.provider,
                        provider_ref: cmd.provider_ref.as_deref(),
                        data: &data,
                        message: Some(&reason),
                    },
                )
                .await?;
            tx.commit().await?;

            warn!(intent_id = %intent.id, product_id = %product_id, "Confirmação sem estoque, intenção em ERROR");
            return Err(AppError::IntentStockUnavailable {
                product_id,
                product_name,
                intent: Box::new(failed),
            });
        }

        // 3. Venda e itens a partir do rascunho congelado
        let sale = self
            .sale_repo
            .create_sale(
                &mut *tx,
                NewSale {
                    merchant_id: merchant.id,
                    terminal_id: intent.terminal_id.or(cmd.terminal_id),
                    total_cents: intent.amount_cents,
                    payment_type: intent.payment_type,
                    status: SaleStatus::Paid,
                    cash_received_cents: None,
                    change_cents: None,
                    provider: Some(&cmd.provider),
                    provider_ref: cmd.provider_ref.as_deref(),
                    authorization_code: data.authorization_code.as_deref(),
                },
            )
            .await?;
        self.sale_repo.add_items(&mut *tx, sale.id, &draft.lines).await?;

        // 4. Auditoria
        self.intent_repo
            .record_transaction(
                &mut *tx,
                NewTransaction {
                    intent_id: intent.id,
                    merchant_id: intent.merchant_id,
                    status: PaymentIntentStatus::Approved,
                    provider: &cmd.provider,
                    provider_ref: cmd.provider_ref.as_deref(),
                    data: &data,
                    message: None,
                },
            )
            .await?;

        // 5. Impressão
        let job = self.print_job_service.ensure_for_sale(&mut tx, &merchant, &sale).await?;

        // 6. Fecha a intenção
        let approved = self
            .intent_repo
            .mark_approved(
                &mut *tx,
                ApprovedIntent {
                    intent_id: intent.id,
                    provider: &cmd.provider,
                    provider_ref: cmd.provider_ref.as_deref(),
                    sale_id: sale.id,
                    print_job_id: job.id,
                    terminal_id: cmd.terminal_id,
                },
            )
            .await?;

        tx.commit().await?;

        info!(
            intent_id = %approved.id,
            sale_id = %sale.id,
            print_job_id = %job.id,
            "Intenção aprovada"
        );
        Ok(approved)
    }

    /// Reenvio de confirmação: completa dados do adquirente que faltavam
    /// e recria a impressão se ela tiver se perdido. Não debita nada.
    async fn replay_approved(
        &self,
        conn: &mut PgConnection,
        intent: PaymentIntent,
        cmd: &ConfirmIntentCommand,
        data: &ProviderData,
    ) -> Result<PaymentIntent, AppError> {
        let sale_id = intent
            .sale_id
            .ok_or_else(|| anyhow::anyhow!("intenção {} aprovada sem venda", intent.id))?;

        let sale = self
            .sale_repo
            .backfill_authorization(
                &mut *conn,
                sale_id,
                &cmd.provider,
                cmd.provider_ref.as_deref(),
                data.authorization_code.as_deref(),
            )
            .await?;

        let merchant = self
            .merchant_repo
            .find_by_id(&mut *conn, intent.merchant_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::Merchant))?;
        let job = self.print_job_service.ensure_for_sale(&mut *conn, &merchant, &sale).await?;

        if intent.print_job_id == Some(job.id) {
            debug!(intent_id = %intent.id, "Confirmação repetida, nada a fazer");
            return Ok(intent);
        }

        self.intent_repo.set_print_job(&mut *conn, intent.id, job.id).await
    }

    // ---
    // FALHA
    // ---

    pub async fn fail_intent(&self, cmd: FailIntentCommand) -> Result<PaymentIntent, AppError> {
        if !cmd.status.is_failure() {
            return Err(AppError::InvalidStatusTransition(format!(
                "PENDING -> {}",
                cmd.status.as_str()
            )));
        }
        let data = cmd.data.clone().sanitized();

        let mut tx = self.pool.begin().await?;

        let intent = self
            .intent_repo
            .find_for_update(&mut *tx, cmd.merchant_id, cmd.intent_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::PaymentIntent))?;

        ensure_terminal_may_operate(&intent, cmd.terminal_id)?;

        match intent.status {
            PaymentIntentStatus::Pending => {}
            PaymentIntentStatus::Approved => return Err(AppError::IntentAlreadyApproved(Box::new(intent))),
            // Já encerrada sem aprovação: devolve como está
            _ => return Ok(intent),
        }

        let reason = cmd.reason.as_deref().or(data.message.as_deref());
        let failed = self
            .intent_repo
            .mark_failed(
                &mut *tx,
                intent.id,
                cmd.status,
                &cmd.provider,
                cmd.provider_ref.as_deref(),
                reason,
            )
            .await?;

        self.intent_repo
            .record_transaction(
                &mut *tx,
                NewTransaction {
                    intent_id: intent.id,
                    merchant_id: intent.merchant_id,
                    status: cmd.status,
                    provider: &cmd.provider,
                    provider_ref: cmd.provider_ref.as_deref(),
                    data: &data,
                    message: reason,
                },
            )
            .await?;

        tx.commit().await?;

        info!(intent_id = %failed.id, status = failed.status.as_str(), "Intenção encerrada sem aprovação");
        Ok(failed)
    }

    // ---
    // LEITURA
    // ---

    pub async fn get_intent(
        &self,
        merchant_id: Uuid,
        intent_id: Uuid,
        terminal_id: Option<Uuid>,
    ) -> Result<PaymentIntent, AppError> {
        let intent = self
            .intent_repo
            .find_by_id(&self.pool, merchant_id, intent_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::PaymentIntent))?;

        ensure_terminal_may_operate(&intent, terminal_id)?;
        Ok(intent)
    }

    pub async fn list_intents(
        &self,
        merchant_id: Uuid,
        status: Option<PaymentIntentStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<PaymentIntent>, AppError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        self.intent_repo.list(&self.pool, merchant_id, status, limit).await
    }

    pub async fn list_transactions(&self, merchant_id: Uuid, intent_id: Uuid) -> Result<Vec<PaymentTransaction>, AppError> {
        let intent = self
            .intent_repo
            .find_by_id(&self.pool, merchant_id, intent_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::PaymentIntent))?;
        self.intent_repo.list_transactions(&self.pool, intent.id).await
    }

    // ---
    // EXPIRAÇÃO
    // ---

    /// Expira as intenções PENDING mais velhas que o TTL. Retorna quantas expirou.
    pub async fn expire_stale(&self) -> Result<usize, AppError> {
        let cutoff = Utc::now() - self.intent_ttl;
        let stale = self
            .intent_repo
            .find_stale_pending(&self.pool, cutoff, SWEEP_BATCH)
            .await?;

        let mut expired = 0;
        for (merchant_id, intent_id) in stale {
            let result = self
                .fail_intent(FailIntentCommand {
                    merchant_id,
                    intent_id,
                    terminal_id: None,
                    status: PaymentIntentStatus::Expired,
                    provider: EXPIRY_PROVIDER.to_string(),
                    provider_ref: None,
                    reason: Some("Intenção expirada".to_string()),
                    data: ProviderData::default(),
                })
                .await;

            match result {
                Ok(intent) if intent.status == PaymentIntentStatus::Expired => expired += 1,
                Ok(_) => {}
                // Confirmada no meio tempo
                Err(AppError::IntentAlreadyApproved(_)) => {}
                Err(e) => warn!(intent_id = %intent_id, "Falha ao expirar intenção: {}", e),
            }
        }

        Ok(expired)
    }
}

/// Roda o expirador em segundo plano a cada `every`.
pub fn spawn_expiry_sweeper(service: PaymentIntentService, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match service.expire_stale().await {
                Ok(0) => {}
                Ok(count) => info!(count, "Intenções expiradas"),
                Err(e) => error!("Falha no expirador de intenções: {}", e),
            }
        }
    })
}
