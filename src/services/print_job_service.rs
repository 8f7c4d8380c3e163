// src/services/print_job_service.rs

use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    common::error::{AppError, Resource},
    db::{MerchantRepository, PrintJobRepository, SaleRepository},
    models::{
        merchant::Merchant,
        print_job::{AckOutcome, PrintJob, PrintJobStatus, ReceiptPayload},
        sale::Sale,
    },
};

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;

/// O que fazer com um ack recebido.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    Unchanged,
    MarkPrinted,
    MarkError,
}

/// Regras do ack, sem banco.
/// `terminal_id` é quem está confirmando; `force` libera o ack de outro terminal
/// e a confirmação manual de uma impressão que tinha dado erro.
pub fn decide_ack(
    job: &PrintJob,
    outcome: AckOutcome,
    terminal_id: Option<Uuid>,
    force: bool,
) -> Result<AckDecision, AppError> {
    if job.status == PrintJobStatus::Canceled {
        return Ok(AckDecision::Unchanged);
    }

    if let (Some(owner), Some(caller)) = (job.terminal_id, terminal_id) {
        if owner != caller && !force {
            return Err(AppError::PrintJobLocked { terminal_id: Some(owner) });
        }
    }

    match (job.status, outcome) {
        (PrintJobStatus::Printed, AckOutcome::Printed) => Ok(AckDecision::Unchanged),
        (PrintJobStatus::Error, AckOutcome::Error) => Ok(AckDecision::Unchanged),
        (PrintJobStatus::Printing, AckOutcome::Printed) => Ok(AckDecision::MarkPrinted),
        (PrintJobStatus::Printing, AckOutcome::Error) => Ok(AckDecision::MarkError),
        (PrintJobStatus::Error, AckOutcome::Printed) if force => Ok(AckDecision::MarkPrinted),
        (status, _) => Err(AppError::PrintJobNotClaimed(status)),
    }
}

pub struct AcknowledgeCommand {
    pub merchant_id: Uuid,
    pub job_id: Uuid,
    pub outcome: AckOutcome,
    pub terminal_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub force: bool,
}

#[derive(Clone)]
pub struct PrintJobService {
    repo: PrintJobRepository,
    sale_repo: SaleRepository,
    merchant_repo: MerchantRepository,
    pool: PgPool,
}

impl PrintJobService {
    pub fn new(
        repo: PrintJobRepository,
        sale_repo: SaleRepository,
        merchant_repo: MerchantRepository,
        pool: PgPool,
    ) -> Self {
        Self { repo, sale_repo, merchant_repo, pool }
    }

    /// Garante a impressão da venda dentro da transação do chamador.
    /// Se já existir, devolve a existente (uma impressão por venda).
    pub async fn ensure_for_sale(
        &self,
        conn: &mut PgConnection,
        merchant: &Merchant,
        sale: &Sale,
    ) -> Result<PrintJob, AppError> {
        if let Some(job) = self.repo.find_by_sale(&mut *conn, merchant.id, sale.id).await? {
            return Ok(job);
        }

        let items = self.sale_repo.list_items(&mut *conn, sale.id).await?;
        let payload = ReceiptPayload::snapshot(merchant, sale, &items);

        match self.repo.insert(&mut *conn, merchant.id, sale.id, &payload).await? {
            Some(job) => {
                info!(print_job_id = %job.id, sale_id = %sale.id, "Impressão enfileirada");
                Ok(job)
            }
            // Outra transação criou no meio tempo
            None => self
                .repo
                .find_by_sale(&mut *conn, merchant.id, sale.id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("impressão da venda {} sumiu após conflito", sale.id).into()),
        }
    }

    /// Versão com transação própria (venda em dinheiro e criação tardia).
    pub async fn enqueue(&self, merchant_id: Uuid, sale_id: Uuid) -> Result<PrintJob, AppError> {
        let mut tx = self.pool.begin().await?;

        let merchant = self
            .merchant_repo
            .find_by_id(&mut *tx, merchant_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::Merchant))?;
        let sale = self
            .sale_repo
            .find_by_id(&mut *tx, merchant_id, sale_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::Sale))?;

        let job = self.ensure_for_sale(&mut tx, &merchant, &sale).await?;

        tx.commit().await?;
        Ok(job)
    }

    /// Reserva a próxima impressão do lojista para o terminal. `None` se a fila estiver vazia.
    pub async fn dequeue_next(&self, merchant_id: Uuid, terminal_id: Option<Uuid>) -> Result<Option<PrintJob>, AppError> {
        let job = self.repo.claim_next(&self.pool, merchant_id, terminal_id).await?;

        if let Some(job) = &job {
            info!(
                print_job_id = %job.id,
                terminal_id = ?terminal_id,
                attempts = job.attempts,
                "Impressão reservada"
            );
        }
        Ok(job)
    }

    pub async fn acknowledge(&self, cmd: AcknowledgeCommand) -> Result<PrintJob, AppError> {
        let mut tx = self.pool.begin().await?;

        let job = self
            .repo
            .find_for_update(&mut *tx, cmd.merchant_id, cmd.job_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::PrintJob))?;

        let updated = match decide_ack(&job, cmd.outcome, cmd.terminal_id, cmd.force)? {
            AckDecision::Unchanged => job,
            AckDecision::MarkPrinted => self.repo.mark_printed(&mut *tx, job.id).await?,
            AckDecision::MarkError => {
                let job = self.repo.mark_error(&mut *tx, job.id, cmd.error_message.as_deref()).await?;
                warn!(print_job_id = %job.id, error = ?job.error_message, "Falha de impressão reportada");
                job
            }
        };

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn list(
        &self,
        merchant_id: Uuid,
        status: Option<PrintJobStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<PrintJob>, AppError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        self.repo.list(&self.pool, merchant_id, status, limit).await
    }

    /// Reimpressão: ERROR ou CANCELED voltam para a fila.
    pub async fn retry(&self, merchant_id: Uuid, job_id: Uuid) -> Result<PrintJob, AppError> {
        let mut tx = self.pool.begin().await?;

        let job = self
            .repo
            .find_for_update(&mut *tx, merchant_id, job_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::PrintJob))?;

        if !matches!(job.status, PrintJobStatus::Error | PrintJobStatus::Canceled) {
            return Err(AppError::InvalidStatusTransition(format!(
                "{} -> PENDING",
                job.status.as_str()
            )));
        }

        let job = self.repo.requeue(&mut *tx, job.id).await?;
        tx.commit().await?;

        info!(print_job_id = %job.id, "Impressão devolvida para a fila");
        Ok(job)
    }

    pub async fn cancel(&self, merchant_id: Uuid, job_id: Uuid) -> Result<PrintJob, AppError> {
        let mut tx = self.pool.begin().await?;

        let job = self
            .repo
            .find_for_update(&mut *tx, merchant_id, job_id)
            .await?
            .ok_or(AppError::ResourceNotFound(Resource::PrintJob))?;

        let job = match job.status {
            PrintJobStatus::Canceled => job,
            PrintJobStatus::Pending | PrintJobStatus::Error => self.repo.cancel(&mut *tx, job.id).await?,
            status => {
                return Err(AppError::InvalidStatusTransition(format!(
                    "{} -> CANCELED",
                    status.as_str()
                )));
            }
        };

        tx.commit().await?;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payment::PaymentType;
    use chrono::Utc;
    use sqlx::types::Json;

    fn job(status: PrintJobStatus, terminal_id: Option<Uuid>) -> PrintJob {
        PrintJob {
            id: Uuid::new_v4(),
            merchant_id: Uuid::nil(),
            sale_id: Uuid::new_v4(),
            status,
            payload: Json(ReceiptPayload {
                merchant_name: "Padaria".into(),
                merchant_document: None,
                merchant_address: None,
                sale_id: Uuid::nil(),
                issued_at: Utc::now(),
                payment_type: PaymentType::Pix,
                lines: vec![],
                total_cents: 0,
                cash_received_cents: None,
                change_cents: None,
                authorization_code: None,
                footer: None,
            }),
            terminal_id,
            error_message: None,
            attempts: 1,
            claimed_at: None,
            printed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn claimed_job_can_be_printed_or_failed_by_its_terminal() {
        let t = Uuid::new_v4();
        let j = job(PrintJobStatus::Printing, Some(t));

        assert_eq!(decide_ack(&j, AckOutcome::Printed, Some(t), false).unwrap(), AckDecision::MarkPrinted);
        assert_eq!(decide_ack(&j, AckOutcome::Error, Some(t), false).unwrap(), AckDecision::MarkError);
    }

    #[test]
    fn other_terminal_is_locked_out_unless_forced() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let j = job(PrintJobStatus::Printing, Some(owner));

        let locked = decide_ack(&j, AckOutcome::Printed, Some(other), false);
        assert!(matches!(locked, Err(AppError::PrintJobLocked { terminal_id: Some(t) }) if t == owner));

        assert_eq!(decide_ack(&j, AckOutcome::Printed, Some(other), true).unwrap(), AckDecision::MarkPrinted);
    }

    #[test]
    fn repeated_acks_are_idempotent() {
        let t = Uuid::new_v4();
        assert_eq!(
            decide_ack(&job(PrintJobStatus::Printed, Some(t)), AckOutcome::Printed, Some(t), false).unwrap(),
            AckDecision::Unchanged
        );
        assert_eq!(
            decide_ack(&job(PrintJobStatus::Error, Some(t)), AckOutcome::Error, Some(t), false).unwrap(),
            AckDecision::Unchanged
        );
    }

    #[test]
    fn canceled_job_ignores_acks() {
        let j = job(PrintJobStatus::Canceled, Some(Uuid::new_v4()));
        assert_eq!(decide_ack(&j, AckOutcome::Printed, Some(Uuid::new_v4()), false).unwrap(), AckDecision::Unchanged);
    }

    #[test]
    fn unclaimed_job_cannot_be_acknowledged() {
        let j = job(PrintJobStatus::Pending, None);
        assert!(matches!(
            decide_ack(&j, AckOutcome::Printed, Some(Uuid::new_v4()), false),
            Err(AppError::PrintJobNotClaimed(PrintJobStatus::Pending))
        ));
    }

    #[test]
    fn errored_job_needs_force_to_become_printed() {
        let t = Uuid::new_v4();
        let j = job(PrintJobStatus::Error, Some(t));

        assert!(matches!(
            decide_ack(&j, AckOutcome::Printed, Some(t), false),
            Err(AppError::PrintJobNotClaimed(PrintJobStatus::Error))
        ));
        assert_eq!(decide_ack(&j, AckOutcome::Printed, Some(t), true).unwrap(), AckDecision::MarkPrinted);
    }

    #[test]
    fn printed_job_cannot_turn_into_error() {
        let t = Uuid::new_v4();
        let j = job(PrintJobStatus::Printed, Some(t));
        assert!(decide_ack(&j, AckOutcome::Error, Some(t), false).is_err());
    }
}
