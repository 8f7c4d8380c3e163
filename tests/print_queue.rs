//! Fila de impressão: reserva exclusiva e acks.
//!
//! Run with: TEST_DATABASE_URL=postgres://... cargo test --test print_queue -- --ignored

mod common;

use pdv_backend::{
    common::error::AppError,
    config::AppState,
    models::{
        print_job::{AckOutcome, PrintJobStatus},
        product::CartItem,
    },
    services::{print_job_service::AcknowledgeCommand, sale_service::CashSaleCommand},
};
use std::collections::HashSet;

use rust_decimal::Decimal;
use tokio::task::JoinSet;
use uuid::Uuid;

async fn paid_cash_sale(state: &AppState, merchant: Uuid) -> Uuid {
    let product = common::seed_product(&state.db_pool, merchant, "Café", Decimal::new(500, 2), 10).await;
    let detail = state
        .sale_service
        .create_cash_sale(CashSaleCommand {
            merchant_id: merchant,
            terminal_id: None,
            items: vec![CartItem { product_id: product, quantity: 1 }],
            cash_received: Decimal::new(1000, 2),
        })
        .await
        .unwrap();
    detail.print_job_id.expect("impressão enfileirada")
}

fn ack(merchant: Uuid, job_id: Uuid, outcome: AckOutcome, terminal_id: Uuid) -> AcknowledgeCommand {
    AcknowledgeCommand {
        merchant_id: merchant,
        job_id,
        outcome,
        terminal_id: Some(terminal_id),
        error_message: None,
        force: false,
    }
}

#[tokio::test]
#[ignore]
async fn concurrent_dequeue_hands_job_to_one_terminal() {
    let state = common::test_state().await;
    let merchant = common::seed_merchant(&state.db_pool).await;
    let job_id = paid_cash_sale(&state, merchant).await;

    let a = state.terminal_service.create_terminal(merchant, "Caixa A").await.unwrap().terminal;
    let b = state.terminal_service.create_terminal(merchant, "Caixa B").await.unwrap().terminal;

    let (ra, rb) = tokio::join!(
        state.print_job_service.dequeue_next(merchant, Some(a.id)),
        state.print_job_service.dequeue_next(merchant, Some(b.id)),
    );
    let claimed: Vec<_> = [ra.unwrap(), rb.unwrap()].into_iter().flatten().collect();

    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, job_id);
    assert_eq!(claimed[0].status, PrintJobStatus::Printing);
    assert_eq!(claimed[0].attempts, 1);

    // Fila vazia
    let next = state.print_job_service.dequeue_next(merchant, Some(a.id)).await.unwrap();
    assert!(next.is_none());
}

#[tokio::test]
#[ignore]
async fn other_terminal_cannot_ack_without_force() {
    let state = common::test_state().await;
    let merchant = common::seed_merchant(&state.db_pool).await;
    let job_id = paid_cash_sale(&state, merchant).await;

    let owner = state.terminal_service.create_terminal(merchant, "Dono").await.unwrap().terminal;
    let other = state.terminal_service.create_terminal(merchant, "Outro").await.unwrap().terminal;

    state.print_job_service.dequeue_next(merchant, Some(owner.id)).await.unwrap();

    let err = state
        .print_job_service
        .acknowledge(ack(merchant, job_id, AckOutcome::Printed, other.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PrintJobLocked { terminal_id: Some(id) } if id == owner.id));

    let forced = state
        .print_job_service
        .acknowledge(AcknowledgeCommand {
            force: true,
            ..ack(merchant, job_id, AckOutcome::Printed, other.id)
        })
        .await
        .unwrap();
    assert_eq!(forced.status, PrintJobStatus::Printed);
}

#[tokio::test]
#[ignore]
async fn repeated_acks_are_idempotent() {
    let state = common::test_state().await;
    let merchant = common::seed_merchant(&state.db_pool).await;
    let job_id = paid_cash_sale(&state, merchant).await;
    let terminal = state.terminal_service.create_terminal(merchant, "Caixa").await.unwrap().terminal;

    state.print_job_service.dequeue_next(merchant, Some(terminal.id)).await.unwrap();

    let first = state
        .print_job_service
        .acknowledge(ack(merchant, job_id, AckOutcome::Printed, terminal.id))
        .await
        .unwrap();
    let second = state
        .print_job_service
        .acknowledge(ack(merchant, job_id, AckOutcome::Printed, terminal.id))
        .await
        .unwrap();

    assert_eq!(first.status, PrintJobStatus::Printed);
    assert_eq!(second.status, PrintJobStatus::Printed);
    assert_eq!(first.printed_at, second.printed_at);
}

#[tokio::test]
#[ignore]
async fn failed_print_can_be_retried_from_panel() {
    let state = common::test_state().await;
    let merchant = common::seed_merchant(&state.db_pool).await;
    let job_id = paid_cash_sale(&state, merchant).await;
    let terminal = state.terminal_service.create_terminal(merchant, "Caixa").await.unwrap().terminal;

    state.print_job_service.dequeue_next(merchant, Some(terminal.id)).await.unwrap();
    let failed = state
        .print_job_service
        .acknowledge(AcknowledgeCommand {
            error_message: Some("Sem papel".to_string()),
            ..ack(merchant, job_id, AckOutcome::Error, terminal.id)
        })
        .await
        .unwrap();
    assert_eq!(failed.status, PrintJobStatus::Error);
    assert_eq!(failed.error_message.as_deref(), Some("Sem papel"));

    let requeued = state.print_job_service.retry(merchant, job_id).await.unwrap();
    assert_eq!(requeued.status, PrintJobStatus::Pending);

    let again = state
        .print_job_service
        .dequeue_next(merchant, Some(terminal.id))
        .await
        .unwrap()
        .expect("impressão de volta na fila");
    assert_eq!(again.id, job_id);
    assert_eq!(again.attempts, 2);

    // PRINTING não pode ser cancelada
    let err = state.print_job_service.cancel(merchant, job_id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStatusTransition(_)));
}

#[tokio::test]
#[ignore]
async fn concurrent_dequeues_get_distinct_jobs() {
    const WORKERS: usize = 8;

    let state = common::test_state().await;
    let merchant = common::seed_merchant(&state.db_pool).await;

    let mut created = HashSet::new();
    let mut terminals = Vec::new();
    for i in 0..WORKERS {
        created.insert(paid_cash_sale(&state, merchant).await);
        let terminal = state
            .terminal_service
            .create_terminal(merchant, &format!("Caixa {i}"))
            .await
            .unwrap()
            .terminal;
        terminals.push(terminal.id);
    }

    let mut workers = JoinSet::new();
    for terminal_id in terminals {
        let service = state.print_job_service.clone();
        workers.spawn(async move { service.dequeue_next(merchant, Some(terminal_id)).await });
    }

    let mut claimed = Vec::new();
    while let Some(result) = workers.join_next().await {
        let job = result.unwrap().unwrap().expect("cada terminal recebe uma impressão");
        assert_eq!(job.status, PrintJobStatus::Printing);
        claimed.push(job.id);
    }

    let distinct: HashSet<Uuid> = claimed.iter().copied().collect();
    assert_eq!(claimed.len(), WORKERS);
    assert_eq!(distinct.len(), WORKERS);
    assert_eq!(distinct, created);
}
