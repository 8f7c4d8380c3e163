//! Fluxo completo das intenções de pagamento contra um Postgres real.
//!
//! Run with: TEST_DATABASE_URL=postgres://... cargo test --test payment_intents -- --ignored

mod common;

use pdv_backend::{
    common::error::AppError,
    models::{
        payment::{PaymentIntentStatus, PaymentType, ProviderData},
        print_job::PrintJobStatus,
        product::CartItem,
    },
    services::payment_intent_service::{ConfirmIntentCommand, CreateIntentCommand, FailIntentCommand},
};
use rust_decimal::Decimal;
use uuid::Uuid;

fn pix(merchant_id: Uuid, items: Vec<CartItem>) -> CreateIntentCommand {
    CreateIntentCommand {
        merchant_id,
        terminal_id: None,
        items,
        payment_type: PaymentType::Pix,
        amount: None,
        idempotency_key: None,
    }
}

fn confirm(merchant_id: Uuid, intent_id: Uuid) -> ConfirmIntentCommand {
    ConfirmIntentCommand {
        merchant_id,
        intent_id,
        terminal_id: None,
        provider: "STONE".to_string(),
        provider_ref: Some("txn-001".to_string()),
        data: ProviderData {
            authorization_code: Some("AUTH42".to_string()),
            ..Default::default()
        },
    }
}

#[tokio::test]
#[ignore]
async fn pix_intent_confirms_into_paid_sale_with_receipt() {
    let state = common::test_state().await;
    let pool = &state.db_pool;
    let merchant = common::seed_merchant(pool).await;
    let coffee = common::seed_product(pool, merchant, "Café", Decimal::new(550, 2), 10).await;
    let bread = common::seed_product(pool, merchant, "Pão de queijo", Decimal::new(400, 2), 10).await;

    let intent = state
        .payment_intent_service
        .create_intent(CreateIntentCommand {
            amount: Some(Decimal::new(1500, 2)),
            ..pix(
                merchant,
                vec![
                    CartItem { product_id: coffee, quantity: 2 },
                    CartItem { product_id: bread, quantity: 1 },
                ],
            )
        })
        .await
        .unwrap();

    assert_eq!(intent.status, PaymentIntentStatus::Pending);
    assert_eq!(intent.amount_cents, 1500);
    // Estoque só sai na confirmação
    assert_eq!(common::stock_of(pool, coffee).await, 10);

    let approved = state
        .payment_intent_service
        .confirm_intent(confirm(merchant, intent.id))
        .await
        .unwrap();

    assert_eq!(approved.status, PaymentIntentStatus::Approved);
    let sale_id = approved.sale_id.expect("venda criada");
    let job_id = approved.print_job_id.expect("impressão criada");
    assert_eq!(common::stock_of(pool, coffee).await, 8);
    assert_eq!(common::stock_of(pool, bread).await, 9);

    let detail = state.sale_service.get_sale(merchant, sale_id).await.unwrap();
    assert_eq!(detail.sale.total_cents, 1500);
    assert_eq!(detail.sale.authorization_code.as_deref(), Some("AUTH42"));
    assert_eq!(detail.print_job_id, Some(job_id));
    let names: Vec<&str> = detail.items.iter().map(|i| i.product_name.as_str()).collect();
    assert_eq!(names, vec!["Café", "Pão de queijo"]);

    let jobs = state
        .print_job_service
        .list(merchant, Some(PrintJobStatus::Pending), None)
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].payload.0.total_cents, 1500);

    let history = state
        .payment_intent_service
        .list_transactions(merchant, intent.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
#[ignore]
async fn rejects_amount_that_differs_from_server_total() {
    let state = common::test_state().await;
    let merchant = common::seed_merchant(&state.db_pool).await;
    let product = common::seed_product(&state.db_pool, merchant, "Suco", Decimal::new(799, 2), 5).await;

    let err = state
        .payment_intent_service
        .create_intent(CreateIntentCommand {
            amount: Some(Decimal::new(700, 2)),
            ..pix(merchant, vec![CartItem { product_id: product, quantity: 1 }])
        })
        .await
        .unwrap_err();

    match err {
        AppError::AmountMismatch { expected_cents, received_cents } => {
            assert_eq!(expected_cents, 799);
            assert_eq!(received_cents, 700);
        }
        other => panic!("esperava AmountMismatch, veio {other:?}"),
    }
}

#[tokio::test]
#[ignore]
async fn cash_is_refused_as_payment_intent() {
    let state = common::test_state().await;
    let merchant = common::seed_merchant(&state.db_pool).await;
    let product = common::seed_product(&state.db_pool, merchant, "Água", Decimal::new(300, 2), 5).await;

    let err = state
        .payment_intent_service
        .create_intent(CreateIntentCommand {
            payment_type: PaymentType::Cash,
            ..pix(merchant, vec![CartItem { product_id: product, quantity: 1 }])
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::CashNotSupported));
}

#[tokio::test]
#[ignore]
async fn idempotency_key_returns_the_same_intent() {
    let state = common::test_state().await;
    let merchant = common::seed_merchant(&state.db_pool).await;
    let product = common::seed_product(&state.db_pool, merchant, "Bolo", Decimal::new(1200, 2), 5).await;
    let key = format!("pedido-{}", Uuid::new_v4());

    let make = || CreateIntentCommand {
        idempotency_key: Some(key.clone()),
        ..pix(merchant, vec![CartItem { product_id: product, quantity: 1 }])
    };

    let (a, b) = tokio::join!(
        state.payment_intent_service.create_intent(make()),
        state.payment_intent_service.create_intent(make()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.id, b.id);

    let again = state.payment_intent_service.create_intent(make()).await.unwrap();
    assert_eq!(again.id, a.id);
}

#[tokio::test]
#[ignore]
async fn repeated_confirmation_debits_stock_once() {
    let state = common::test_state().await;
    let pool = &state.db_pool;
    let merchant = common::seed_merchant(pool).await;
    let product = common::seed_product(pool, merchant, "Torta", Decimal::new(900, 2), 3).await;

    let intent = state
        .payment_intent_service
        .create_intent(pix(merchant, vec![CartItem { product_id: product, quantity: 2 }]))
        .await
        .unwrap();

    let first = state
        .payment_intent_service
        .confirm_intent(confirm(merchant, intent.id))
        .await
        .unwrap();
    let second = state
        .payment_intent_service
        .confirm_intent(confirm(merchant, intent.id))
        .await
        .unwrap();

    assert_eq!(first.sale_id, second.sale_id);
    assert_eq!(first.print_job_id, second.print_job_id);
    assert_eq!(common::stock_of(pool, product).await, 1);
}

#[tokio::test]
#[ignore]
async fn concurrent_confirmations_never_oversell() {
    let state = common::test_state().await;
    let pool = &state.db_pool;
    let merchant = common::seed_merchant(pool).await;
    let product = common::seed_product(pool, merchant, "Última fatia", Decimal::new(1000, 2), 1).await;

    let mut intents = Vec::new();
    for _ in 0..2 {
        let intent = state
            .payment_intent_service
            .create_intent(pix(merchant, vec![CartItem { product_id: product, quantity: 1 }]))
            .await
            .unwrap();
        intents.push(intent.id);
    }

    let (a, b) = tokio::join!(
        state.payment_intent_service.confirm_intent(confirm(merchant, intents[0])),
        state.payment_intent_service.confirm_intent(confirm(merchant, intents[1])),
    );

    let results = [a, b];
    let approved = results.iter().filter(|r| r.is_ok()).count();
    let short = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::IntentStockUnavailable { .. })))
        .count();

    assert_eq!(approved, 1);
    assert_eq!(short, 1);
    assert_eq!(common::stock_of(pool, product).await, 0);

    for r in results.iter() {
        if let Err(AppError::IntentStockUnavailable { intent, .. }) = r {
            assert_eq!(intent.status, PaymentIntentStatus::Error);
        }
    }
}

#[tokio::test]
#[ignore]
async fn approved_intent_cannot_fail_and_failed_intent_cannot_confirm() {
    let state = common::test_state().await;
    let merchant = common::seed_merchant(&state.db_pool).await;
    let product = common::seed_product(&state.db_pool, merchant, "Doce", Decimal::new(250, 2), 10).await;

    let fail = |intent_id| FailIntentCommand {
        merchant_id: merchant,
        intent_id,
        terminal_id: None,
        status: PaymentIntentStatus::Declined,
        provider: "STONE".to_string(),
        provider_ref: None,
        reason: Some("Cartão recusado".to_string()),
        data: ProviderData::default(),
    };

    // Aprovada -> fail é conflito
    let approved = state
        .payment_intent_service
        .create_intent(pix(merchant, vec![CartItem { product_id: product, quantity: 1 }]))
        .await
        .unwrap();
    state
        .payment_intent_service
        .confirm_intent(confirm(merchant, approved.id))
        .await
        .unwrap();
    let err = state.payment_intent_service.fail_intent(fail(approved.id)).await.unwrap_err();
    assert!(matches!(err, AppError::IntentAlreadyApproved(_)));

    // Recusada -> confirm é conflito, fail repetido devolve a mesma
    let declined = state
        .payment_intent_service
        .create_intent(pix(merchant, vec![CartItem { product_id: product, quantity: 1 }]))
        .await
        .unwrap();
    let failed = state.payment_intent_service.fail_intent(fail(declined.id)).await.unwrap();
    assert_eq!(failed.status, PaymentIntentStatus::Declined);
    assert_eq!(failed.failure_reason.as_deref(), Some("Cartão recusado"));
    assert!(failed.sale_id.is_none());

    let again = state.payment_intent_service.fail_intent(fail(declined.id)).await.unwrap();
    assert_eq!(again.status, PaymentIntentStatus::Declined);

    let err = state
        .payment_intent_service
        .confirm_intent(confirm(merchant, declined.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::IntentNotPending(_)));

    // Só a intenção aprovada gerou venda, e ela segue paga
    let statuses: Vec<String> = sqlx::query_scalar("SELECT status::text FROM sales WHERE merchant_id = $1")
        .bind(merchant)
        .fetch_all(&state.db_pool)
        .await
        .unwrap();
    assert_eq!(statuses, vec!["PAID".to_string()]);
}

#[tokio::test]
#[ignore]
async fn terminal_cannot_touch_intent_bound_to_another_terminal() {
    let state = common::test_state().await;
    let merchant = common::seed_merchant(&state.db_pool).await;
    let product = common::seed_product(&state.db_pool, merchant, "Chá", Decimal::new(450, 2), 10).await;

    let owner = state.terminal_service.create_terminal(merchant, "Caixa 1").await.unwrap();
    let intruder = state.terminal_service.create_terminal(merchant, "Caixa 2").await.unwrap();

    let intent = state
        .payment_intent_service
        .create_intent(CreateIntentCommand {
            terminal_id: Some(owner.terminal.id),
            ..pix(merchant, vec![CartItem { product_id: product, quantity: 1 }])
        })
        .await
        .unwrap();

    let err = state
        .payment_intent_service
        .confirm_intent(ConfirmIntentCommand {
            terminal_id: Some(intruder.terminal.id),
            ..confirm(merchant, intent.id)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TerminalMismatch));

    let err = state
        .payment_intent_service
        .get_intent(merchant, intent.id, Some(intruder.terminal.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TerminalMismatch));

    // Painel enxerga qualquer uma
    let seen = state.payment_intent_service.get_intent(merchant, intent.id, None).await.unwrap();
    assert_eq!(seen.terminal_id, Some(owner.terminal.id));
}

#[tokio::test]
#[ignore]
async fn cash_sale_computes_change_and_enqueues_receipt() {
    let state = common::test_state().await;
    let pool = &state.db_pool;
    let merchant = common::seed_merchant(pool).await;
    let product = common::seed_product(pool, merchant, "Sanduíche", Decimal::new(1275, 2), 4).await;

    let err = state
        .sale_service
        .create_cash_sale(pdv_backend::services::sale_service::CashSaleCommand {
            merchant_id: merchant,
            terminal_id: None,
            items: vec![CartItem { product_id: product, quantity: 2 }],
            cash_received: Decimal::new(2000, 2),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientCash { total_cents: 2550, received_cents: 2000 }));
    assert_eq!(common::stock_of(pool, product).await, 4);

    let detail = state
        .sale_service
        .create_cash_sale(pdv_backend::services::sale_service::CashSaleCommand {
            merchant_id: merchant,
            terminal_id: None,
            items: vec![CartItem { product_id: product, quantity: 2 }],
            cash_received: Decimal::new(3000, 2),
        })
        .await
        .unwrap();

    assert_eq!(detail.sale.total_cents, 2550);
    assert_eq!(detail.sale.change_cents, Some(450));
    assert!(detail.print_job_id.is_some());
    assert_eq!(common::stock_of(pool, product).await, 2);
}

#[tokio::test]
#[ignore]
async fn zero_total_cart_is_rejected_before_insert() {
    let state = common::test_state().await;
    let merchant = common::seed_merchant(&state.db_pool).await;
    let gift = common::seed_product(&state.db_pool, merchant, "Brinde", Decimal::ZERO, 5).await;

    let err = state
        .payment_intent_service
        .create_intent(pix(merchant, vec![CartItem { product_id: gift, quantity: 2 }]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)), "veio {err:?}");

    let intents = state.payment_intent_service.list_intents(merchant, None, None).await.unwrap();
    assert!(intents.is_empty());
    assert_eq!(common::stock_of(&state.db_pool, gift).await, 5);
}

#[tokio::test]
#[ignore]
async fn stale_pending_intent_expires_with_system_transaction() {
    let state = common::test_state().await;
    let merchant = common::seed_merchant(&state.db_pool).await;
    let product = common::seed_product(&state.db_pool, merchant, "Bolo", Decimal::new(1200, 2), 5).await;

    let intent = state
        .payment_intent_service
        .create_intent(pix(merchant, vec![CartItem { product_id: product, quantity: 1 }]))
        .await
        .unwrap();

    sqlx::query("UPDATE payment_intents SET created_at = NOW() - INTERVAL '2 hours' WHERE id = $1")
        .bind(intent.id)
        .execute(&state.db_pool)
        .await
        .unwrap();

    // O banco é compartilhado: outras intenções velhas podem entrar no mesmo lote
    for _ in 0..10 {
        if state.payment_intent_service.expire_stale().await.unwrap() == 0 {
            break;
        }
        let current = state.payment_intent_service.get_intent(merchant, intent.id, None).await.unwrap();
        if current.status != PaymentIntentStatus::Pending {
            break;
        }
    }
    let current = state.payment_intent_service.get_intent(merchant, intent.id, None).await.unwrap();
    assert_eq!(current.status, PaymentIntentStatus::Expired);

    let history = state
        .payment_intent_service
        .list_transactions(merchant, intent.id)
        .await
        .unwrap();
    let expiry = history
        .iter()
        .find(|t| t.provider == "SYSTEM")
        .expect("transação de expiração registrada");
    assert_eq!(expiry.status, PaymentIntentStatus::Expired);
    assert_eq!(expiry.message.as_deref(), Some("Intenção expirada"));

    // Uma segunda varredura não mexe na intenção já encerrada
    state.payment_intent_service.expire_stale().await.unwrap();
    let again = state
        .payment_intent_service
        .list_transactions(merchant, intent.id)
        .await
        .unwrap();
    assert_eq!(again.len(), history.len());
    assert_eq!(common::stock_of(&state.db_pool, product).await, 5);
}
