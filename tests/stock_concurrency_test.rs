mod common;

use assettrack_api::errors::ServiceError;
use assettrack_api::services::stock::ExitCommand;
use common::TestApp;
use uuid::Uuid;

fn exit(product_id: Uuid, quantity: i32) -> ExitCommand {
    ExitCommand {
        product_id,
        quantity,
        reason: "consumption".to_string(),
        destination: None,
        notes: None,
        created_by: Uuid::new_v4(),
        operation_id: Uuid::new_v4().to_string(),
    }
}

#[tokio::test]
async fn concurrent_exits_never_double_spend() {
    let app = TestApp::new().await;
    let product = app.seed_bulk_product(5).await;
    app.seed_stock(product, 10).await;

    // Two concurrent exits of 6 against a balance of 10: exactly one can win.
    let svc_a = app.state.services.stock.clone();
    let svc_b = app.state.services.stock.clone();
    let a = tokio::spawn(async move { svc_a.record_exit(exit(product, 6)).await });
    let b = tokio::spawn(async move { svc_b.record_exit(exit(product, 6)).await });

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| matches!(r, Err(ServiceError::InsufficientStock { .. })))
        .count();

    assert_eq!(successes, 1, "exactly one exit must win");
    assert_eq!(insufficient, 1, "the loser must see InsufficientStock");
    assert_eq!(
        app.state.services.stock.get_balance(product).await.unwrap(),
        4
    );
}

#[tokio::test]
async fn concurrent_unit_exits_stop_exactly_at_zero() {
    let app = TestApp::new().await;
    let product = app.seed_bulk_product(0).await;
    app.seed_stock(product, 10).await;

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let svc = app.state.services.stock.clone();
        tasks.push(tokio::spawn(
            async move { svc.record_exit(exit(product, 1)).await },
        ));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(
        successes, 10,
        "exactly 10 unit exits should succeed; got {}",
        successes
    );
    assert_eq!(
        app.state.services.stock.get_balance(product).await.unwrap(),
        0
    );

    let reconciliation = app
        .state
        .services
        .stock
        .reconcile_balance(product)
        .await
        .unwrap();
    assert!(reconciliation.consistent);
    assert_eq!(reconciliation.movement_count, 11); // seed entry + 10 exits
}
