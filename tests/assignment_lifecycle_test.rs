mod common;

use assert_matches::assert_matches;
use assettrack_api::entities::assignment::{AssignmentStatus, ClosedReason, Destination, Origin};
use assettrack_api::entities::inventory_item::ItemState;
use assettrack_api::errors::ServiceError;
use assettrack_api::services::assignments::CreateAssignmentCommand;
use common::TestApp;
use uuid::Uuid;

fn assign_item(item_id: Uuid, destination: Destination, user: Uuid) -> CreateAssignmentCommand {
    CreateAssignmentCommand {
        origin: Origin::Serialized { item_id },
        destination,
        encryption_password: None,
        service_account: None,
        notes: None,
        created_by: user,
    }
}

fn assign_bulk(
    product_id: Uuid,
    quantity: i32,
    destination: Destination,
    user: Uuid,
) -> CreateAssignmentCommand {
    CreateAssignmentCommand {
        origin: Origin::Bulk {
            product_id,
            quantity,
        },
        destination,
        encryption_password: None,
        service_account: None,
        notes: None,
        created_by: user,
    }
}

#[tokio::test]
async fn serialized_assignment_claims_the_item_exclusively() {
    // Assign the item to an employee, then a second assignment to a
    // sector must fail with ItemUnavailable and create nothing.
    let app = TestApp::new().await;
    let product = app.seed_serial_product(false, false).await;
    let item = app.seed_item(product, "SN-0001").await;
    let employee = app.seed_employee().await;
    let sector = app.seed_sector().await;
    let user = app.operator();

    let assignment_id = app
        .state
        .services
        .assignments
        .create_assignment(assign_item(item, Destination::Employee(employee), user))
        .await
        .expect("first assignment");

    let stored = app
        .state
        .services
        .items
        .get_item(item)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, ItemState::Assigned);

    let err = app
        .state
        .services
        .assignments
        .create_assignment(assign_item(item, Destination::Sector(sector), user))
        .await
        .expect_err("second assignment must fail");
    assert_matches!(
        err,
        ServiceError::ItemUnavailable {
            state: ItemState::Assigned,
            ..
        }
    );

    // Only the first assignment row exists.
    let (assignments, total) = app
        .state
        .services
        .assignments
        .list_assignments(1, 10)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(assignments[0].id, assignment_id);
}

#[tokio::test]
async fn bulk_assignment_decrements_stock_with_a_destination_stamped_exit() {
    let app = TestApp::new().await;
    let product = app.seed_bulk_product(2).await;
    let employee = app.seed_employee().await;
    let user = app.operator();
    app.seed_stock(product, 10).await;

    let assignment_id = app
        .state
        .services
        .assignments
        .create_assignment(assign_bulk(
            product,
            3,
            Destination::Employee(employee),
            user,
        ))
        .await
        .expect("bulk assignment");

    assert_eq!(
        app.state.services.stock.get_balance(product).await.unwrap(),
        7
    );

    let (movements, _) = app
        .state
        .services
        .stock
        .list_movements(product, 1, 1)
        .await
        .unwrap();
    assert_eq!(movements[0].employee_id, Some(employee));
    assert_eq!(movements[0].reason, "assignment");

    let assignment = app
        .state
        .services
        .assignments
        .get_assignment(assignment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(assignment.quantity, Some(3));
    assert_eq!(assignment.status, AssignmentStatus::Active);
}

#[tokio::test]
async fn bulk_assignment_beyond_stock_fails_atomically() {
    let app = TestApp::new().await;
    let product = app.seed_bulk_product(0).await;
    let employee = app.seed_employee().await;
    let user = app.operator();
    app.seed_stock(product, 2).await;

    let err = app
        .state
        .services
        .assignments
        .create_assignment(assign_bulk(
            product,
            5,
            Destination::Employee(employee),
            user,
        ))
        .await
        .expect_err("insufficient stock");
    assert_matches!(
        err,
        ServiceError::InsufficientStock {
            requested: 5,
            available: 2,
            ..
        }
    );

    // No assignment row, no movement, balance untouched.
    let (_, total) = app
        .state
        .services
        .assignments
        .list_assignments(1, 10)
        .await
        .unwrap();
    assert_eq!(total, 0);
    assert_eq!(
        app.state.services.stock.get_balance(product).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn returning_a_serialized_assignment_frees_the_item() {
    let app = TestApp::new().await;
    let product = app.seed_serial_product(false, false).await;
    let item = app.seed_item(product, "SN-0002").await;
    let employee = app.seed_employee().await;
    let user = app.operator();

    let assignment_id = app
        .state
        .services
        .assignments
        .create_assignment(assign_item(item, Destination::Employee(employee), user))
        .await
        .unwrap();

    app.state
        .services
        .assignments
        .return_assignment(assignment_id, Some("returned in good shape".into()))
        .await
        .expect("return");

    let stored = app
        .state
        .services
        .items
        .get_item(item)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, ItemState::Available);

    let assignment = app
        .state
        .services
        .assignments
        .get_assignment(assignment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(assignment.status, AssignmentStatus::Closed);
    assert_eq!(assignment.closed_reason, Some(ClosedReason::Returned));
    assert!(assignment.returned_at.is_some());

    // The item is assignable again.
    app.state
        .services
        .assignments
        .create_assignment(assign_item(item, Destination::Employee(employee), user))
        .await
        .expect("re-assignment after return");
}

#[tokio::test]
async fn returning_bulk_stock_does_not_restock() {
    // Consumed stock is not auto-returned; only an explicit
    // new entry restocks.
    let app = TestApp::new().await;
    let product = app.seed_bulk_product(0).await;
    let employee = app.seed_employee().await;
    let user = app.operator();
    app.seed_stock(product, 10).await;

    let assignment_id = app
        .state
        .services
        .assignments
        .create_assignment(assign_bulk(
            product,
            3,
            Destination::Employee(employee),
            user,
        ))
        .await
        .unwrap();
    assert_eq!(
        app.state.services.stock.get_balance(product).await.unwrap(),
        7
    );

    app.state
        .services
        .assignments
        .return_assignment(assignment_id, None)
        .await
        .expect("bulk return");

    // Balance unaffected by the return.
    assert_eq!(
        app.state.services.stock.get_balance(product).await.unwrap(),
        7
    );
    let (_, movement_total) = app
        .state
        .services
        .stock
        .list_movements(product, 1, 10)
        .await
        .unwrap();
    assert_eq!(movement_total, 2); // entry + assignment exit, nothing else
}

#[tokio::test]
async fn closing_twice_reports_already_closed() {
    let app = TestApp::new().await;
    let product = app.seed_serial_product(false, false).await;
    let item = app.seed_item(product, "SN-0003").await;
    let employee = app.seed_employee().await;
    let user = app.operator();

    let assignment_id = app
        .state
        .services
        .assignments
        .create_assignment(assign_item(item, Destination::Employee(employee), user))
        .await
        .unwrap();

    app.state
        .services
        .assignments
        .return_assignment(assignment_id, None)
        .await
        .unwrap();

    assert_matches!(
        app.state
            .services
            .assignments
            .return_assignment(assignment_id, None)
            .await,
        Err(ServiceError::AlreadyClosed(id)) if id == assignment_id
    );
    assert_matches!(
        app.state
            .services
            .assignments
            .cancel_assignment(assignment_id, "created by mistake".into())
            .await,
        Err(ServiceError::AlreadyClosed(_))
    );
}

#[tokio::test]
async fn cancel_requires_a_real_justification() {
    let app = TestApp::new().await;
    let product = app.seed_serial_product(false, false).await;
    let item = app.seed_item(product, "SN-0004").await;
    let employee = app.seed_employee().await;
    let user = app.operator();

    let assignment_id = app
        .state
        .services
        .assignments
        .create_assignment(assign_item(item, Destination::Employee(employee), user))
        .await
        .unwrap();

    assert_matches!(
        app.state
            .services
            .assignments
            .cancel_assignment(assignment_id, "oops".into())
            .await,
        Err(ServiceError::InvalidJustification(_))
    );

    app.state
        .services
        .assignments
        .cancel_assignment(assignment_id, "wrong employee selected".into())
        .await
        .expect("cancel with proper justification");

    let assignment = app
        .state
        .services
        .assignments
        .get_assignment(assignment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(assignment.closed_reason, Some(ClosedReason::Cancelled));

    let stored = app
        .state
        .services
        .items
        .get_item(item)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, ItemState::Available);
}

#[tokio::test]
async fn category_conditional_fields_gate_the_whole_operation() {
    let app = TestApp::new().await;
    let product = app.seed_serial_product(true, false).await; // laptop-like
    let item = app.seed_item(product, "SN-0005").await;
    let employee = app.seed_employee().await;
    let user = app.operator();

    let err = app
        .state
        .services
        .assignments
        .create_assignment(assign_item(item, Destination::Employee(employee), user))
        .await
        .expect_err("missing encryption password");
    assert_matches!(
        err,
        ServiceError::MissingRequiredField {
            field: "encryption_password",
            ..
        }
    );

    // The abort left the item untouched and no assignment row behind.
    let stored = app
        .state
        .services
        .items
        .get_item(item)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, ItemState::Available);
    let (_, total) = app
        .state
        .services
        .assignments
        .list_assignments(1, 10)
        .await
        .unwrap();
    assert_eq!(total, 0);

    // With the field present the same request commits.
    let mut cmd = assign_item(item, Destination::Employee(employee), user);
    cmd.encryption_password = Some("correct horse battery staple".into());
    app.state
        .services
        .assignments
        .create_assignment(cmd)
        .await
        .expect("assignment with required field");
}

#[tokio::test]
async fn service_account_requirement_applies_to_phone_like_categories() {
    let app = TestApp::new().await;
    let product = app.seed_serial_product(false, true).await;
    let item = app.seed_item(product, "SN-0006").await;
    let employee = app.seed_employee().await;
    let user = app.operator();

    let err = app
        .state
        .services
        .assignments
        .create_assignment(assign_item(item, Destination::Employee(employee), user))
        .await
        .expect_err("missing service account");
    assert_matches!(
        err,
        ServiceError::MissingRequiredField {
            field: "service_account",
            ..
        }
    );
}

#[tokio::test]
async fn destinations_accept_sector_and_branch_targets() {
    let app = TestApp::new().await;
    let product = app.seed_bulk_product(0).await;
    let sector = app.seed_sector().await;
    let branch = app.seed_branch().await;
    let user = app.operator();
    app.seed_stock(product, 10).await;

    app.state
        .services
        .assignments
        .create_assignment(assign_bulk(product, 1, Destination::Sector(sector), user))
        .await
        .expect("sector destination");
    app.state
        .services
        .assignments
        .create_assignment(assign_bulk(product, 1, Destination::Branch(branch), user))
        .await
        .expect("branch destination");
}

#[tokio::test]
async fn missing_destination_row_is_not_found() {
    let app = TestApp::new().await;
    let product = app.seed_bulk_product(0).await;
    let user = app.operator();
    app.seed_stock(product, 10).await;

    assert_matches!(
        app.state
            .services
            .assignments
            .create_assignment(assign_bulk(
                product,
                1,
                Destination::Employee(Uuid::new_v4()),
                user,
            ))
            .await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn raw_destination_parts_must_name_exactly_one_target() {
    // The exclusivity rule as the API layer exercises it.
    let employee = Some(Uuid::new_v4());
    let sector = Some(Uuid::new_v4());

    assert_matches!(
        Destination::from_parts(employee, sector, None),
        Err(ServiceError::InvalidDestination)
    );
    assert_matches!(
        Destination::from_parts(None, None, None),
        Err(ServiceError::InvalidDestination)
    );
    assert_matches!(
        Origin::from_parts(Some(Uuid::new_v4()), Some(Uuid::new_v4()), Some(1)),
        Err(ServiceError::InvalidOrigin)
    );
}
