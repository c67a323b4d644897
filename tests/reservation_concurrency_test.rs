mod common;

use common::{reserve_cmd, seed_rates, seed_record, setup};
use stockroom_api::errors::ServiceError;

// 20 concurrent reservations of 1 base unit against 10 available: exactly
// 10 succeed regardless of arrival order, and availability never goes
// negative.
#[tokio::test]
async fn concurrent_reservations_never_oversell() {
    let ctx = setup().await;
    let record = seed_record(&ctx, "PIECE-GOODS", "WH-1", 0, 0, 10).await;

    let mut tasks = vec![];
    for i in 0..20 {
        let reservations = ctx.services.reservations.clone();
        let record_id = record.id;
        tasks.push(tokio::spawn(async move {
            reservations
                .reserve(reserve_cmd(record_id, 0, 0, 1, &format!("picker-{}", i)))
                .await
        }));
    }

    let mut successes = 0;
    let mut insufficient = 0;
    for task in tasks {
        match task.await.expect("task completed") {
            Ok(_) => successes += 1,
            Err(ServiceError::InsufficientStock(_)) => insufficient += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(
        successes, 10,
        "exactly 10 reservations should succeed; got {}",
        successes
    );
    assert_eq!(insufficient, 10);

    let view = ctx
        .services
        .availability
        .available_for(record.id)
        .await
        .expect("availability");
    assert_eq!(view.base.available, 0);
    assert!(view.is_out_of_stock);

    let answer = ctx
        .services
        .availability
        .can_reserve(record.id, 1)
        .await
        .expect("can_reserve");
    assert!(!answer.can);
    assert_eq!(answer.shortfall, 1);
}

// Reservations against different records proceed independently; a fully
// booked record never blocks its neighbors.
#[tokio::test]
async fn concurrent_reservations_on_distinct_records_all_succeed() {
    let ctx = setup().await;
    seed_rates(&ctx, "WIDGET", 144, 12).await;

    let mut records = vec![];
    for i in 0..4 {
        records.push(seed_record(&ctx, "WIDGET", &format!("WH-{}", i), 5, 0, 0).await);
    }

    let mut tasks = vec![];
    for record in &records {
        for _ in 0..5 {
            let reservations = ctx.services.reservations.clone();
            let record_id = record.id;
            tasks.push(tokio::spawn(async move {
                reservations
                    .reserve(reserve_cmd(record_id, 1, 0, 0, "planner"))
                    .await
            }));
        }
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.expect("task completed").is_ok() {
            successes += 1;
        }
    }
    assert_eq!(successes, 20);

    for record in &records {
        let view = ctx
            .services
            .availability
            .available_for(record.id)
            .await
            .expect("availability");
        assert_eq!(view.level1.available, 0);
        assert_eq!(view.level1.reserved, 5);
    }
}

// A cancel racing a fulfill: exactly one of the two terminal transitions
// wins, and the loser sees AlreadyTerminal.
#[tokio::test]
async fn racing_cancel_and_fulfill_agree_on_one_winner() {
    let ctx = setup().await;
    seed_rates(&ctx, "WIDGET", 144, 12).await;

    for _ in 0..10 {
        let record = seed_record(&ctx, "WIDGET", "WH-1", 3, 0, 0).await;
        let reservation = ctx
            .services
            .reservations
            .reserve(reserve_cmd(record.id, 3, 0, 0, "picker-1"))
            .await
            .expect("reserve");

        let cancel_svc = ctx.services.reservations.clone();
        let fulfill_svc = ctx.services.reservations.clone();
        let id = reservation.id;
        let cancel_task =
            tokio::spawn(async move { cancel_svc.cancel(id, "supervisor", None).await });
        let fulfill_task =
            tokio::spawn(async move { fulfill_svc.fulfill(id, "packer-1", None).await });

        let cancel_result = cancel_task.await.expect("join");
        let fulfill_result = fulfill_task.await.expect("join");

        match (&cancel_result, &fulfill_result) {
            (Ok(_), Err(ServiceError::AlreadyTerminal(s))) => {
                assert_eq!(s, "cancelled");
                // Cancel won: nothing was deducted.
                let kept = ctx
                    .services
                    .inventory_records
                    .get_record(record.id)
                    .await
                    .expect("lookup")
                    .expect("record present");
                assert_eq!(kept.level1_quantity, 3);
            }
            (Err(ServiceError::AlreadyTerminal(s)), Ok(outcome)) => {
                assert_eq!(s, "fulfilled");
                // Fulfill won: the exact-exhaustion prune fired.
                assert!(outcome.record_pruned);
            }
            other => panic!("expected exactly one winner, got {:?}", other),
        }
    }
}
