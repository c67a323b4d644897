mod common;

use common::{reserve_cmd, seed_rates, seed_record, setup, wait_for_event};
use stockroom_api::entities::stock_reservation::ReservationStatus;
use stockroom_api::errors::ServiceError;
use stockroom_api::events::Event;
use stockroom_api::services::inventory_records::AdjustStockCommand;
use stockroom_api::services::reservation_queries::ReservationQueryFilters;

#[tokio::test]
async fn reserve_and_report_availability_in_cartons() {
    let ctx = setup().await;
    seed_rates(&ctx, "WIDGET", 144, 12).await;
    let record = seed_record(&ctx, "WIDGET", "WH-1", 10, 0, 0).await;

    let reservation = ctx
        .services
        .reservations
        .reserve(reserve_cmd(record.id, 3, 0, 0, "picker-1"))
        .await
        .expect("reserve 3 cartons");
    assert_eq!(reservation.reserved_base_total, 3 * 144);
    assert!(!reservation.rates_missing);
    assert_eq!(reservation.status, ReservationStatus::Active.as_str());

    let view = ctx
        .services
        .availability
        .available_for(record.id)
        .await
        .expect("availability");
    assert_eq!(view.level1.total, 10);
    assert_eq!(view.level1.reserved, 3);
    assert_eq!(view.level1.available, 7);
    assert_eq!(view.base.available, 7 * 144);
    assert_eq!(view.available_display.level1, 7);
    assert_eq!(view.available_display.level3, 0);
    assert!(!view.is_out_of_stock);

    let err = ctx
        .services
        .reservations
        .reserve(reserve_cmd(record.id, 8, 0, 0, "picker-2"))
        .await
        .expect_err("8 cartons cannot fit in 7");
    match err {
        ServiceError::InsufficientStock(shortfall) => {
            assert_eq!(shortfall.dimension, "level1");
            assert_eq!(shortfall.requested, 8);
            assert_eq!(shortfall.available, 7);
            assert_eq!(shortfall.shortfall, 1);
        }
        other => panic!("expected InsufficientStock, got {:?}", other),
    }
}

#[tokio::test]
async fn exact_fulfillment_prunes_record_but_keeps_reservation() {
    let ctx = setup().await;
    seed_rates(&ctx, "GADGET", 24, 6).await;
    let record = seed_record(&ctx, "GADGET", "WH-1", 2, 1, 3).await;

    let reservation = ctx
        .services
        .reservations
        .reserve(reserve_cmd(record.id, 2, 1, 3, "picker-1"))
        .await
        .expect("reserve everything");

    let outcome = ctx
        .services
        .reservations
        .fulfill(reservation.id, "packer-1", None)
        .await
        .expect("fulfill");
    assert!(outcome.record_pruned);
    assert_eq!(
        outcome.reservation.status,
        ReservationStatus::Fulfilled.as_str()
    );

    // The zero row is gone; the slot is free for different stock.
    let gone = ctx
        .services
        .inventory_records
        .get_record(record.id)
        .await
        .expect("lookup");
    assert!(gone.is_none());

    // The reservation itself stays queryable.
    let kept = ctx
        .services
        .reservation_queries
        .get_reservation(reservation.id)
        .await
        .expect("query")
        .expect("reservation still present");
    assert_eq!(kept.status, ReservationStatus::Fulfilled.as_str());
    assert!(kept.fulfilled_at.is_some());
}

#[tokio::test]
async fn missing_rates_fall_back_to_naive_sum() {
    let ctx = setup().await;
    let record = seed_record(&ctx, "NO-RATES", "WH-1", 5, 5, 5).await;

    let reservation = ctx
        .services
        .reservations
        .reserve(reserve_cmd(record.id, 2, 3, 5, "picker-1"))
        .await
        .expect("reserve without configured rates");
    assert_eq!(reservation.reserved_base_total, 10);
    assert!(reservation.rates_missing);

    let view = ctx
        .services
        .availability
        .available_for(record.id)
        .await
        .expect("availability");
    assert!(view.rates_missing);
    assert_eq!(view.base.total, 15);
    assert_eq!(view.base.reserved, 10);
}

#[tokio::test]
async fn cancel_is_terminal_and_restores_nothing_twice() {
    let mut ctx = setup().await;
    seed_rates(&ctx, "WIDGET", 144, 12).await;
    let record = seed_record(&ctx, "WIDGET", "WH-1", 10, 0, 0).await;

    let reservation = ctx
        .services
        .reservations
        .reserve(reserve_cmd(record.id, 4, 0, 0, "picker-1"))
        .await
        .expect("reserve");

    let cancelled = ctx
        .services
        .reservations
        .cancel(reservation.id, "supervisor", Some("customer withdrew".into()))
        .await
        .expect("first cancel");
    assert_eq!(cancelled.status, ReservationStatus::Cancelled.as_str());
    assert!(cancelled.cancelled_at.is_some());

    let view_after_first = ctx
        .services
        .availability
        .available_for(record.id)
        .await
        .expect("availability");
    assert_eq!(view_after_first.level1.available, 10);

    let err = ctx
        .services
        .reservations
        .cancel(reservation.id, "supervisor", None)
        .await
        .expect_err("second cancel must not silently succeed");
    assert!(matches!(err, ServiceError::AlreadyTerminal(ref s) if s == "cancelled"));

    // Ledger state unchanged between the two calls.
    let view_after_second = ctx
        .services
        .availability
        .available_for(record.id)
        .await
        .expect("availability");
    assert_eq!(view_after_second.level1.available, 10);

    let event = wait_for_event(&mut ctx, |e| {
        matches!(e, Event::ReservationCancelled { .. })
    })
    .await
    .expect("cancel audit event emitted");
    match event {
        Event::ReservationCancelled { reason, .. } => {
            assert_eq!(reason.as_deref(), Some("customer withdrew"));
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn fulfill_after_external_shrink_fails_with_mismatch() {
    let ctx = setup().await;
    seed_rates(&ctx, "WIDGET", 144, 12).await;
    let record = seed_record(&ctx, "WIDGET", "WH-1", 5, 0, 0).await;

    let reservation = ctx
        .services
        .reservations
        .reserve(reserve_cmd(record.id, 5, 0, 0, "picker-1"))
        .await
        .expect("reserve");

    // External adjustment shrinks the stock below the frozen earmark.
    ctx.services
        .inventory_records
        .adjust_stock(
            record.id,
            AdjustStockCommand {
                level1_delta: -2,
                level2_delta: 0,
                level3_delta: 0,
                reason: "CYCLE_COUNT".into(),
                adjusted_by: "auditor".into(),
            },
        )
        .await
        .expect("external shrink");

    let err = ctx
        .services
        .reservations
        .fulfill(reservation.id, "packer-1", None)
        .await
        .expect_err("fulfillment must not clamp or go negative");
    assert!(matches!(err, ServiceError::InventoryMismatch(_)));

    // Nothing moved: the reservation is still active and the ledger kept
    // the shrunken quantity.
    let kept = ctx
        .services
        .reservation_queries
        .get_reservation(reservation.id)
        .await
        .expect("query")
        .expect("reservation present");
    assert_eq!(kept.status, ReservationStatus::Active.as_str());

    let record_now = ctx
        .services
        .inventory_records
        .get_record(record.id)
        .await
        .expect("lookup")
        .expect("record present");
    assert_eq!(record_now.level1_quantity, 3);
}

#[tokio::test]
async fn fulfill_leaves_remainder_when_stock_is_not_exhausted() {
    let ctx = setup().await;
    seed_rates(&ctx, "WIDGET", 144, 12).await;
    let record = seed_record(&ctx, "WIDGET", "WH-1", 10, 0, 0).await;

    let reservation = ctx
        .services
        .reservations
        .reserve(reserve_cmd(record.id, 3, 0, 0, "picker-1"))
        .await
        .expect("reserve");

    let outcome = ctx
        .services
        .reservations
        .fulfill(reservation.id, "packer-1", Some("wave 7".into()))
        .await
        .expect("fulfill");
    assert!(!outcome.record_pruned);

    let record_now = ctx
        .services
        .inventory_records
        .get_record(record.id)
        .await
        .expect("lookup")
        .expect("record present");
    assert_eq!(record_now.level1_quantity, 7);

    // A terminal reservation cannot be fulfilled again.
    let err = ctx
        .services
        .reservations
        .fulfill(reservation.id, "packer-1", None)
        .await
        .expect_err("second fulfill");
    assert!(matches!(err, ServiceError::AlreadyTerminal(ref s) if s == "fulfilled"));
}

#[tokio::test]
async fn bulk_reserve_reports_partial_success() {
    let ctx = setup().await;
    seed_rates(&ctx, "WIDGET", 144, 12).await;
    let rich = seed_record(&ctx, "WIDGET", "WH-1", 10, 0, 0).await;
    let poor = seed_record(&ctx, "WIDGET", "WH-2", 1, 0, 0).await;

    let outcome = ctx
        .services
        .reservations
        .bulk_reserve(vec![
            reserve_cmd(rich.id, 2, 0, 0, "planner"),
            reserve_cmd(poor.id, 5, 0, 0, "planner"),
            reserve_cmd(rich.id, 1, 0, 0, "planner"),
        ])
        .await;

    assert_eq!(outcome.succeeded.len(), 2);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].index, 1);
    assert_eq!(outcome.failed[0].record_id, poor.id);
    assert!(outcome.failed[0].error.contains("Insufficient stock"));

    // The failure neither blocked nor rolled back the others.
    let view = ctx
        .services
        .availability
        .available_for(rich.id)
        .await
        .expect("availability");
    assert_eq!(view.level1.reserved, 3);
}

#[tokio::test]
async fn fulfill_bulk_reports_partial_success() {
    let ctx = setup().await;
    seed_rates(&ctx, "WIDGET", 144, 12).await;
    let record = seed_record(&ctx, "WIDGET", "WH-1", 10, 0, 0).await;

    let first = ctx
        .services
        .reservations
        .reserve(reserve_cmd(record.id, 2, 0, 0, "planner"))
        .await
        .expect("reserve");
    let second = ctx
        .services
        .reservations
        .reserve(reserve_cmd(record.id, 1, 0, 0, "planner"))
        .await
        .expect("reserve");
    ctx.services
        .reservations
        .cancel(second.id, "planner", None)
        .await
        .expect("cancel second");

    let outcome = ctx
        .services
        .reservations
        .fulfill_bulk(vec![first.id, second.id, uuid::Uuid::new_v4()], "packer-1")
        .await;

    assert_eq!(outcome.fulfilled.len(), 1);
    assert_eq!(outcome.failures.len(), 2);
    let errors: Vec<&str> = outcome.failures.iter().map(|f| f.error.as_str()).collect();
    assert!(errors.iter().any(|e| e.contains("already cancelled")));
    assert!(errors.iter().any(|e| e.contains("not found")));
}

#[tokio::test]
async fn malformed_reservations_are_rejected() {
    let ctx = setup().await;
    seed_rates(&ctx, "WIDGET", 144, 12).await;
    let record = seed_record(&ctx, "WIDGET", "WH-1", 10, 0, 0).await;

    // Negative quantity
    let err = ctx
        .services
        .reservations
        .reserve(reserve_cmd(record.id, -1, 0, 0, "picker-1"))
        .await
        .expect_err("negative quantity");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // All-zero earmark
    let err = ctx
        .services
        .reservations
        .reserve(reserve_cmd(record.id, 0, 0, 0, "picker-1"))
        .await
        .expect_err("zero quantity");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // Caller-supplied total disagreeing with the engine's own computation
    let mut cmd = reserve_cmd(record.id, 2, 0, 0, "picker-1");
    cmd.expected_base_total = Some(289);
    let err = ctx
        .services
        .reservations
        .reserve(cmd)
        .await
        .expect_err("disagreeing base total");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // Unknown record
    let err = ctx
        .services
        .reservations
        .reserve(reserve_cmd(uuid::Uuid::new_v4(), 1, 0, 0, "picker-1"))
        .await
        .expect_err("unknown record");
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn reserve_emits_audit_event() {
    let mut ctx = setup().await;
    seed_rates(&ctx, "WIDGET", 144, 12).await;
    let record = seed_record(&ctx, "WIDGET", "WH-1", 10, 0, 0).await;

    let reservation = ctx
        .services
        .reservations
        .reserve(reserve_cmd(record.id, 2, 0, 0, "picker-1"))
        .await
        .expect("reserve");

    let event = wait_for_event(&mut ctx, |e| matches!(e, Event::StockReserved { .. }))
        .await
        .expect("reserve audit event emitted");
    match event {
        Event::StockReserved {
            reservation_id,
            record_id,
            base_total,
            ..
        } => {
            assert_eq!(reservation_id, reservation.id);
            assert_eq!(record_id, record.id);
            assert_eq!(base_total, 288);
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn query_surface_filters_and_summarizes() {
    let ctx = setup().await;
    seed_rates(&ctx, "WIDGET", 144, 12).await;
    let wh1 = seed_record(&ctx, "WIDGET", "WH-1", 10, 0, 0).await;
    let wh2 = seed_record(&ctx, "WIDGET", "WH-2", 10, 0, 0).await;

    let mut cmd = reserve_cmd(wh1.id, 2, 0, 0, "alice");
    cmd.demand_ref = Some("SO-1001/1".into());
    ctx.services.reservations.reserve(cmd).await.expect("reserve");
    ctx.services
        .reservations
        .reserve(reserve_cmd(wh1.id, 1, 0, 0, "bob"))
        .await
        .expect("reserve");
    let cancelled = ctx
        .services
        .reservations
        .reserve(reserve_cmd(wh2.id, 4, 0, 0, "alice"))
        .await
        .expect("reserve");
    ctx.services
        .reservations
        .cancel(cancelled.id, "alice", None)
        .await
        .expect("cancel");

    // Filter by warehouse
    let (in_wh1, total) = ctx
        .services
        .reservation_queries
        .query_reservations(
            1,
            50,
            ReservationQueryFilters {
                warehouse: Some("WH-1".into()),
                ..Default::default()
            },
        )
        .await
        .expect("query");
    assert_eq!(total, 2);
    assert!(in_wh1.iter().all(|r| r.warehouse == "WH-1"));

    // Filter by status + requester
    let (active_alice, _) = ctx
        .services
        .reservation_queries
        .query_reservations(
            1,
            50,
            ReservationQueryFilters {
                status: Some("active".into()),
                reserved_by: Some("alice".into()),
                ..Default::default()
            },
        )
        .await
        .expect("query");
    assert_eq!(active_alice.len(), 1);
    assert_eq!(active_alice[0].demand_ref.as_deref(), Some("SO-1001/1"));

    // Unknown status is rejected
    let err = ctx
        .services
        .reservation_queries
        .query_reservations(
            1,
            50,
            ReservationQueryFilters {
                status: Some("pending".into()),
                ..Default::default()
            },
        )
        .await
        .expect_err("unknown status");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // Demand-ref lookup
    let by_demand = ctx
        .services
        .reservation_queries
        .list_by_demand_ref("SO-1001/1")
        .await
        .expect("by demand ref");
    assert_eq!(by_demand.len(), 1);

    // Warehouse summary only counts active earmarks
    let summary = ctx
        .services
        .reservation_queries
        .summary_by_warehouse()
        .await
        .expect("summary");
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].warehouse, "WH-1");
    assert_eq!(summary[0].active_count, 2);
    assert_eq!(summary[0].reserved_base_total, 3 * 144);
}

#[tokio::test]
async fn rate_changes_never_touch_frozen_reservations() {
    let ctx = setup().await;
    seed_rates(&ctx, "WIDGET", 144, 12).await;
    let record = seed_record(&ctx, "WIDGET", "WH-1", 10, 0, 0).await;

    let reservation = ctx
        .services
        .reservations
        .reserve(reserve_cmd(record.id, 2, 0, 0, "picker-1"))
        .await
        .expect("reserve");
    assert_eq!(reservation.reserved_base_total, 288);

    seed_rates(&ctx, "WIDGET", 100, 10).await;

    let kept = ctx
        .services
        .reservation_queries
        .get_reservation(reservation.id)
        .await
        .expect("query")
        .expect("present");
    assert_eq!(kept.reserved_base_total, 288);

    // The availability view uses the new rate for the ledger but the frozen
    // totals for the earmarks.
    let view = ctx
        .services
        .availability
        .available_for(record.id)
        .await
        .expect("availability");
    assert_eq!(view.base.total, 1000);
    assert_eq!(view.base.reserved, 288);
}
