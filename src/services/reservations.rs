//! The stock reservation engine.
//!
//! Reserve earmarks stock for a pending demand line without deducting it;
//! fulfill converts the earmark into an actual deduction; cancel releases
//! it. Reserve and fulfill run inside a per-record critical section (lock
//! registry + one database transaction) so two callers can never pass the
//! availability check against the same stale snapshot and jointly oversell.

use chrono::Utc;
use dashmap::DashMap;
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::entities::conversion_rate::Entity as ConversionRateEntity;
use crate::entities::inventory_record::Entity as InventoryRecordEntity;
use crate::entities::stock_reservation::{
    self, Entity as StockReservationEntity, ReservationStatus,
};
use crate::errors::{ServiceError, StockShortfall};
use crate::events::{Event, EventSender};
use crate::services::inventory_records::InventoryRecordService;
use crate::services::unit_conversion::{self, LevelQuantities};

lazy_static! {
    static ref RESERVATIONS_CREATED: IntCounter = IntCounter::new(
        "stock_reservations_created_total",
        "Total number of reservations created"
    )
    .expect("metric can be created");
    static ref RESERVATIONS_FULFILLED: IntCounter = IntCounter::new(
        "stock_reservations_fulfilled_total",
        "Total number of reservations fulfilled"
    )
    .expect("metric can be created");
    static ref RESERVATIONS_CANCELLED: IntCounter = IntCounter::new(
        "stock_reservations_cancelled_total",
        "Total number of reservations cancelled"
    )
    .expect("metric can be created");
    static ref RESERVATION_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "stock_reservation_failures_total",
            "Total number of failed reservation operations"
        ),
        &["operation", "error_type"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema, Validate)]
pub struct ReserveStockCommand {
    /// The inventory record (one SKU at one warehouse location/lot) to
    /// earmark against.
    pub record_id: Uuid,
    #[validate]
    pub quantities: LevelQuantities,
    /// Caller-supplied base total. The engine recomputes its own and
    /// rejects a disagreeing value.
    pub expected_base_total: Option<i64>,
    /// Opaque reference to the external demand line.
    #[validate(length(max = 128))]
    pub demand_ref: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub requested_by: String,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkReserveFailure {
    pub index: usize,
    pub record_id: Uuid,
    pub error: String,
}

/// Partial-success result of a bulk reserve: each item ran independently,
/// so one failure neither blocks nor rolls back the others.
#[derive(Debug, Default)]
pub struct BulkReserveOutcome {
    pub succeeded: Vec<stock_reservation::Model>,
    pub failed: Vec<BulkReserveFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FulfillFailure {
    pub reservation_id: Uuid,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct FulfillBulkOutcome {
    pub fulfilled: Vec<FulfillOutcome>,
    pub failures: Vec<FulfillFailure>,
}

#[derive(Debug, Clone)]
pub struct FulfillOutcome {
    pub reservation: stock_reservation::Model,
    /// True when the deduction exhausted the record and the row was deleted.
    pub record_pruned: bool,
}

/// Service owning all mutations of reservation status and, through
/// fulfillment, the only deduction path into the quantity ledger.
#[derive(Clone)]
pub struct ReservationService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
    /// One mutex per inventory record. Entries are never removed: removal
    /// could hand two concurrent callers different mutexes for the same
    /// record, and the registry stays bounded by the records touched over
    /// the process lifetime.
    record_locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
    max_conflict_retries: u32,
}

impl ReservationService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        event_sender: EventSender,
        max_conflict_retries: u32,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            record_locks: Arc::new(DashMap::new()),
            max_conflict_retries,
        }
    }

    fn lock_for(&self, record_id: Uuid) -> Arc<Mutex<()>> {
        self.record_locks.entry(record_id).or_default().clone()
    }

    fn is_retryable_conflict(err: &DbErr) -> bool {
        let msg = err.to_string().to_ascii_lowercase();
        msg.contains("database is locked")
            || msg.contains("deadlock")
            || msg.contains("could not serialize")
            || msg.contains("lock timeout")
    }

    fn failure_label(err: &ServiceError) -> &'static str {
        match err {
            ServiceError::ValidationError(_) => "validation_error",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::InsufficientStock(_) => "insufficient_stock",
            ServiceError::AlreadyTerminal(_) => "already_terminal",
            ServiceError::InventoryMismatch(_) => "inventory_mismatch",
            ServiceError::ConcurrencyConflict(_) => "concurrency_conflict",
            _ => "internal_error",
        }
    }

    /// Earmarks quantities of one inventory record for a pending demand
    /// line. Runs inside the record's critical section; the availability
    /// check and the insert observe one consistent snapshot.
    #[instrument(skip(self, command))]
    pub async fn reserve(
        &self,
        command: ReserveStockCommand,
    ) -> Result<stock_reservation::Model, ServiceError> {
        self.validate_reserve(&command).map_err(|e| {
            RESERVATION_FAILURES
                .with_label_values(&["reserve", "validation_error"])
                .inc();
            e
        })?;

        let lock = self.lock_for(command.record_id);
        let _guard = lock.lock().await;

        let mut attempt = 0;
        let reservation = loop {
            match self.reserve_in_tx(&command).await {
                Ok(model) => break model,
                Err(ServiceError::DatabaseError(err))
                    if Self::is_retryable_conflict(&err) && attempt < self.max_conflict_retries =>
                {
                    attempt += 1;
                    warn!(
                        record_id = %command.record_id,
                        attempt = attempt,
                        error = %err,
                        "Retrying reservation after transient conflict"
                    );
                }
                Err(ServiceError::DatabaseError(err)) if Self::is_retryable_conflict(&err) => {
                    RESERVATION_FAILURES
                        .with_label_values(&["reserve", "concurrency_conflict"])
                        .inc();
                    return Err(ServiceError::ConcurrencyConflict(command.record_id));
                }
                Err(err) => {
                    RESERVATION_FAILURES
                        .with_label_values(&["reserve", Self::failure_label(&err)])
                        .inc();
                    return Err(err);
                }
            }
        };

        RESERVATIONS_CREATED.inc();
        info!(
            reservation_id = %reservation.id,
            record_id = %reservation.record_id,
            sku = %reservation.sku,
            base_total = reservation.reserved_base_total,
            reserved_by = %reservation.reserved_by,
            "Stock reserved"
        );

        self.event_sender
            .send(Event::StockReserved {
                reservation_id: reservation.id,
                record_id: reservation.record_id,
                sku: reservation.sku.clone(),
                warehouse: reservation.warehouse.clone(),
                level1: reservation.reserved_level1,
                level2: reservation.reserved_level2,
                level3: reservation.reserved_level3,
                base_total: reservation.reserved_base_total,
                rates_missing: reservation.rates_missing,
                reserved_by: reservation.reserved_by.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(reservation)
    }

    fn validate_reserve(&self, command: &ReserveStockCommand) -> Result<(), ServiceError> {
        command.validate()?;
        if !command.quantities.is_non_negative() {
            return Err(ServiceError::ValidationError(
                "reserved quantities must be non-negative".to_string(),
            ));
        }
        if command.quantities.is_zero() {
            return Err(ServiceError::ValidationError(
                "reservation must earmark a positive quantity".to_string(),
            ));
        }
        Ok(())
    }

    async fn reserve_in_tx(
        &self,
        command: &ReserveStockCommand,
    ) -> Result<stock_reservation::Model, ServiceError> {
        let db = &*self.db_pool;
        let cmd = command.clone();

        db.transaction::<_, stock_reservation::Model, ServiceError>(move |txn| {
            Box::pin(async move {
                let record = InventoryRecordEntity::find_by_id(cmd.record_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Inventory record {} not found",
                            cmd.record_id
                        ))
                    })?;

                let rates = ConversionRateEntity::find_by_id(record.sku.clone())
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                let requested_base = unit_conversion::to_base_units(&cmd.quantities, rates.as_ref())?;
                if let Some(expected) = cmd.expected_base_total {
                    if expected != requested_base.total {
                        return Err(ServiceError::ValidationError(format!(
                            "caller-supplied base total {} disagrees with computed total {}",
                            expected, requested_base.total
                        )));
                    }
                }

                let active = StockReservationEntity::find()
                    .filter(stock_reservation::Column::RecordId.eq(record.id))
                    .filter(
                        stock_reservation::Column::Status.eq(ReservationStatus::Active.as_str()),
                    )
                    .all(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                let reserved1: i64 = active.iter().map(|r| r.reserved_level1).sum();
                let reserved2: i64 = active.iter().map(|r| r.reserved_level2).sum();
                let reserved3: i64 = active.iter().map(|r| r.reserved_level3).sum();
                let reserved_base: i64 = active.iter().map(|r| r.reserved_base_total).sum();

                let record_base = unit_conversion::to_base_units(
                    &LevelQuantities::new(
                        record.level1_quantity,
                        record.level2_quantity,
                        record.level3_quantity,
                    ),
                    rates.as_ref(),
                )?;

                let checks = [
                    (
                        "level1",
                        cmd.quantities.level1,
                        record.level1_quantity - reserved1,
                    ),
                    (
                        "level2",
                        cmd.quantities.level2,
                        record.level2_quantity - reserved2,
                    ),
                    (
                        "level3",
                        cmd.quantities.level3,
                        record.level3_quantity - reserved3,
                    ),
                    (
                        "base",
                        requested_base.total,
                        record_base.total - reserved_base,
                    ),
                ];
                for (dimension, requested, available) in checks {
                    if requested > available {
                        return Err(ServiceError::InsufficientStock(StockShortfall::new(
                            dimension, requested, available,
                        )));
                    }
                }

                let reservation = stock_reservation::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    record_id: Set(record.id),
                    sku: Set(record.sku.clone()),
                    warehouse: Set(record.warehouse.clone()),
                    location: Set(record.location.clone()),
                    demand_ref: Set(cmd.demand_ref.clone()),
                    reserved_level1: Set(cmd.quantities.level1),
                    reserved_level2: Set(cmd.quantities.level2),
                    reserved_level3: Set(cmd.quantities.level3),
                    reserved_base_total: Set(requested_base.total),
                    rates_missing: Set(requested_base.rates_missing),
                    status: Set(ReservationStatus::Active.as_str().to_string()),
                    reserved_by: Set(cmd.requested_by.clone()),
                    reserved_at: Set(Utc::now()),
                    notes: Set(cmd.notes.clone()),
                    ..Default::default()
                };

                reservation.insert(txn).await.map_err(ServiceError::db_error)
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
    }

    /// Reserves each item independently: whatever can be earmarked is, and
    /// the rest come back as itemized failures. Callers spreading one
    /// demand across several candidate locations keep what succeeds.
    #[instrument(skip(self, commands))]
    pub async fn bulk_reserve(&self, commands: Vec<ReserveStockCommand>) -> BulkReserveOutcome {
        let mut outcome = BulkReserveOutcome::default();

        for (index, command) in commands.into_iter().enumerate() {
            let record_id = command.record_id;
            match self.reserve(command).await {
                Ok(model) => outcome.succeeded.push(model),
                Err(err) => outcome.failed.push(BulkReserveFailure {
                    index,
                    record_id,
                    error: err.to_string(),
                }),
            }
        }

        info!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "Bulk reserve completed"
        );
        outcome
    }

    /// Releases an active reservation. A pure status change: the earmark
    /// never decremented the ledger, so there is nothing to add back.
    ///
    /// The transition is a compare-and-set on `status = active`; a second
    /// cancel reports `AlreadyTerminal` rather than silently succeeding.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        reservation_id: Uuid,
        cancelled_by: &str,
        reason: Option<String>,
    ) -> Result<stock_reservation::Model, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let result = StockReservationEntity::update_many()
            .col_expr(
                stock_reservation::Column::Status,
                Expr::value(ReservationStatus::Cancelled.as_str()),
            )
            .col_expr(stock_reservation::Column::CancelledAt, Expr::value(now))
            .col_expr(
                stock_reservation::Column::CancelledBy,
                Expr::value(cancelled_by.to_string()),
            )
            .col_expr(
                stock_reservation::Column::CancelReason,
                Expr::value(reason.clone()),
            )
            .col_expr(stock_reservation::Column::UpdatedAt, Expr::value(now))
            .filter(stock_reservation::Column::Id.eq(reservation_id))
            .filter(stock_reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 0 {
            let existing = StockReservationEntity::find_by_id(reservation_id)
                .one(db)
                .await
                .map_err(ServiceError::db_error)?;
            let err = match existing {
                None => ServiceError::NotFound(format!(
                    "Reservation {} not found",
                    reservation_id
                )),
                Some(model) => ServiceError::AlreadyTerminal(model.status),
            };
            RESERVATION_FAILURES
                .with_label_values(&["cancel", Self::failure_label(&err)])
                .inc();
            return Err(err);
        }

        let cancelled = StockReservationEntity::find_by_id(reservation_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::InternalError("cancelled reservation vanished".to_string())
            })?;

        RESERVATIONS_CANCELLED.inc();
        info!(
            reservation_id = %reservation_id,
            cancelled_by = %cancelled_by,
            "Reservation cancelled"
        );

        self.event_sender
            .send(Event::ReservationCancelled {
                reservation_id: cancelled.id,
                record_id: cancelled.record_id,
                cancelled_by: cancelled_by.to_string(),
                reason,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(cancelled)
    }

    /// Converts an active reservation into an actual deduction.
    ///
    /// Reconciles the frozen earmark against what the ledger holds *now*:
    /// if any level has shrunk below the reserved quantity (an external
    /// adjustment since reservation), the call fails `InventoryMismatch`
    /// and rolls back; the ledger is never clamped and never goes negative.
    #[instrument(skip(self))]
    pub async fn fulfill(
        &self,
        reservation_id: Uuid,
        fulfilled_by: &str,
        notes: Option<String>,
    ) -> Result<FulfillOutcome, ServiceError> {
        let db = &*self.db_pool;

        // Resolve the record to serialize on before entering the critical
        // section; the authoritative status check happens inside it.
        let reservation = StockReservationEntity::find_by_id(reservation_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                RESERVATION_FAILURES
                    .with_label_values(&["fulfill", "not_found"])
                    .inc();
                ServiceError::NotFound(format!("Reservation {} not found", reservation_id))
            })?;

        let lock = self.lock_for(reservation.record_id);
        let _guard = lock.lock().await;

        let mut attempt = 0;
        let (fulfilled, pruned) = loop {
            match self
                .fulfill_in_tx(reservation_id, fulfilled_by, notes.clone())
                .await
            {
                Ok(outcome) => break outcome,
                Err(ServiceError::DatabaseError(err))
                    if Self::is_retryable_conflict(&err) && attempt < self.max_conflict_retries =>
                {
                    attempt += 1;
                    warn!(
                        reservation_id = %reservation_id,
                        attempt = attempt,
                        error = %err,
                        "Retrying fulfillment after transient conflict"
                    );
                }
                Err(ServiceError::DatabaseError(err)) if Self::is_retryable_conflict(&err) => {
                    RESERVATION_FAILURES
                        .with_label_values(&["fulfill", "concurrency_conflict"])
                        .inc();
                    return Err(ServiceError::ConcurrencyConflict(reservation.record_id));
                }
                Err(err) => {
                    RESERVATION_FAILURES
                        .with_label_values(&["fulfill", Self::failure_label(&err)])
                        .inc();
                    return Err(err);
                }
            }
        };

        RESERVATIONS_FULFILLED.inc();
        info!(
            reservation_id = %fulfilled.id,
            record_id = %fulfilled.record_id,
            base_total = fulfilled.reserved_base_total,
            record_pruned = pruned,
            fulfilled_by = %fulfilled_by,
            "Reservation fulfilled"
        );

        self.event_sender
            .send(Event::ReservationFulfilled {
                reservation_id: fulfilled.id,
                record_id: fulfilled.record_id,
                sku: fulfilled.sku.clone(),
                warehouse: fulfilled.warehouse.clone(),
                level1: fulfilled.reserved_level1,
                level2: fulfilled.reserved_level2,
                level3: fulfilled.reserved_level3,
                base_total: fulfilled.reserved_base_total,
                record_pruned: pruned,
                fulfilled_by: fulfilled_by.to_string(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(FulfillOutcome {
            reservation: fulfilled,
            record_pruned: pruned,
        })
    }

    async fn fulfill_in_tx(
        &self,
        reservation_id: Uuid,
        fulfilled_by: &str,
        notes: Option<String>,
    ) -> Result<(stock_reservation::Model, bool), ServiceError> {
        let db = &*self.db_pool;
        let fulfilled_by = fulfilled_by.to_string();

        db.transaction::<_, (stock_reservation::Model, bool), ServiceError>(move |txn| {
            Box::pin(async move {
                let now = Utc::now();

                // Compare-and-set the status flip first: a cancel racing
                // this call loses here or makes this a zero-row update.
                let mut flip = StockReservationEntity::update_many()
                    .col_expr(
                        stock_reservation::Column::Status,
                        Expr::value(ReservationStatus::Fulfilled.as_str()),
                    )
                    .col_expr(stock_reservation::Column::FulfilledAt, Expr::value(now))
                    .col_expr(
                        stock_reservation::Column::FulfilledBy,
                        Expr::value(fulfilled_by.clone()),
                    )
                    .col_expr(stock_reservation::Column::UpdatedAt, Expr::value(now));
                if let Some(note) = notes {
                    flip = flip.col_expr(stock_reservation::Column::Notes, Expr::value(note));
                }
                let flipped = flip
                    .filter(stock_reservation::Column::Id.eq(reservation_id))
                    .filter(
                        stock_reservation::Column::Status.eq(ReservationStatus::Active.as_str()),
                    )
                    .exec(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                if flipped.rows_affected == 0 {
                    let existing = StockReservationEntity::find_by_id(reservation_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    return Err(match existing {
                        None => ServiceError::NotFound(format!(
                            "Reservation {} not found",
                            reservation_id
                        )),
                        Some(model) => ServiceError::AlreadyTerminal(model.status),
                    });
                }

                let reservation = StockReservationEntity::find_by_id(reservation_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::InternalError(
                            "reservation vanished mid-transaction".to_string(),
                        )
                    })?;

                let record = InventoryRecordEntity::find_by_id(reservation.record_id)
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::InventoryMismatch(format!(
                            "record {} no longer exists",
                            reservation.record_id
                        ))
                    })?;

                let checks = [
                    ("level1", reservation.reserved_level1, record.level1_quantity),
                    ("level2", reservation.reserved_level2, record.level2_quantity),
                    ("level3", reservation.reserved_level3, record.level3_quantity),
                ];
                for (dimension, reserved, held) in checks {
                    if held < reserved {
                        return Err(ServiceError::InventoryMismatch(format!(
                            "record {} holds {} {} but reservation {} earmarked {}",
                            record.id, held, dimension, reservation.id, reserved
                        )));
                    }
                }

                let moved = LevelQuantities::new(
                    reservation.reserved_level1,
                    reservation.reserved_level2,
                    reservation.reserved_level3,
                );
                let pruned =
                    InventoryRecordService::decrement_and_maybe_prune(txn, record, &moved).await?;

                Ok((reservation, pruned))
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        })
    }

    /// Fulfills each reservation independently with the same partial-success
    /// policy as bulk reserve.
    #[instrument(skip(self, ids))]
    pub async fn fulfill_bulk(&self, ids: Vec<Uuid>, fulfilled_by: &str) -> FulfillBulkOutcome {
        let mut outcome = FulfillBulkOutcome::default();

        for id in ids {
            match self.fulfill(id, fulfilled_by, None).await {
                Ok(result) => outcome.fulfilled.push(result),
                Err(err) => outcome.failures.push(FulfillFailure {
                    reservation_id: id,
                    error: err.to_string(),
                }),
            }
        }

        info!(
            fulfilled = outcome.fulfilled.len(),
            failed = outcome.failures.len(),
            "Bulk fulfill completed"
        );
        outcome
    }
}
