//! The quantity ledger: one record per SKU/warehouse/lot, three raw
//! per-level quantities, and the zero-quantity pruning rule.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::inventory_record::{self, Entity as InventoryRecordEntity};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::unit_conversion::LevelQuantities;

lazy_static! {
    static ref STOCK_ADJUSTMENTS: IntCounter = IntCounter::new(
        "stock_adjustments_total",
        "Total number of external stock adjustments"
    )
    .expect("metric can be created");
    static ref STOCK_ADJUSTMENT_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "stock_adjustment_failures_total",
            "Total number of failed stock adjustments"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ReceiveStockCommand {
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    #[validate(length(min = 1, max = 32))]
    pub warehouse: String,
    #[validate(length(max = 64))]
    pub location: Option<String>,
    #[validate(length(max = 64))]
    pub lot_number: Option<String>,
    pub manufacture_date: Option<NaiveDate>,
    #[validate]
    pub quantities: LevelQuantities,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct AdjustStockCommand {
    /// Signed per-level deltas, each in that level's own unit.
    pub level1_delta: i64,
    pub level2_delta: i64,
    pub level3_delta: i64,
    #[validate(length(min = 1, max = 64))]
    pub reason: String,
    #[validate(length(min = 1, max = 64))]
    pub adjusted_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdjustStockResult {
    pub record_id: Uuid,
    pub sku: String,
    pub warehouse: String,
    pub level1_quantity: i64,
    pub level2_quantity: i64,
    pub level3_quantity: i64,
    /// True when the adjustment drove every level to zero and the record
    /// was deleted rather than kept as a zero row.
    pub record_pruned: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilters {
    pub sku: Option<String>,
    pub warehouse: Option<String>,
}

/// Service for the inventory record ledger.
#[derive(Clone)]
pub struct InventoryRecordService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl InventoryRecordService {
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a ledger record for newly received stock.
    #[instrument(skip(self, command))]
    pub async fn receive_stock(
        &self,
        command: ReceiveStockCommand,
    ) -> Result<inventory_record::Model, ServiceError> {
        command.validate()?;
        if !command.quantities.is_non_negative() {
            return Err(ServiceError::ValidationError(
                "received quantities must be non-negative".to_string(),
            ));
        }
        if command.quantities.is_zero() {
            return Err(ServiceError::ValidationError(
                "received quantities must not all be zero".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let active = inventory_record::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(command.sku.clone()),
            warehouse: Set(command.warehouse.clone()),
            location: Set(command.location.clone()),
            lot_number: Set(command.lot_number.clone()),
            manufacture_date: Set(command.manufacture_date),
            level1_quantity: Set(command.quantities.level1),
            level2_quantity: Set(command.quantities.level2),
            level3_quantity: Set(command.quantities.level3),
            ..Default::default()
        };

        let record = active.insert(db).await.map_err(ServiceError::db_error)?;

        info!(
            record_id = %record.id,
            sku = %record.sku,
            warehouse = %record.warehouse,
            "Stock received"
        );

        self.event_sender
            .send(Event::StockReceived {
                record_id: record.id,
                sku: record.sku.clone(),
                warehouse: record.warehouse.clone(),
                level1: record.level1_quantity,
                level2: record.level2_quantity,
                level3: record.level3_quantity,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn get_record(
        &self,
        record_id: Uuid,
    ) -> Result<Option<inventory_record::Model>, ServiceError> {
        let db = &*self.db_pool;

        InventoryRecordEntity::find_by_id(record_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists ledger records with pagination and optional SKU/warehouse filters.
    #[instrument(skip(self))]
    pub async fn list_records(
        &self,
        page: u64,
        limit: u64,
        filters: RecordFilters,
    ) -> Result<(Vec<inventory_record::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }
        if limit == 0 || limit > 1000 {
            return Err(ServiceError::ValidationError(
                "Limit must be between 1 and 1000".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let mut query = InventoryRecordEntity::find();
        if let Some(sku) = filters.sku {
            query = query.filter(inventory_record::Column::Sku.eq(sku));
        }
        if let Some(warehouse) = filters.warehouse {
            query = query.filter(inventory_record::Column::Warehouse.eq(warehouse));
        }
        query = query.order_by_desc(inventory_record::Column::CreatedAt);

        let paginator = query.paginate(db, limit);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::db_error)?;
        let records = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((records, total))
    }

    /// External stock-adjustment surface: applies signed per-level deltas
    /// inside one transaction, refusing any level that would go negative.
    /// Drives the same pruning rule as fulfillment.
    #[instrument(skip(self, command))]
    pub async fn adjust_stock(
        &self,
        record_id: Uuid,
        command: AdjustStockCommand,
    ) -> Result<AdjustStockResult, ServiceError> {
        command.validate().map_err(|e| {
            STOCK_ADJUSTMENT_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            ServiceError::ValidationError(e.to_string())
        })?;

        let db = &*self.db_pool;
        let cmd = command.clone();

        let result = db
            .transaction::<_, AdjustStockResult, ServiceError>(move |txn| {
                Box::pin(async move {
                    let record = InventoryRecordEntity::find_by_id(record_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Inventory record {} not found",
                                record_id
                            ))
                        })?;

                    let level1 = record.level1_quantity + cmd.level1_delta;
                    let level2 = record.level2_quantity + cmd.level2_delta;
                    let level3 = record.level3_quantity + cmd.level3_delta;
                    if level1 < 0 || level2 < 0 || level3 < 0 {
                        return Err(ServiceError::ValidationError(
                            "adjustment would drive a quantity negative".to_string(),
                        ));
                    }

                    let pruned = if level1 == 0 && level2 == 0 && level3 == 0 {
                        InventoryRecordEntity::delete_by_id(record.id)
                            .exec(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        true
                    } else {
                        let mut active: inventory_record::ActiveModel = record.clone().into();
                        active.level1_quantity = Set(level1);
                        active.level2_quantity = Set(level2);
                        active.level3_quantity = Set(level3);
                        active.update(txn).await.map_err(ServiceError::db_error)?;
                        false
                    };

                    Ok(AdjustStockResult {
                        record_id: record.id,
                        sku: record.sku.clone(),
                        warehouse: record.warehouse.clone(),
                        level1_quantity: level1,
                        level2_quantity: level2,
                        level3_quantity: level3,
                        record_pruned: pruned,
                    })
                })
            })
            .await
            .map_err(|e| {
                error!("Transaction failed for stock adjustment: {}", e);
                match e {
                    TransactionError::Connection(db_err) => {
                        STOCK_ADJUSTMENT_FAILURES
                            .with_label_values(&["db_error"])
                            .inc();
                        ServiceError::DatabaseError(db_err)
                    }
                    TransactionError::Transaction(service_err) => {
                        STOCK_ADJUSTMENT_FAILURES
                            .with_label_values(&["rejected"])
                            .inc();
                        service_err
                    }
                }
            })?;

        STOCK_ADJUSTMENTS.inc();

        self.event_sender
            .send(Event::StockAdjusted {
                record_id,
                sku: result.sku.clone(),
                warehouse: result.warehouse.clone(),
                level1_delta: command.level1_delta,
                level2_delta: command.level2_delta,
                level3_delta: command.level3_delta,
                reason: command.reason.clone(),
                adjusted_by: command.adjusted_by.clone(),
                record_pruned: result.record_pruned,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(result)
    }

    /// Subtracts the three level quantities inside the caller's transaction
    /// and deletes the record when every level reaches zero.
    ///
    /// The caller has already verified each level is sufficient; the guard
    /// here is the last line before the ledger would go negative.
    pub async fn decrement_and_maybe_prune<C: ConnectionTrait>(
        conn: &C,
        record: inventory_record::Model,
        levels: &LevelQuantities,
    ) -> Result<bool, ServiceError> {
        let level1 = record.level1_quantity - levels.level1;
        let level2 = record.level2_quantity - levels.level2;
        let level3 = record.level3_quantity - levels.level3;
        if level1 < 0 || level2 < 0 || level3 < 0 {
            return Err(ServiceError::InventoryMismatch(format!(
                "record {} holds less than the quantity being deducted",
                record.id
            )));
        }

        if level1 == 0 && level2 == 0 && level3 == 0 {
            InventoryRecordEntity::delete_by_id(record.id)
                .exec(conn)
                .await
                .map_err(ServiceError::db_error)?;
            return Ok(true);
        }

        let mut active: inventory_record::ActiveModel = record.into();
        active.level1_quantity = Set(level1);
        active.level2_quantity = Set(level2);
        active.level3_quantity = Set(level3);
        active.update(conn).await.map_err(ServiceError::db_error)?;

        Ok(false)
    }
}
