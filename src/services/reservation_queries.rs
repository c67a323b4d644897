//! Read-only filtering and aggregation over the reservation ledger.

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::stock_reservation::{
    self, Entity as StockReservationEntity, ReservationStatus,
};
use crate::errors::ServiceError;

/// Flat view of a reservation for API responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservationSummary {
    pub id: Uuid,
    pub record_id: Uuid,
    pub sku: String,
    pub warehouse: String,
    pub location: Option<String>,
    pub demand_ref: Option<String>,
    pub reserved_level1: i64,
    pub reserved_level2: i64,
    pub reserved_level3: i64,
    pub reserved_base_total: i64,
    pub rates_missing: bool,
    pub status: String,
    pub reserved_by: String,
    pub reserved_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub fulfilled_by: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancel_reason: Option<String>,
    pub notes: Option<String>,
}

impl From<stock_reservation::Model> for ReservationSummary {
    fn from(model: stock_reservation::Model) -> Self {
        Self {
            id: model.id,
            record_id: model.record_id,
            sku: model.sku,
            warehouse: model.warehouse,
            location: model.location,
            demand_ref: model.demand_ref,
            reserved_level1: model.reserved_level1,
            reserved_level2: model.reserved_level2,
            reserved_level3: model.reserved_level3,
            reserved_base_total: model.reserved_base_total,
            rates_missing: model.rates_missing,
            status: model.status,
            reserved_by: model.reserved_by,
            reserved_at: model.reserved_at,
            fulfilled_at: model.fulfilled_at,
            fulfilled_by: model.fulfilled_by,
            cancelled_at: model.cancelled_at,
            cancelled_by: model.cancelled_by,
            cancel_reason: model.cancel_reason,
            notes: model.notes,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationQueryFilters {
    pub warehouse: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub reserved_by: Option<String>,
    pub reserved_from: Option<DateTime<Utc>>,
    pub reserved_to: Option<DateTime<Utc>>,
    pub sku: Option<String>,
    pub record_id: Option<Uuid>,
    pub demand_ref: Option<String>,
}

/// Active-reservation load per warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WarehouseReservationSummary {
    pub warehouse: String,
    pub active_count: u64,
    pub reserved_base_total: i64,
}

/// Read-only queries over the reservation ledger.
#[derive(Clone)]
pub struct ReservationQueryService {
    db_pool: Arc<DatabaseConnection>,
}

impl ReservationQueryService {
    pub fn new(db_pool: Arc<DatabaseConnection>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn get_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<ReservationSummary>, ServiceError> {
        let db = &*self.db_pool;

        let reservation = StockReservationEntity::find_by_id(reservation_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(reservation.map(ReservationSummary::from))
    }

    /// Lists reservations with pagination and optional filters.
    #[instrument(skip(self, filters))]
    pub async fn query_reservations(
        &self,
        page: u64,
        limit: u64,
        filters: ReservationQueryFilters,
    ) -> Result<(Vec<ReservationSummary>, u64), ServiceError> {
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
        if let Some(status) = &filters.status {
            if ReservationStatus::from_str(status).is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "Unknown reservation status: {}",
                    status
                )));
            }
        }

        let db = &*self.db_pool;

        let mut query = StockReservationEntity::find();
        if let Some(warehouse) = filters.warehouse {
            query = query.filter(stock_reservation::Column::Warehouse.eq(warehouse));
        }
        if let Some(location) = filters.location {
            query = query.filter(stock_reservation::Column::Location.eq(location));
        }
        if let Some(status) = filters.status {
            query = query.filter(stock_reservation::Column::Status.eq(status));
        }
        if let Some(reserved_by) = filters.reserved_by {
            query = query.filter(stock_reservation::Column::ReservedBy.eq(reserved_by));
        }
        if let Some(from) = filters.reserved_from {
            query = query.filter(stock_reservation::Column::ReservedAt.gte(from));
        }
        if let Some(to) = filters.reserved_to {
            query = query.filter(stock_reservation::Column::ReservedAt.lte(to));
        }
        if let Some(sku) = filters.sku {
            query = query.filter(stock_reservation::Column::Sku.eq(sku));
        }
        if let Some(record_id) = filters.record_id {
            query = query.filter(stock_reservation::Column::RecordId.eq(record_id));
        }
        if let Some(demand_ref) = filters.demand_ref {
            query = query.filter(stock_reservation::Column::DemandRef.eq(demand_ref));
        }
        query = query.order_by_desc(stock_reservation::Column::ReservedAt);

        let paginator = query.paginate(db, limit);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::db_error)?;
        let models = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((models.into_iter().map(ReservationSummary::from).collect(), total))
    }

    /// Lists all reservations tied to one external demand line.
    #[instrument(skip(self))]
    pub async fn list_by_demand_ref(
        &self,
        demand_ref: &str,
    ) -> Result<Vec<ReservationSummary>, ServiceError> {
        let db = &*self.db_pool;

        let models = StockReservationEntity::find()
            .filter(stock_reservation::Column::DemandRef.eq(demand_ref))
            .order_by_desc(stock_reservation::Column::ReservedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(models.into_iter().map(ReservationSummary::from).collect())
    }

    /// Aggregates active reservations per warehouse: how many earmarks are
    /// open and how many frozen base units they pin down.
    #[instrument(skip(self))]
    pub async fn summary_by_warehouse(
        &self,
    ) -> Result<Vec<WarehouseReservationSummary>, ServiceError> {
        let db = &*self.db_pool;

        let active = StockReservationEntity::find()
            .filter(stock_reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut by_warehouse: BTreeMap<String, (u64, i64)> = BTreeMap::new();
        for reservation in active {
            let entry = by_warehouse.entry(reservation.warehouse).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += reservation.reserved_base_total;
        }

        Ok(by_warehouse
            .into_iter()
            .map(
                |(warehouse, (active_count, reserved_base_total))| WarehouseReservationSummary {
                    warehouse,
                    active_count,
                    reserved_base_total,
                },
            )
            .collect())
    }
}
