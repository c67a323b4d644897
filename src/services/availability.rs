//! On-demand availability: actual quantity minus the sum of currently
//! active reservations. Deliberately never stored and never cached, so the
//! ledger stays the single source of truth.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::conversion_rate::Entity as ConversionRateEntity;
use crate::entities::inventory_record::Entity as InventoryRecordEntity;
use crate::entities::stock_reservation::{
    self, Entity as StockReservationEntity, ReservationStatus,
};
use crate::errors::ServiceError;
use crate::services::unit_conversion::{self, LevelQuantities};

/// Total / reserved / available for one quantity dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LevelAvailability {
    pub total: i64,
    pub reserved: i64,
    pub available: i64,
}

impl LevelAvailability {
    fn new(total: i64, reserved: i64) -> Self {
        Self {
            total,
            reserved,
            available: total - reserved,
        }
    }
}

/// Snapshot of a record's availability, freshly recomputed per request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityView {
    pub record_id: Uuid,
    pub sku: String,
    pub warehouse: String,
    pub level1: LevelAvailability,
    pub level2: LevelAvailability,
    pub level3: LevelAvailability,
    pub base: LevelAvailability,
    /// Greedy container breakdown of the available base quantity, for
    /// display (cartons / boxes / pieces in the SKU's own unit names).
    pub available_display: LevelQuantities,
    pub rates_missing: bool,
    pub is_out_of_stock: bool,
    pub is_low_stock: bool,
}

/// Read-only pre-check result. Not authoritative: stock can move between
/// this answer and a subsequent `reserve`, which performs its own check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct CanReserve {
    pub can: bool,
    pub available: i64,
    pub shortfall: i64,
}

#[derive(Clone)]
pub struct AvailabilityService {
    db_pool: Arc<DatabaseConnection>,
    low_stock_threshold: i64,
}

impl AvailabilityService {
    pub fn new(db_pool: Arc<DatabaseConnection>, low_stock_threshold: i64) -> Self {
        Self {
            db_pool,
            low_stock_threshold,
        }
    }

    /// Derives the availability view for one record from the current ledger
    /// row and the current active-reservation sums.
    #[instrument(skip(self))]
    pub async fn available_for(&self, record_id: Uuid) -> Result<AvailabilityView, ServiceError> {
        let db = &*self.db_pool;

        let record = InventoryRecordEntity::find_by_id(record_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Inventory record {} not found", record_id))
            })?;

        let rates = ConversionRateEntity::find_by_id(record.sku.clone())
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;

        let active = StockReservationEntity::find()
            .filter(stock_reservation::Column::RecordId.eq(record.id))
            .filter(stock_reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
            .all(db)
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

        let base = LevelAvailability::new(record_base.total, reserved_base);
        let (available_display, display_rates_missing) =
            unit_conversion::to_display_breakdown(base.available.max(0), rates.as_ref());

        Ok(AvailabilityView {
            record_id: record.id,
            sku: record.sku,
            warehouse: record.warehouse,
            level1: LevelAvailability::new(record.level1_quantity, reserved1),
            level2: LevelAvailability::new(record.level2_quantity, reserved2),
            level3: LevelAvailability::new(record.level3_quantity, reserved3),
            available_display,
            rates_missing: record_base.rates_missing || display_rates_missing,
            is_out_of_stock: base.available <= 0,
            is_low_stock: base.available <= self.low_stock_threshold,
            base,
        })
    }

    /// Answers whether `requested_base` base units could be reserved right
    /// now. Callers must still handle `InsufficientStock` from `reserve`.
    #[instrument(skip(self))]
    pub async fn can_reserve(
        &self,
        record_id: Uuid,
        requested_base: i64,
    ) -> Result<CanReserve, ServiceError> {
        if requested_base < 0 {
            return Err(ServiceError::ValidationError(
                "requested base quantity must be non-negative".to_string(),
            ));
        }

        let view = self.available_for(record_id).await?;
        let available = view.base.available;

        Ok(CanReserve {
            can: requested_base <= available,
            available,
            shortfall: (requested_base - available).max(0),
        })
    }
}
