use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status for stock reservations.
///
/// A reservation is created `Active` and transitions exactly once to either
/// `Fulfilled` or `Cancelled`; both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Active,
    Fulfilled,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Fulfilled => "fulfilled",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ReservationStatus::Active),
            "fulfilled" => Some(ReservationStatus::Fulfilled),
            "cancelled" => Some(ReservationStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Active)
    }
}

/// An earmark against one inventory record.
///
/// `reserved_base_total` is computed once at creation with the then-current
/// conversion rate and frozen; rate changes never retroactively alter an
/// open reservation. The sku/warehouse/location columns are copied from the
/// record at creation so the reservation stays queryable after its record
/// is pruned.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub record_id: Uuid,
    pub sku: String,
    pub warehouse: String,
    pub location: Option<String>,
    /// Opaque reference to the external demand line (order line, quote, hold).
    pub demand_ref: Option<String>,
    pub reserved_level1: i64,
    pub reserved_level2: i64,
    pub reserved_level3: i64,
    pub reserved_base_total: i64,
    /// True when the frozen base total was computed by the naive-sum
    /// fallback because no conversion rate was configured for the SKU.
    pub rates_missing: bool,
    pub status: String, // Storing as string in DB, converted through ReservationStatus
    pub reserved_by: String,
    pub reserved_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub fulfilled_by: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancel_reason: Option<String>,
    pub notes: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
        }
        active_model.updated_at = Set(Some(now));

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservation_status_round_trip() {
        assert_eq!(ReservationStatus::Active.as_str(), "active");
        assert_eq!(ReservationStatus::Fulfilled.as_str(), "fulfilled");
        assert_eq!(
            ReservationStatus::from_str("cancelled"),
            Some(ReservationStatus::Cancelled)
        );
        assert_eq!(ReservationStatus::from_str("expired"), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!ReservationStatus::Active.is_terminal());
        assert!(ReservationStatus::Fulfilled.is_terminal());
        assert!(ReservationStatus::Cancelled.is_terminal());
    }
}
