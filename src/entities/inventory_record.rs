use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of the quantity ledger: a SKU held at a warehouse location,
/// optionally tied to a lot/batch.
///
/// The three quantities are stored in their own unit (level-1 containers,
/// level-2 containers, loose base units) and are never pre-converted.
/// A record whose three quantities all reach zero is deleted rather than
/// persisted as a zero row, so the location slot frees up immediately; the
/// audit sink captures the history the pruned row loses.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub sku: String,
    pub warehouse: String,
    pub location: Option<String>,
    pub lot_number: Option<String>,
    pub manufacture_date: Option<NaiveDate>,
    pub level1_quantity: i64,
    pub level2_quantity: i64,
    pub level3_quantity: i64,
    pub created_at: DateTime<Utc>,
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
            active_model.created_at = Set(now);

            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
        }
        active_model.updated_at = Set(Some(now));

        Ok(active_model)
    }
}
