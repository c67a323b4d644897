#![allow(dead_code)]

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use stockroom_api::entities::inventory_record;
use stockroom_api::events::{Event, EventSender};
use stockroom_api::handlers::AppServices;
use stockroom_api::services::inventory_records::ReceiveStockCommand;
use stockroom_api::services::reservations::ReserveStockCommand;
use stockroom_api::services::unit_conversion::{LevelQuantities, SetConversionRateCommand};

pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub services: AppServices,
    /// Kept alive for the whole test so audit sends never fail; tests that
    /// care about emissions read from it directly.
    pub events: mpsc::Receiver<Event>,
}

/// In-memory database with migrations applied and services wired the way
/// `main` wires them.
pub async fn setup() -> TestContext {
    let pool = stockroom_api::db::establish_connection("sqlite::memory:")
        .await
        .expect("db connect");
    stockroom_api::db::run_migrations(&pool)
        .await
        .expect("run migrations");

    let db = Arc::new(pool);
    let (tx, rx) = mpsc::channel(1024);
    let sender = EventSender::new(tx);
    let services = AppServices::new(db.clone(), sender, 10, 3);

    TestContext {
        db,
        services,
        events: rx,
    }
}

pub async fn seed_rates(ctx: &TestContext, sku: &str, level1_rate: i64, level2_rate: i64) {
    ctx.services
        .conversion_rates
        .set_rates(
            sku,
            SetConversionRateCommand {
                level1_unit_name: "carton".into(),
                level2_unit_name: "box".into(),
                level3_unit_name: "piece".into(),
                level1_rate,
                level2_rate,
            },
        )
        .await
        .expect("seed rates");
}

pub async fn seed_record(
    ctx: &TestContext,
    sku: &str,
    warehouse: &str,
    level1: i64,
    level2: i64,
    level3: i64,
) -> inventory_record::Model {
    ctx.services
        .inventory_records
        .receive_stock(ReceiveStockCommand {
            sku: sku.into(),
            warehouse: warehouse.into(),
            location: Some("A-01".into()),
            lot_number: None,
            manufacture_date: None,
            quantities: LevelQuantities::new(level1, level2, level3),
        })
        .await
        .expect("seed record")
}

pub fn reserve_cmd(
    record_id: Uuid,
    level1: i64,
    level2: i64,
    level3: i64,
    requested_by: &str,
) -> ReserveStockCommand {
    ReserveStockCommand {
        record_id,
        quantities: LevelQuantities::new(level1, level2, level3),
        expected_base_total: None,
        demand_ref: None,
        requested_by: requested_by.into(),
        notes: None,
    }
}

/// Drains the event channel until a matching event shows up or it goes
/// quiet for a second.
pub async fn wait_for_event<F>(ctx: &mut TestContext, mut matches: F) -> Option<Event>
where
    F: FnMut(&Event) -> bool,
{
    loop {
        match tokio::time::timeout(Duration::from_secs(1), ctx.events.recv()).await {
            Ok(Some(event)) if matches(&event) => return Some(event),
            Ok(Some(_)) => continue,
            _ => return None,
        }
    }
}
