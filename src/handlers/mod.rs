pub mod conversion_rates;
pub mod inventory;
pub mod reservations;

use crate::db::DbPool;
use crate::events::EventSender;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub conversion_rates: Arc<crate::services::unit_conversion::ConversionRateService>,
    pub inventory_records: Arc<crate::services::inventory_records::InventoryRecordService>,
    pub availability: Arc<crate::services::availability::AvailabilityService>,
    pub reservations: Arc<crate::services::reservations::ReservationService>,
    pub reservation_queries: Arc<crate::services::reservation_queries::ReservationQueryService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        low_stock_threshold: i64,
        max_conflict_retries: u32,
    ) -> Self {
        let conversion_rates = Arc::new(
            crate::services::unit_conversion::ConversionRateService::new(
                db_pool.clone(),
                event_sender.clone(),
            ),
        );
        let inventory_records = Arc::new(
            crate::services::inventory_records::InventoryRecordService::new(
                db_pool.clone(),
                event_sender.clone(),
            ),
        );
        let availability = Arc::new(crate::services::availability::AvailabilityService::new(
            db_pool.clone(),
            low_stock_threshold,
        ));
        let reservations = Arc::new(crate::services::reservations::ReservationService::new(
            db_pool.clone(),
            event_sender.clone(),
            max_conflict_retries,
        ));
        let reservation_queries = Arc::new(
            crate::services::reservation_queries::ReservationQueryService::new(db_pool),
        );

        Self {
            conversion_rates,
            inventory_records,
            availability,
            reservations,
            reservation_queries,
        }
    }
}
