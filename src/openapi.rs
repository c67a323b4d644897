use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stockroom API",
        version = "0.2.0",
        description = r#"
# Stockroom Warehouse API

Warehouse inventory administration with a stock reservation engine.

- **Inventory ledger**: per-SKU/warehouse/lot records tracking level-1,
  level-2 and base-unit quantities, pruned when exhausted
- **Reservations**: earmark stock for a demand line, then fulfill or cancel
- **Availability**: on-demand availability derived from the ledger and the
  active reservations, never cached
- **Unit conversion**: per-SKU container rates normalizing everything to
  base units

Bulk operations report per-item outcomes; one item failing never rolls back
the others.
"#,
        license(name = "MIT")
    ),
    paths(
        // Inventory
        crate::handlers::inventory::receive_stock,
        crate::handlers::inventory::list_inventory,
        crate::handlers::inventory::get_inventory_record,
        crate::handlers::inventory::adjust_stock,
        crate::handlers::inventory::get_availability,
        crate::handlers::inventory::can_reserve,

        // Conversion rates
        crate::handlers::conversion_rates::get_rates,
        crate::handlers::conversion_rates::set_rates,

        // Reservations
        crate::handlers::reservations::reserve_stock,
        crate::handlers::reservations::bulk_reserve,
        crate::handlers::reservations::query_reservations,
        crate::handlers::reservations::get_reservation,
        crate::handlers::reservations::list_by_demand_ref,
        crate::handlers::reservations::cancel_reservation,
        crate::handlers::reservations::fulfill_reservation,
        crate::handlers::reservations::fulfill_bulk,
        crate::handlers::reservations::summary_by_warehouse,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,

            // Inventory types
            crate::handlers::inventory::InventoryRecordResponse,
            crate::services::inventory_records::ReceiveStockCommand,
            crate::services::inventory_records::AdjustStockCommand,
            crate::services::inventory_records::AdjustStockResult,
            crate::services::availability::AvailabilityView,
            crate::services::availability::LevelAvailability,
            crate::services::availability::CanReserve,

            // Conversion rate types
            crate::handlers::conversion_rates::ConversionRateResponse,
            crate::services::unit_conversion::SetConversionRateCommand,
            crate::services::unit_conversion::LevelQuantities,
            crate::services::unit_conversion::BaseTotal,

            // Reservation types
            crate::services::reservations::ReserveStockCommand,
            crate::services::reservation_queries::ReservationSummary,
            crate::services::reservation_queries::WarehouseReservationSummary,
            crate::handlers::reservations::BulkReserveRequest,
            crate::handlers::reservations::BulkReserveResponse,
            crate::handlers::reservations::BulkReserveItemFailure,
            crate::handlers::reservations::CancelReservationRequest,
            crate::handlers::reservations::FulfillReservationRequest,
            crate::handlers::reservations::FulfillReservationResponse,
            crate::handlers::reservations::FulfillBulkRequest,
            crate::handlers::reservations::FulfillBulkResponse,
            crate::handlers::reservations::FulfillBulkItemFailure,

            // Error types
            crate::errors::ErrorResponse,
            crate::errors::StockShortfall
        )
    ),
    tags(
        (name = "inventory", description = "Quantity ledger and availability"),
        (name = "conversion-rates", description = "Per-SKU packaging rates"),
        (name = "reservations", description = "Stock reservation lifecycle and queries")
    )
)]
pub struct ApiDocV1;

/// Serves the generated document as plain JSON.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_includes_core_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string(&openapi).unwrap();
        assert!(json.contains("Stockroom API"));
        assert!(json.contains("/api/v1/reservations"));
        assert!(json.contains("/api/v1/inventory"));
    }
}
