use crate::errors::ServiceError;
use crate::services::availability::{AvailabilityView, CanReserve};
use crate::services::inventory_records::{
    AdjustStockCommand, AdjustStockResult, ReceiveStockCommand, RecordFilters,
};
use crate::AppState;
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::inventory_record;
use crate::{ApiResponse, ApiResult, PaginatedResponse};

/// API view of one quantity-ledger row.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InventoryRecordResponse {
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

impl From<inventory_record::Model> for InventoryRecordResponse {
    fn from(model: inventory_record::Model) -> Self {
        Self {
            id: model.id,
            sku: model.sku,
            warehouse: model.warehouse,
            location: model.location,
            lot_number: model.lot_number,
            manufacture_date: model.manufacture_date,
            level1_quantity: model.level1_quantity,
            level2_quantity: model.level2_quantity,
            level3_quantity: model.level3_quantity,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct InventoryFilters {
    pub sku: Option<String>,
    pub warehouse: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct CanReserveQuery {
    /// Requested quantity in base units.
    pub requested_base: i64,
}

/// Create the inventory router
pub fn inventory_router() -> Router<AppState> {
    Router::new()
        .route("/", post(receive_stock).get(list_inventory))
        .route("/:id", get(get_inventory_record))
        .route("/:id/adjust", post(adjust_stock))
        .route("/:id/availability", get(get_availability))
        .route("/:id/can-reserve", get(can_reserve))
}

/// Receive stock into the ledger, creating a new inventory record
#[utoipa::path(
    post,
    path = "/api/v1/inventory",
    request_body = ReceiveStockCommand,
    responses(
        (status = 200, description = "Inventory record created", body = ApiResponse<InventoryRecordResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn receive_stock(
    State(state): State<AppState>,
    Json(payload): Json<ReceiveStockCommand>,
) -> ApiResult<InventoryRecordResponse> {
    let record = state.services.inventory_records.receive_stock(payload).await?;
    Ok(Json(ApiResponse::success(record.into())))
}

/// List inventory records with optional filtering
#[utoipa::path(
    get,
    path = "/api/v1/inventory",
    params(InventoryFilters),
    responses(
        (status = 200, description = "Inventory list returned", body = ApiResponse<PaginatedResponse<InventoryRecordResponse>>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn list_inventory(
    State(state): State<AppState>,
    Query(filters): Query<InventoryFilters>,
) -> ApiResult<PaginatedResponse<InventoryRecordResponse>> {
    let page = filters.page.unwrap_or(1);
    let limit = filters.limit.unwrap_or(50);

    let (records, total) = state
        .services
        .inventory_records
        .list_records(
            page,
            limit,
            RecordFilters {
                sku: filters.sku,
                warehouse: filters.warehouse,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: records.into_iter().map(InventoryRecordResponse::from).collect(),
        total,
        page,
        limit,
        total_pages: total.div_ceil(limit),
    })))
}

/// Get a single inventory record
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}",
    params(("id" = Uuid, Path, description = "Inventory record id")),
    responses(
        (status = 200, description = "Inventory record returned", body = ApiResponse<InventoryRecordResponse>),
        (status = 404, description = "Record not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn get_inventory_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<InventoryRecordResponse> {
    let record = state
        .services
        .inventory_records
        .get_record(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Inventory record {} not found", id)))?;

    Ok(Json(ApiResponse::success(record.into())))
}

/// Apply an external stock adjustment to a record
#[utoipa::path(
    post,
    path = "/api/v1/inventory/{id}/adjust",
    params(("id" = Uuid, Path, description = "Inventory record id")),
    request_body = AdjustStockCommand,
    responses(
        (status = 200, description = "Adjustment applied", body = ApiResponse<AdjustStockResult>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Record not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustStockCommand>,
) -> ApiResult<AdjustStockResult> {
    let result = state
        .services
        .inventory_records
        .adjust_stock(id, payload)
        .await?;

    Ok(Json(ApiResponse::success(result)))
}

/// Current availability for a record, recomputed on demand
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}/availability",
    params(("id" = Uuid, Path, description = "Inventory record id")),
    responses(
        (status = 200, description = "Availability returned", body = ApiResponse<AvailabilityView>),
        (status = 404, description = "Record not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn get_availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<AvailabilityView> {
    let view = state.services.availability.available_for(id).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Read-only pre-check for a prospective reservation
#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}/can-reserve",
    params(
        ("id" = Uuid, Path, description = "Inventory record id"),
        CanReserveQuery
    ),
    responses(
        (status = 200, description = "Pre-check result returned", body = ApiResponse<CanReserve>),
        (status = 404, description = "Record not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn can_reserve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CanReserveQuery>,
) -> ApiResult<CanReserve> {
    let answer = state
        .services
        .availability
        .can_reserve(id, query.requested_base)
        .await?;

    Ok(Json(ApiResponse::success(answer)))
}
