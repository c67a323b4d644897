use crate::errors::ServiceError;
use crate::services::reservation_queries::{
    ReservationQueryFilters, ReservationSummary, WarehouseReservationSummary,
};
use crate::services::reservations::ReserveStockCommand;
use crate::AppState;
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{ApiResponse, ApiResult, PaginatedResponse};

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkReserveRequest {
    pub items: Vec<ReserveStockCommand>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkReserveItemFailure {
    pub index: usize,
    pub record_id: Uuid,
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkReserveResponse {
    pub succeeded_count: usize,
    pub failed_count: usize,
    pub succeeded: Vec<ReservationSummary>,
    pub failed: Vec<BulkReserveItemFailure>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelReservationRequest {
    pub requested_by: String,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FulfillReservationRequest {
    pub requested_by: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FulfillReservationResponse {
    pub reservation: ReservationSummary,
    pub record_pruned: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FulfillBulkRequest {
    pub reservation_ids: Vec<Uuid>,
    pub requested_by: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FulfillBulkItemFailure {
    pub reservation_id: Uuid,
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FulfillBulkResponse {
    pub fulfilled_count: usize,
    pub failed_count: usize,
    pub failures: Vec<FulfillBulkItemFailure>,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct ReservationFilters {
    pub warehouse: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub reserved_by: Option<String>,
    pub reserved_from: Option<DateTime<Utc>>,
    pub reserved_to: Option<DateTime<Utc>>,
    pub sku: Option<String>,
    pub record_id: Option<Uuid>,
    pub demand_ref: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Create the reservations router
pub fn reservations_router() -> Router<AppState> {
    Router::new()
        .route("/", post(reserve_stock).get(query_reservations))
        .route("/bulk", post(bulk_reserve))
        .route("/fulfill-bulk", post(fulfill_bulk))
        .route("/summary/by-warehouse", get(summary_by_warehouse))
        .route("/by-demand/:demand_ref", get(list_by_demand_ref))
        .route("/:id", get(get_reservation))
        .route("/:id/cancel", post(cancel_reservation))
        .route("/:id/fulfill", post(fulfill_reservation))
}

/// Earmark stock for a pending demand line
#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    request_body = ReserveStockCommand,
    responses(
        (status = 200, description = "Reservation created", body = ApiResponse<ReservationSummary>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Record not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "reservations"
)]
pub async fn reserve_stock(
    State(state): State<AppState>,
    Json(payload): Json<ReserveStockCommand>,
) -> ApiResult<ReservationSummary> {
    let reservation = state.services.reservations.reserve(payload).await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}

/// Reserve several items independently; partial success is reported per item
#[utoipa::path(
    post,
    path = "/api/v1/reservations/bulk",
    request_body = BulkReserveRequest,
    responses(
        (status = 200, description = "Per-item outcome returned", body = ApiResponse<BulkReserveResponse>)
    ),
    tag = "reservations"
)]
pub async fn bulk_reserve(
    State(state): State<AppState>,
    Json(payload): Json<BulkReserveRequest>,
) -> ApiResult<BulkReserveResponse> {
    let outcome = state.services.reservations.bulk_reserve(payload.items).await;

    Ok(Json(ApiResponse::success(BulkReserveResponse {
        succeeded_count: outcome.succeeded.len(),
        failed_count: outcome.failed.len(),
        succeeded: outcome
            .succeeded
            .into_iter()
            .map(ReservationSummary::from)
            .collect(),
        failed: outcome
            .failed
            .into_iter()
            .map(|f| BulkReserveItemFailure {
                index: f.index,
                record_id: f.record_id,
                error: f.error,
            })
            .collect(),
    })))
}

/// Query the reservation ledger
#[utoipa::path(
    get,
    path = "/api/v1/reservations",
    params(ReservationFilters),
    responses(
        (status = 200, description = "Reservations returned", body = ApiResponse<PaginatedResponse<ReservationSummary>>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "reservations"
)]
pub async fn query_reservations(
    State(state): State<AppState>,
    Query(filters): Query<ReservationFilters>,
) -> ApiResult<PaginatedResponse<ReservationSummary>> {
    let page = filters.page.unwrap_or(1);
    let limit = filters.limit.unwrap_or(50);

    let (items, total) = state
        .services
        .reservation_queries
        .query_reservations(
            page,
            limit,
            ReservationQueryFilters {
                warehouse: filters.warehouse,
                location: filters.location,
                status: filters.status,
                reserved_by: filters.reserved_by,
                reserved_from: filters.reserved_from,
                reserved_to: filters.reserved_to,
                sku: filters.sku,
                record_id: filters.record_id,
                demand_ref: filters.demand_ref,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages: total.div_ceil(limit),
    })))
}

/// Get one reservation
#[utoipa::path(
    get,
    path = "/api/v1/reservations/{id}",
    params(("id" = Uuid, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Reservation returned", body = ApiResponse<ReservationSummary>),
        (status = 404, description = "Reservation not found", body = crate::errors::ErrorResponse)
    ),
    tag = "reservations"
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ReservationSummary> {
    let reservation = state
        .services
        .reservation_queries
        .get_reservation(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Reservation {} not found", id)))?;

    Ok(Json(ApiResponse::success(reservation)))
}

/// List reservations tied to one external demand line
#[utoipa::path(
    get,
    path = "/api/v1/reservations/by-demand/{demand_ref}",
    params(("demand_ref" = String, Path, description = "External demand line reference")),
    responses(
        (status = 200, description = "Reservations returned", body = ApiResponse<Vec<ReservationSummary>>)
    ),
    tag = "reservations"
)]
pub async fn list_by_demand_ref(
    State(state): State<AppState>,
    Path(demand_ref): Path<String>,
) -> ApiResult<Vec<ReservationSummary>> {
    let reservations = state
        .services
        .reservation_queries
        .list_by_demand_ref(&demand_ref)
        .await?;

    Ok(Json(ApiResponse::success(reservations)))
}

/// Release an active reservation
#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/cancel",
    params(("id" = Uuid, Path, description = "Reservation id")),
    request_body = CancelReservationRequest,
    responses(
        (status = 200, description = "Reservation cancelled", body = ApiResponse<ReservationSummary>),
        (status = 404, description = "Reservation not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Reservation already terminal", body = crate::errors::ErrorResponse)
    ),
    tag = "reservations"
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelReservationRequest>,
) -> ApiResult<ReservationSummary> {
    let cancelled = state
        .services
        .reservations
        .cancel(id, &payload.requested_by, payload.reason)
        .await?;

    Ok(Json(ApiResponse::success(cancelled.into())))
}

/// Convert an active reservation into an inventory deduction
#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/fulfill",
    params(("id" = Uuid, Path, description = "Reservation id")),
    request_body = FulfillReservationRequest,
    responses(
        (status = 200, description = "Reservation fulfilled", body = ApiResponse<FulfillReservationResponse>),
        (status = 404, description = "Reservation not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already terminal or inventory mismatch", body = crate::errors::ErrorResponse)
    ),
    tag = "reservations"
)]
pub async fn fulfill_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FulfillReservationRequest>,
) -> ApiResult<FulfillReservationResponse> {
    let outcome = state
        .services
        .reservations
        .fulfill(id, &payload.requested_by, payload.notes)
        .await?;

    Ok(Json(ApiResponse::success(FulfillReservationResponse {
        reservation: outcome.reservation.into(),
        record_pruned: outcome.record_pruned,
    })))
}

/// Fulfill several reservations independently
#[utoipa::path(
    post,
    path = "/api/v1/reservations/fulfill-bulk",
    request_body = FulfillBulkRequest,
    responses(
        (status = 200, description = "Per-item outcome returned", body = ApiResponse<FulfillBulkResponse>)
    ),
    tag = "reservations"
)]
pub async fn fulfill_bulk(
    State(state): State<AppState>,
    Json(payload): Json<FulfillBulkRequest>,
) -> ApiResult<FulfillBulkResponse> {
    let outcome = state
        .services
        .reservations
        .fulfill_bulk(payload.reservation_ids, &payload.requested_by)
        .await;

    Ok(Json(ApiResponse::success(FulfillBulkResponse {
        fulfilled_count: outcome.fulfilled.len(),
        failed_count: outcome.failures.len(),
        failures: outcome
            .failures
            .into_iter()
            .map(|f| FulfillBulkItemFailure {
                reservation_id: f.reservation_id,
                error: f.error,
            })
            .collect(),
    })))
}

/// Active-reservation load grouped by warehouse
#[utoipa::path(
    get,
    path = "/api/v1/reservations/summary/by-warehouse",
    responses(
        (status = 200, description = "Summary returned", body = ApiResponse<Vec<WarehouseReservationSummary>>)
    ),
    tag = "reservations"
)]
pub async fn summary_by_warehouse(
    State(state): State<AppState>,
) -> ApiResult<Vec<WarehouseReservationSummary>> {
    let summary = state
        .services
        .reservation_queries
        .summary_by_warehouse()
        .await?;

    Ok(Json(ApiResponse::success(summary)))
}
