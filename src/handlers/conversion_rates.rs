use crate::entities::conversion_rate;
use crate::errors::ServiceError;
use crate::services::unit_conversion::SetConversionRateCommand;
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{ApiResponse, ApiResult};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversionRateResponse {
    pub sku: String,
    pub level1_unit_name: String,
    pub level2_unit_name: String,
    pub level3_unit_name: String,
    pub level1_rate: i64,
    pub level2_rate: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<conversion_rate::Model> for ConversionRateResponse {
    fn from(model: conversion_rate::Model) -> Self {
        Self {
            sku: model.sku,
            level1_unit_name: model.level1_unit_name,
            level2_unit_name: model.level2_unit_name,
            level3_unit_name: model.level3_unit_name,
            level1_rate: model.level1_rate,
            level2_rate: model.level2_rate,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Create the conversion rates router
pub fn conversion_rates_router() -> Router<AppState> {
    Router::new().route("/:sku", get(get_rates).put(set_rates))
}

/// Get the conversion rate configured for a SKU
#[utoipa::path(
    get,
    path = "/api/v1/conversion-rates/{sku}",
    params(("sku" = String, Path, description = "Item SKU")),
    responses(
        (status = 200, description = "Conversion rate returned", body = ApiResponse<ConversionRateResponse>),
        (status = 404, description = "No rate configured", body = crate::errors::ErrorResponse)
    ),
    tag = "conversion-rates"
)]
pub async fn get_rates(
    State(state): State<AppState>,
    Path(sku): Path<String>,
) -> ApiResult<ConversionRateResponse> {
    let rates = state
        .services
        .conversion_rates
        .get_rates(&sku)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("No conversion rate configured for SKU {}", sku))
        })?;

    Ok(Json(ApiResponse::success(rates.into())))
}

/// Create or replace the conversion rate for a SKU
#[utoipa::path(
    put,
    path = "/api/v1/conversion-rates/{sku}",
    params(("sku" = String, Path, description = "Item SKU")),
    request_body = SetConversionRateCommand,
    responses(
        (status = 200, description = "Conversion rate saved", body = ApiResponse<ConversionRateResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "conversion-rates"
)]
pub async fn set_rates(
    State(state): State<AppState>,
    Path(sku): Path<String>,
    Json(payload): Json<SetConversionRateCommand>,
) -> ApiResult<ConversionRateResponse> {
    let saved = state
        .services
        .conversion_rates
        .set_rates(&sku, payload)
        .await?;

    Ok(Json(ApiResponse::success(saved.into())))
}
