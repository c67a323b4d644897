//! Multi-level unit conversion.
//!
//! Every availability check and every deduction operates in base units
//! (level 3). The arithmetic here is the one place quantities cross between
//! the three per-level counts and the single comparable base total.

use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::conversion_rate::{self, Entity as ConversionRateEntity};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// A quantity expressed as counts of each packaging level, each in its own
/// unit. Level 3 is the atomic base unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, Validate,
)]
pub struct LevelQuantities {
    #[validate(range(min = 0))]
    pub level1: i64,
    #[validate(range(min = 0))]
    pub level2: i64,
    #[validate(range(min = 0))]
    pub level3: i64,
}

impl LevelQuantities {
    pub fn new(level1: i64, level2: i64, level3: i64) -> Self {
        Self {
            level1,
            level2,
            level3,
        }
    }

    pub fn is_non_negative(&self) -> bool {
        self.level1 >= 0 && self.level2 >= 0 && self.level3 >= 0
    }

    pub fn is_zero(&self) -> bool {
        self.level1 == 0 && self.level2 == 0 && self.level3 == 0
    }
}

/// A base-unit total plus whether the naive-sum fallback was taken because
/// the SKU has no configured conversion rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BaseTotal {
    pub total: i64,
    pub rates_missing: bool,
}

/// Converts per-level counts to base units.
///
/// With rates: `level1 * level1_rate + level2 * level2_rate + level3`.
/// Without rates the call still succeeds: the naive sum of the three counts
/// is returned with `rates_missing` set, and callers surface the flag.
pub fn to_base_units(
    quantities: &LevelQuantities,
    rates: Option<&conversion_rate::Model>,
) -> Result<BaseTotal, ServiceError> {
    let overflow = || ServiceError::ValidationError("quantity overflows base units".to_string());

    match rates {
        Some(r) => {
            let level1 = quantities.level1.checked_mul(r.level1_rate).ok_or_else(overflow)?;
            let level2 = quantities.level2.checked_mul(r.level2_rate).ok_or_else(overflow)?;
            let total = level1
                .checked_add(level2)
                .and_then(|t| t.checked_add(quantities.level3))
                .ok_or_else(overflow)?;
            Ok(BaseTotal {
                total,
                rates_missing: false,
            })
        }
        None => {
            let total = quantities
                .level1
                .checked_add(quantities.level2)
                .and_then(|t| t.checked_add(quantities.level3))
                .ok_or_else(overflow)?;
            Ok(BaseTotal {
                total,
                rates_missing: true,
            })
        }
    }
}

/// Greedy decomposition of a base quantity into per-level counts.
///
/// A zero or missing rate skips that level and the undivided remainder is
/// reported at level 3, with the `rates_missing` flag raised.
pub fn to_display_breakdown(
    base_total: i64,
    rates: Option<&conversion_rate::Model>,
) -> (LevelQuantities, bool) {
    let Some(r) = rates else {
        return (LevelQuantities::new(0, 0, base_total), true);
    };

    let (level1, remainder, skipped1) = if r.level1_rate >= 1 {
        (base_total / r.level1_rate, base_total % r.level1_rate, false)
    } else {
        (0, base_total, true)
    };

    let (level2, level3, skipped2) = if r.level2_rate >= 1 {
        (remainder / r.level2_rate, remainder % r.level2_rate, false)
    } else {
        (0, remainder, true)
    };

    (
        LevelQuantities::new(level1, level2, level3),
        skipped1 || skipped2,
    )
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct SetConversionRateCommand {
    #[validate(length(min = 1, max = 32))]
    pub level1_unit_name: String,
    #[validate(length(min = 1, max = 32))]
    pub level2_unit_name: String,
    #[validate(length(min = 1, max = 32))]
    pub level3_unit_name: String,
    /// Base units per level-1 container.
    #[validate(range(min = 1))]
    pub level1_rate: i64,
    /// Base units per level-2 container.
    #[validate(range(min = 1))]
    pub level2_rate: i64,
}

/// Service owning the per-SKU conversion rate table.
#[derive(Clone)]
pub struct ConversionRateService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ConversionRateService {
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_rates(
        &self,
        sku: &str,
    ) -> Result<Option<conversion_rate::Model>, ServiceError> {
        let db = &*self.db_pool;

        ConversionRateEntity::find_by_id(sku.to_string())
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Creates or replaces the conversion rate for a SKU.
    ///
    /// Open reservations are unaffected: their base totals were frozen at
    /// creation time.
    #[instrument(skip(self, command))]
    pub async fn set_rates(
        &self,
        sku: &str,
        command: SetConversionRateCommand,
    ) -> Result<conversion_rate::Model, ServiceError> {
        command.validate()?;
        if sku.is_empty() || sku.len() > 64 {
            return Err(ServiceError::ValidationError(
                "SKU must be between 1 and 64 characters".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let existing = ConversionRateEntity::find_by_id(sku.to_string())
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;

        let saved = match existing {
            Some(model) => {
                let mut active: conversion_rate::ActiveModel = model.into();
                active.level1_unit_name = Set(command.level1_unit_name.clone());
                active.level2_unit_name = Set(command.level2_unit_name.clone());
                active.level3_unit_name = Set(command.level3_unit_name.clone());
                active.level1_rate = Set(command.level1_rate);
                active.level2_rate = Set(command.level2_rate);
                active.update(db).await.map_err(ServiceError::db_error)?
            }
            None => {
                let active = conversion_rate::ActiveModel {
                    sku: Set(sku.to_string()),
                    level1_unit_name: Set(command.level1_unit_name.clone()),
                    level2_unit_name: Set(command.level2_unit_name.clone()),
                    level3_unit_name: Set(command.level3_unit_name.clone()),
                    level1_rate: Set(command.level1_rate),
                    level2_rate: Set(command.level2_rate),
                    ..Default::default()
                };
                active.insert(db).await.map_err(ServiceError::db_error)?
            }
        };

        info!(
            sku = %saved.sku,
            level1_rate = saved.level1_rate,
            level2_rate = saved.level2_rate,
            "Conversion rate set"
        );

        self.event_sender
            .send(Event::ConversionRateChanged {
                sku: saved.sku.clone(),
                level1_rate: saved.level1_rate,
                level2_rate: saved.level2_rate,
                changed_at: chrono::Utc::now(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(saved)
    }
}
