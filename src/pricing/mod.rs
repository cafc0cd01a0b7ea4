//! In-process fare and promo oracle.
//!
//! Fares are `(base + per_km * km + per_min * minutes)`, scaled by the peak
//! multiplier when peak pricing is on. Travel time is derived from the
//! straight-line distance and a configured average speed.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::TariffConfig;
use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::order::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tariff {
    pub base: u64,
    pub per_km: u64,
    pub per_min: u64,
    pub peak_multiplier: f64,
    pub peak_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

/// Partial tariff update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffUpdate {
    pub base: Option<u64>,
    pub per_km: Option<u64>,
    pub per_min: Option<u64>,
    pub peak_multiplier: Option<f64>,
    pub peak_enabled: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromoKind {
    #[default]
    Percent,
    Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promo {
    pub id: Uuid,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: PromoKind,
    pub value: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: PromoKind,
    pub value: f64,
    pub amount_before: u64,
    pub discount: u64,
    pub amount_after: u64,
}

pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub struct PricingOracle {
    tariff: RwLock<Tariff>,
    average_speed_kmh: f64,
    promos: DashMap<String, Promo>,
}

impl PricingOracle {
    pub fn new(config: &TariffConfig) -> Self {
        Self {
            tariff: RwLock::new(Tariff {
                base: config.base,
                per_km: config.per_km,
                per_min: config.per_min,
                peak_multiplier: config.peak_multiplier,
                peak_enabled: config.peak_enabled,
                updated_at: Utc::now(),
            }),
            average_speed_kmh: config.average_speed_kmh,
            promos: DashMap::new(),
        }
    }

    pub async fn tariff(&self) -> Tariff {
        self.tariff.read().await.clone()
    }

    pub async fn update_tariff(&self, update: TariffUpdate) -> Result<Tariff, AppError> {
        if let Some(multiplier) = update.peak_multiplier {
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(AppError::Validation(
                    "peakMultiplier must be a number >= 1".to_string(),
                ));
            }
        }

        let mut tariff = self.tariff.write().await;
        if let Some(base) = update.base {
            tariff.base = base;
        }
        if let Some(per_km) = update.per_km {
            tariff.per_km = per_km;
        }
        if let Some(per_min) = update.per_min {
            tariff.per_min = per_min;
        }
        if let Some(multiplier) = update.peak_multiplier {
            tariff.peak_multiplier = multiplier;
        }
        if let Some(enabled) = update.peak_enabled {
            tariff.peak_enabled = enabled;
        }
        tariff.updated_at = Utc::now();

        Ok(tariff.clone())
    }

    pub async fn estimate(&self, start: &GeoPoint, destination: &GeoPoint) -> u64 {
        let tariff = self.tariff.read().await;
        let km = haversine_km(start, destination);
        let minutes = if self.average_speed_kmh > 0.0 {
            km / self.average_speed_kmh * 60.0
        } else {
            0.0
        };

        let mut fare =
            tariff.base as f64 + tariff.per_km as f64 * km + tariff.per_min as f64 * minutes;
        if tariff.peak_enabled {
            fare *= tariff.peak_multiplier;
        }

        fare.round().max(0.0) as u64
    }

    /// Prices `amount` under an active promo code.
    pub fn discount(&self, code: &str, amount: u64) -> Result<Discount, AppError> {
        let code = normalize_code(code);
        let promo = self
            .promos
            .get(&code)
            .ok_or_else(|| AppError::NotFound(format!("promo code {code} not found")))?;

        if !promo.active {
            return Err(AppError::Conflict(format!("promo code {code} is inactive")));
        }

        let discount = match promo.kind {
            PromoKind::Percent => {
                (amount as f64 * promo.value.clamp(0.0, 100.0) / 100.0).round() as u64
            }
            PromoKind::Amount => promo.value.max(0.0).round() as u64,
        };

        Ok(Discount {
            code: promo.code.clone(),
            kind: promo.kind,
            value: promo.value,
            amount_before: amount,
            discount,
            amount_after: amount.saturating_sub(discount),
        })
    }

    pub fn create_promo(&self, code: &str, kind: PromoKind, value: f64, active: bool) -> Result<Promo, AppError> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(AppError::Validation("code is required".to_string()));
        }
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::Validation("value must be >= 0".to_string()));
        }
        if kind == PromoKind::Percent && value > 100.0 {
            return Err(AppError::Validation("percent value must be <= 100".to_string()));
        }

        match self.promos.entry(code.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!("promo code {code} already exists"))),
            Entry::Vacant(slot) => {
                let promo = Promo {
                    id: Uuid::new_v4(),
                    code,
                    kind,
                    value,
                    active,
                    created_at: Utc::now(),
                };
                slot.insert(promo.clone());
                Ok(promo)
            }
        }
    }

    pub fn list_promos(&self) -> Vec<Promo> {
        let mut promos: Vec<Promo> = self
            .promos
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        promos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        promos
    }

    pub fn toggle_promo(&self, id: Uuid) -> Result<Promo, AppError> {
        let mut promo = self
            .promos
            .iter_mut()
            .find(|entry| entry.value().id == id)
            .ok_or_else(|| AppError::NotFound(format!("promo {id} not found")))?;

        promo.active = !promo.active;
        Ok(promo.clone())
    }

    pub fn delete_promo(&self, id: Uuid) -> Result<(), AppError> {
        let code = self
            .promos
            .iter()
            .find(|entry| entry.value().id == id)
            .map(|entry| entry.key().clone())
            .ok_or_else(|| AppError::NotFound(format!("promo {id} not found")))?;

        self.promos.remove(&code);
        Ok(())
    }
}
