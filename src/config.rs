use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub jwt_secret: String,
    pub frontend_base: String,
    pub pending_list_limit: usize,
    /// Seconds a revoked tracking token is kept before the sweeper drops it.
    pub tracking_retention_secs: i64,
    pub tariff: TariffConfig,
}

/// Default fare parameters, in integer currency units.
#[derive(Debug, Clone)]
pub struct TariffConfig {
    pub base: u64,
    pub per_km: u64,
    pub per_min: u64,
    pub peak_multiplier: f64,
    pub peak_enabled: bool,
    pub average_speed_kmh: f64,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            base: 300,
            per_km: 150,
            per_min: 40,
            peak_multiplier: 1.5,
            peak_enabled: false,
            average_speed_kmh: 20.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 4000,
            log_level: "info".to_string(),
            jwt_secret: "dev_secret_change_me".to_string(),
            frontend_base: "http://localhost:3000".to_string(),
            pending_list_limit: 50,
            tracking_retention_secs: 86_400,
            tariff: TariffConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Config::default();
        let tariff = defaults.tariff.clone();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            frontend_base: env::var("FRONTEND_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.frontend_base),
            pending_list_limit: parse_or_default("PENDING_LIST_LIMIT", defaults.pending_list_limit)?,
            tracking_retention_secs: parse_or_default(
                "TRACKING_RETENTION_SECS",
                defaults.tracking_retention_secs,
            )?,
            tariff: TariffConfig {
                base: parse_or_default("TARIFF_BASE", tariff.base)?,
                per_km: parse_or_default("TARIFF_PER_KM", tariff.per_km)?,
                per_min: parse_or_default("TARIFF_PER_MIN", tariff.per_min)?,
                peak_multiplier: parse_or_default("TARIFF_PEAK_MULTIPLIER", tariff.peak_multiplier)?,
                peak_enabled: parse_or_default("TARIFF_PEAK_ENABLED", tariff.peak_enabled)?,
                average_speed_kmh: parse_or_default("AVERAGE_SPEED_KMH", tariff.average_speed_kmh)?,
            },
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
