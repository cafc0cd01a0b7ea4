use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::JwtVerifier;
use crate::config::Config;
use crate::ledger::{InMemoryLedger, TripLedger};
use crate::models::driver::DriverProfile;
use crate::notify::NotificationHub;
use crate::observability::metrics::Metrics;
use crate::pricing::PricingOracle;
use crate::tracking::TrackingTokens;

pub struct AppState {
    pub config: Config,
    pub ledger: Arc<dyn TripLedger>,
    pub drivers: DashMap<Uuid, DriverProfile>,
    rating_refresh: DashMap<Uuid, Arc<Mutex<()>>>,
    pub hub: Arc<NotificationHub>,
    pub tracking: TrackingTokens,
    pub pricing: PricingOracle,
    pub auth: JwtVerifier,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_ledger(config, Arc::new(InMemoryLedger::new()))
    }

    pub fn with_ledger(config: Config, ledger: Arc<dyn TripLedger>) -> Self {
        let metrics = Metrics::new();

        Self {
            ledger,
            drivers: DashMap::new(),
            rating_refresh: DashMap::new(),
            hub: Arc::new(NotificationHub::new(metrics.clone())),
            tracking: TrackingTokens::new(),
            pricing: PricingOracle::new(&config.tariff),
            auth: JwtVerifier::new(&config.jwt_secret),
            metrics,
            config,
        }
    }

    /// Runs `update` against the driver's profile, creating it on first use.
    pub fn with_driver<R>(&self, driver_id: Uuid, update: impl FnOnce(&mut DriverProfile) -> R) -> R {
        let mut profile = self
            .drivers
            .entry(driver_id)
            .or_insert_with(|| DriverProfile::new(driver_id));
        let result = update(profile.value_mut());
        profile.updated_at = Utc::now();
        result
    }

    /// Per-driver guard that keeps rating refreshes for one driver in order.
    pub fn rating_refresh_lock(&self, driver_id: Uuid) -> Arc<Mutex<()>> {
        self.rating_refresh
            .entry(driver_id)
            .or_default()
            .value()
            .clone()
    }

    /// Profile of a driver seen by this service, if any.
    pub fn find_driver(&self, driver_id: Uuid) -> Option<DriverProfile> {
        self.drivers.get(&driver_id).map(|entry| entry.value().clone())
    }

    pub fn driver_profile(&self, driver_id: Uuid) -> DriverProfile {
        self.find_driver(driver_id)
            .unwrap_or_else(|| DriverProfile::new(driver_id))
    }
}
