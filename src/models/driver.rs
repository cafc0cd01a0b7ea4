use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_DRIVER_RATING: f64 = 4.8;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfile {
    pub id: Uuid,
    pub rating: f64,
    pub claims_attempted: u64,
    pub claims_won: u64,
    pub online: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub location: Option<DriverLocation>,
    pub updated_at: DateTime<Utc>,
}

impl DriverProfile {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            rating: DEFAULT_DRIVER_RATING,
            claims_attempted: 0,
            claims_won: 0,
            online: false,
            last_seen_at: None,
            location: None,
            updated_at: Utc::now(),
        }
    }

    /// Claims won over claims attempted, as a whole percentage.
    pub fn presence(&self) -> DriverPresence {
        DriverPresence {
            online: self.online,
            last_seen_at: self.last_seen_at,
        }
    }

    pub fn accept_rate(&self) -> u32 {
        if self.claims_attempted == 0 {
            return 0;
        }
        ((self.claims_won as f64 / self.claims_attempted as f64) * 100.0).round() as u32
    }
}

/// Last position a driver reported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocation {
    pub lat: f64,
    #[serde(alias = "lon")]
    pub lng: f64,
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverPresence {
    pub online: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// What a party to a trip sees of the driver on the tracking views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocationView {
    pub id: Uuid,
    pub rating: f64,
    pub online: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub location: Option<DriverLocation>,
}

impl From<&DriverProfile> for DriverLocationView {
    fn from(profile: &DriverProfile) -> Self {
        Self {
            id: profile.id,
            rating: profile.rating,
            online: profile.online,
            last_seen_at: profile.last_seen_at,
            location: profile.location.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverStats {
    pub day_trips: u64,
    pub day_revenue: u64,
    pub month_trips: u64,
    pub month_revenue: u64,
    pub accept_rate: u32,
}
