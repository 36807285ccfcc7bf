use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchCriteria {
    /// Pickup and drop-off radius in km.
    pub max_distance: f64,
    pub max_detour: f64,
    /// Hours either side of the pickup window.
    pub time_flexibility: f64,
}

impl Default for MatchCriteria {
    fn default() -> Self {
        Self {
            max_distance: 50.0,
            max_detour: 20.0,
            time_flexibility: 24.0,
        }
    }
}

impl MatchCriteria {
    pub fn validate(&self) -> Result<(), AppError> {
        let fields = [
            ("maxDistance", self.max_distance),
            ("maxDetour", self.max_detour),
            ("timeFlexibility", self.time_flexibility),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(AppError::Validation(format!(
                    "{name} must be a positive number"
                )));
            }
        }
        Ok(())
    }

    /// Exact textual form used in cache keys; distinct criteria never share
    /// a fingerprint.
    pub fn fingerprint(&self) -> String {
        format!(
            "{:016x}:{:016x}:{:016x}",
            self.max_distance.to_bits(),
            self.max_detour.to_bits(),
            self.time_flexibility.to_bits()
        )
    }
}

/// Raw per-candidate inputs to the scoring rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchFeatures {
    pub origin_distance_km: f64,
    pub destination_distance_km: f64,
    pub detour_km: f64,
    pub weight_utilization: f64,
    pub volume_utilization: Option<f64>,
    pub rating: f64,
    pub completed_deliveries: u32,
    pub verification_tier: u8,
    pub category_compatible: bool,
    pub fragile_compatible: bool,
    pub value_compatible: bool,
    pub time_offset_hours: f64,
    pub time_flexibility_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub route: f64,
    pub timing: f64,
    pub capacity: f64,
    pub price: f64,
    pub rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarrierMatch {
    pub trip_id: Uuid,
    pub traveler_id: Uuid,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub features: MatchFeatures,
    pub estimated_price: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    pub request_id: Uuid,
    pub criteria: MatchCriteria,
    pub matches: Vec<CarrierMatch>,
    /// Set when the trip directory could not be consulted.
    pub degraded: bool,
    pub generated_at: DateTime<Utc>,
}
