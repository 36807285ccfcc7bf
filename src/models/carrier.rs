use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::identity::VerificationLevel;
use crate::models::request::ItemCategory;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Upcoming,
    InProgress,
    Completed,
    Cancelled,
}

/// A carrier's planned trip as reported by the trip directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateCarrier {
    pub trip_id: Uuid,
    pub traveler_id: Uuid,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub departure_at: DateTime<Utc>,
    pub arrival_at: DateTime<Utc>,
    pub remaining_weight_kg: f64,
    #[serde(default)]
    pub remaining_volume_l: Option<f64>,
    pub remaining_items: u32,
    pub rating: f64,
    #[serde(default)]
    pub completed_deliveries: u32,
    #[serde(default)]
    pub verification: VerificationLevel,
    /// Empty means every category is accepted.
    #[serde(default)]
    pub accepted_categories: Vec<ItemCategory>,
    #[serde(default = "default_true")]
    pub accepts_fragile: bool,
    #[serde(default)]
    pub max_item_value: Option<f64>,
    #[serde(default)]
    pub departure_flexibility_hours: f64,
    #[serde(default)]
    pub price_per_kg: Option<f64>,
    pub status: TripStatus,
}

fn default_true() -> bool {
    true
}

impl CandidateCarrier {
    pub fn accepts_category(&self, category: ItemCategory) -> bool {
        self.accepted_categories.is_empty() || self.accepted_categories.contains(&category)
    }
}

/// Parameters of a trip-directory search.
#[derive(Debug, Clone, PartialEq)]
pub struct TripQuery {
    pub origin: GeoPoint,
    pub origin_radius_km: f64,
    pub destination: GeoPoint,
    pub destination_radius_km: f64,
    pub departure_from: DateTime<Utc>,
    pub departure_to: DateTime<Utc>,
    pub min_weight_kg: f64,
    pub min_items: u32,
    pub status: TripStatus,
}
