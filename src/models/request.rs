use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::identity::VerificationLevel;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Documents,
    Electronics,
    Clothing,
    Food,
    Household,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemProfile {
    pub weight_kg: f64,
    #[serde(default)]
    pub volume_l: Option<f64>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub category: ItemCategory,
    #[serde(default)]
    pub fragile: bool,
    #[serde(default)]
    pub declared_value: Option<f64>,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn is_ordered(&self) -> bool {
        self.start < self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stop {
    pub point: GeoPoint,
    pub window: TimeWindow,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Matched,
    Accepted,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryRequest {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub item: ItemProfile,
    pub pickup: Stop,
    pub dropoff: Stop,
    pub max_price: f64,
    pub auto_accept_price: Option<f64>,
    pub min_traveler_rating: Option<f64>,
    pub required_verification: VerificationLevel,
    pub blacklisted_travelers: Vec<Uuid>,
    pub status: RequestStatus,
    pub accepted_offer_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Bumped on every committed change; cached projections compare against it.
    pub version: u64,
}

impl DeliveryRequest {
    pub fn can_receive_offers(&self, now: DateTime<Utc>) -> bool {
        self.status == RequestStatus::Pending && self.expires_at > now
    }

    pub fn is_blacklisted(&self, traveler_id: Uuid) -> bool {
        self.blacklisted_travelers.contains(&traveler_id)
    }

    pub fn qualifies_for_auto_accept(&self, price: f64) -> bool {
        self.auto_accept_price
            .is_some_and(|threshold| price <= threshold)
    }
}

/// Customer input for a new request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeliveryRequest {
    pub item: ItemProfile,
    pub pickup: Stop,
    pub dropoff: Stop,
    pub max_price: f64,
    #[serde(default)]
    pub auto_accept_price: Option<f64>,
    #[serde(default)]
    pub min_traveler_rating: Option<f64>,
    #[serde(default)]
    pub required_verification: VerificationLevel,
    #[serde(default)]
    pub blacklisted_travelers: Vec<Uuid>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}
