use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
    Withdrawn,
}

impl OfferStatus {
    pub fn is_terminal(self) -> bool {
        self != OfferStatus::Pending
    }
}

pub const DECLINED_OTHER_ACCEPTED: &str = "another offer was accepted";
pub const DECLINED_REQUEST_CANCELLED: &str = "request cancelled";
pub const DECLINED_TRAVELER_BLACKLISTED: &str = "traveler blacklisted";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryOffer {
    pub id: Uuid,
    pub delivery_request_id: Uuid,
    pub traveler_id: Uuid,
    pub carrier_trip_id: Option<Uuid>,
    pub price: f64,
    pub message: Option<String>,
    pub estimated_pickup_at: Option<DateTime<Utc>>,
    pub estimated_delivery_at: Option<DateTime<Utc>>,
    pub status: OfferStatus,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    pub declined_reason: Option<String>,
    pub withdrawn_at: Option<DateTime<Utc>>,
}

impl DeliveryOffer {
    /// Pending and accepted offers count against the one-per-traveler rule.
    pub fn is_active(&self) -> bool {
        matches!(self.status, OfferStatus::Pending | OfferStatus::Accepted)
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.valid_until <= now
    }

    pub fn can_be_accepted(&self, now: DateTime<Utc>) -> bool {
        self.status == OfferStatus::Pending && !self.is_stale(now)
    }

    pub fn mark_accepted(&mut self, now: DateTime<Utc>) {
        self.status = OfferStatus::Accepted;
        self.accepted_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_declined(&mut self, now: DateTime<Utc>, reason: Option<String>) {
        self.status = OfferStatus::Declined;
        self.declined_at = Some(now);
        self.declined_reason = reason;
        self.updated_at = now;
    }

    pub fn mark_withdrawn(&mut self, now: DateTime<Utc>) {
        self.status = OfferStatus::Withdrawn;
        self.withdrawn_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_expired(&mut self, now: DateTime<Utc>) {
        self.status = OfferStatus::Expired;
        self.updated_at = now;
    }
}

/// Traveler input for a new offer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewOffer {
    pub price: f64,
    #[serde(default)]
    pub carrier_trip_id: Option<Uuid>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub estimated_pickup_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_delivery_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

/// Fields a traveler may change while the offer is pending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfferUpdate {
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub estimated_pickup_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_delivery_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}
