use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Accepted,
    PickupScheduled,
    PickedUp,
    InTransit,
    DeliveryScheduled,
    Delivered,
    Cancelled,
    Disputed,
}

/// Binding contract produced by accepting an offer. `final_price` is copied
/// from the offer and never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delivery {
    pub id: Uuid,
    pub delivery_request_id: Uuid,
    pub offer_id: Uuid,
    pub customer_id: Uuid,
    pub traveler_id: Uuid,
    pub final_price: f64,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
}
