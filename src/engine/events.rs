use serde::Serialize;
use uuid::Uuid;

use crate::models::delivery::Delivery;
use crate::models::offer::DeliveryOffer;
use crate::models::request::DeliveryRequest;

/// Committed lifecycle transitions, fanned out to websocket subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    RequestCreated {
        request: DeliveryRequest,
    },
    RequestCancelled {
        request_id: Uuid,
        declined_offers: Vec<Uuid>,
    },
    RequestExpired {
        request_id: Uuid,
        expired_offers: Vec<Uuid>,
    },
    TravelerBlacklisted {
        request_id: Uuid,
        traveler_id: Uuid,
        declined_offers: Vec<Uuid>,
    },
    OfferSubmitted {
        offer: DeliveryOffer,
    },
    OfferUpdated {
        offer: DeliveryOffer,
    },
    OfferAccepted {
        offer: DeliveryOffer,
        delivery: Delivery,
        automatic: bool,
        declined_offers: Vec<Uuid>,
    },
    OfferDeclined {
        offer: DeliveryOffer,
    },
    OfferWithdrawn {
        offer: DeliveryOffer,
    },
    OffersExpired {
        request_id: Uuid,
        offer_ids: Vec<Uuid>,
    },
}

impl MarketEvent {
    /// Request the event belongs to.
    pub fn request_id(&self) -> Uuid {
        match self {
            MarketEvent::RequestCreated { request } => request.id,
            MarketEvent::RequestCancelled { request_id, .. }
            | MarketEvent::RequestExpired { request_id, .. }
            | MarketEvent::TravelerBlacklisted { request_id, .. }
            | MarketEvent::OffersExpired { request_id, .. } => *request_id,
            MarketEvent::OfferSubmitted { offer }
            | MarketEvent::OfferUpdated { offer }
            | MarketEvent::OfferAccepted { offer, .. }
            | MarketEvent::OfferDeclined { offer }
            | MarketEvent::OfferWithdrawn { offer } => offer.delivery_request_id,
        }
    }
}
