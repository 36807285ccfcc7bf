use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::{RequestRecord, Store};
use crate::error::AppError;
use crate::models::request::{DeliveryRequest, RequestStatus};

impl Store {
    pub fn insert_request(&self, request: DeliveryRequest) -> Result<(), AppError> {
        let id = request.id;
        match self.records.entry(id) {
            Entry::Occupied(_) => {
                Err(AppError::Conflict(format!("request {id} already exists")))
            }
            Entry::Vacant(slot) => {
                slot.insert(RequestRecord {
                    request,
                    offers: Vec::new(),
                    delivery: None,
                });
                Ok(())
            }
        }
    }

    pub fn request(&self, id: Uuid) -> Option<DeliveryRequest> {
        self.records.get(&id).map(|entry| entry.request.clone())
    }

    pub fn record(&self, id: Uuid) -> Option<RequestRecord> {
        self.records.get(&id).map(|entry| entry.value().clone())
    }

    /// Newest first.
    pub fn requests_for_customer(&self, customer_id: Uuid) -> Vec<DeliveryRequest> {
        let mut requests: Vec<DeliveryRequest> = self
            .records
            .iter()
            .filter(|entry| entry.request.customer_id == customer_id)
            .map(|entry| entry.request.clone())
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests
    }

    /// Pending requests whose `expires_at` has passed.
    pub fn lapsed_requests(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        self.records
            .iter()
            .filter(|entry| {
                entry.request.status == RequestStatus::Pending && entry.request.expires_at <= now
            })
            .map(|entry| entry.request.id)
            .collect()
    }

    /// Open requests holding at least one pending offer priced within the
    /// auto-accept threshold.
    pub fn auto_accept_candidates(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        self.records
            .iter()
            .filter(|entry| {
                let request = &entry.request;
                request.can_receive_offers(now)
                    && entry.offers.iter().any(|offer| {
                        offer.can_be_accepted(now) && request.qualifies_for_auto_accept(offer.price)
                    })
            })
            .map(|entry| entry.request.id)
            .collect()
    }
}
