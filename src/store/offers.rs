use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Store, UnitOfWork};
use crate::error::AppError;
use crate::models::delivery::Delivery;
use crate::models::offer::{DeliveryOffer, OfferStatus};

impl Store {
    pub fn offer(&self, id: Uuid) -> Option<DeliveryOffer> {
        let request_id = *self.offer_index.get(&id)?;
        let record = self.records.get(&request_id)?;
        record.offers.iter().find(|offer| offer.id == id).cloned()
    }

    /// Oldest first.
    pub fn offers_for_request(&self, request_id: Uuid) -> Vec<DeliveryOffer> {
        self.records
            .get(&request_id)
            .map(|record| record.offers.clone())
            .unwrap_or_default()
    }

    /// Newest first.
    pub fn offers_for_traveler(&self, traveler_id: Uuid) -> Vec<DeliveryOffer> {
        let mut offers: Vec<DeliveryOffer> = self
            .records
            .iter()
            .flat_map(|record| {
                record
                    .offers
                    .iter()
                    .filter(|offer| offer.traveler_id == traveler_id)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        offers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        offers
    }

    /// Requests holding at least one pending offer whose `valid_until` passed.
    pub fn requests_with_stale_offers(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        self.records
            .iter()
            .filter(|record| {
                record
                    .offers
                    .iter()
                    .any(|offer| offer.status == OfferStatus::Pending && offer.is_stale(now))
            })
            .map(|record| record.request.id)
            .collect()
    }

    pub fn delivery(&self, id: Uuid) -> Option<Delivery> {
        let request_id = *self.delivery_index.get(&id)?;
        self.records.get(&request_id)?.delivery.clone()
    }

    pub fn delivery_for_request(&self, request_id: Uuid) -> Option<Delivery> {
        self.records.get(&request_id)?.delivery.clone()
    }
}

impl UnitOfWork {
    pub fn offer(&self, id: Uuid) -> Result<&DeliveryOffer, AppError> {
        self.record
            .offers
            .iter()
            .find(|offer| offer.id == id)
            .ok_or_else(|| AppError::NotFound(format!("offer {id} not found")))
    }

    pub fn offer_mut(&mut self, id: Uuid) -> Result<&mut DeliveryOffer, AppError> {
        let offer = self
            .record
            .offers
            .iter_mut()
            .find(|offer| offer.id == id)
            .ok_or_else(|| AppError::NotFound(format!("offer {id} not found")))?;
        self.touched.insert(id);
        Ok(offer)
    }

    pub fn insert_offer(&mut self, offer: DeliveryOffer) -> Result<(), AppError> {
        if offer.delivery_request_id != self.record.request.id {
            return Err(AppError::Internal(format!(
                "offer {} does not belong to request {}",
                offer.id, self.record.request.id
            )));
        }
        self.touched.insert(offer.id);
        self.record.offers.push(offer);
        Ok(())
    }

    /// Attaches the delivery contract. A record carries at most one.
    pub fn create_delivery(&mut self, delivery: Delivery) -> Result<(), AppError> {
        if let Some(existing) = &self.record.delivery {
            return Err(AppError::Conflict(format!(
                "request {} already has delivery {}",
                self.record.request.id, existing.id
            )));
        }
        self.record.delivery = Some(delivery);
        self.delivery_created = true;
        Ok(())
    }

    /// Declines every pending offer other than `keep`. Returns the ids declined.
    pub fn decline_pending(
        &mut self,
        keep: Option<Uuid>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Vec<Uuid> {
        let mut declined = Vec::new();
        for offer in self.record.offers.iter_mut() {
            if offer.status == OfferStatus::Pending && Some(offer.id) != keep {
                offer.mark_declined(now, Some(reason.to_string()));
                declined.push(offer.id);
            }
        }
        self.touched.extend(declined.iter().copied());
        declined
    }

    /// Expires pending offers whose validity ended, or every pending offer when
    /// `all_pending` is set. Returns the ids expired.
    pub fn expire_pending(&mut self, now: DateTime<Utc>, all_pending: bool) -> Vec<Uuid> {
        let mut expired = Vec::new();
        for offer in self.record.offers.iter_mut() {
            if offer.status == OfferStatus::Pending && (all_pending || offer.is_stale(now)) {
                offer.mark_expired(now);
                expired.push(offer.id);
            }
        }
        self.touched.extend(expired.iter().copied());
        expired
    }
}
