//! Request, offer and delivery records.
//!
//! A request and everything hanging off it (its offers and, once accepted, its
//! delivery) live in one [`RequestRecord`]. Every mutation of an existing
//! record goes through [`Store::transaction`], which serializes writers per
//! request and publishes the new record with a single map insert, so readers
//! observe either the state before a unit of work or the state after it.

pub mod offers;
pub mod requests;

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::cache::keys;
use crate::cache::CacheKey;
use crate::error::AppError;
use crate::models::delivery::Delivery;
use crate::models::offer::DeliveryOffer;
use crate::models::request::DeliveryRequest;

#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub request: DeliveryRequest,
    pub offers: Vec<DeliveryOffer>,
    pub delivery: Option<Delivery>,
}

/// Result of a committed unit of work.
#[derive(Debug)]
pub struct Committed<T> {
    pub value: T,
    /// Cache entries the commit made stale.
    pub invalidations: Vec<CacheKey>,
    pub touched_offers: Vec<DeliveryOffer>,
}

#[derive(Default)]
pub struct Store {
    records: DashMap<Uuid, RequestRecord>,
    offer_index: DashMap<Uuid, Uuid>,
    delivery_index: DashMap<Uuid, Uuid>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `work` against a private copy of the request's record while holding
    /// that request's lock. The copy replaces the stored record only when
    /// `work` returns `Ok`; an error or a panic leaves the store untouched.
    pub async fn transaction<T, F>(&self, request_id: Uuid, work: F) -> Result<Committed<T>, AppError>
    where
        F: FnOnce(&mut UnitOfWork) -> Result<T, AppError>,
    {
        let lock = self.lock_for(request_id);
        let _guard = lock.lock().await;

        let record = self
            .records
            .get(&request_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))?;

        let mut unit = UnitOfWork::begin(record);
        let value = work(&mut unit)?;
        let (invalidations, touched_offers) = self.commit(unit);

        Ok(Committed {
            value,
            invalidations,
            touched_offers,
        })
    }

    fn lock_for(&self, request_id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(request_id).or_default().value().clone()
    }

    fn commit(&self, unit: UnitOfWork) -> (Vec<CacheKey>, Vec<DeliveryOffer>) {
        let UnitOfWork {
            record,
            request_dirty,
            touched,
            delivery_created,
        } = unit;

        if !request_dirty && touched.is_empty() && !delivery_created {
            return (Vec::new(), Vec::new());
        }

        let request_id = record.request.id;

        let touched_offers: Vec<DeliveryOffer> = record
            .offers
            .iter()
            .filter(|offer| touched.contains(&offer.id))
            .cloned()
            .collect();

        for offer in &touched_offers {
            self.offer_index.insert(offer.id, request_id);
        }
        if let Some(delivery) = &record.delivery {
            self.delivery_index.insert(delivery.id, request_id);
        }

        let invalidations = if request_dirty {
            keys::for_request_change(&record.request, &touched_offers)
        } else {
            keys::for_offer_change(request_id, &touched_offers)
        };

        self.records.insert(request_id, record);
        (invalidations, touched_offers)
    }

    pub fn request_count(&self) -> usize {
        self.records.len()
    }

    pub fn offer_count(&self) -> usize {
        self.offer_index.len()
    }

    pub fn delivery_count(&self) -> usize {
        self.delivery_index.len()
    }
}

/// Staged changes to one request record.
pub struct UnitOfWork {
    record: RequestRecord,
    request_dirty: bool,
    touched: HashSet<Uuid>,
    delivery_created: bool,
}

impl UnitOfWork {
    fn begin(record: RequestRecord) -> Self {
        Self {
            record,
            request_dirty: false,
            touched: HashSet::new(),
            delivery_created: false,
        }
    }

    pub fn request(&self) -> &DeliveryRequest {
        &self.record.request
    }

    /// Marks the request as changed; its version moves on once per unit of work.
    pub fn request_mut(&mut self) -> &mut DeliveryRequest {
        if !self.request_dirty {
            self.request_dirty = true;
            self.record.request.version += 1;
        }
        &mut self.record.request
    }

    pub fn offers(&self) -> &[DeliveryOffer] {
        &self.record.offers
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::geo::GeoPoint;
    use crate::models::identity::VerificationLevel;
    use crate::models::offer::OfferStatus;
    use crate::models::request::{
        ItemCategory, ItemProfile, RequestStatus, Stop, TimeWindow,
    };

    fn request() -> DeliveryRequest {
        let now = Utc::now();
        let window = TimeWindow {
            start: now + Duration::hours(1),
            end: now + Duration::hours(5),
        };
        DeliveryRequest {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            item: ItemProfile {
                weight_kg: 1.0,
                volume_l: None,
                quantity: 1,
                category: ItemCategory::Other,
                fragile: false,
                declared_value: None,
            },
            pickup: Stop {
                point: GeoPoint { lat: 1.0, lng: 1.0 },
                window,
            },
            dropoff: Stop {
                point: GeoPoint { lat: 1.1, lng: 1.1 },
                window,
            },
            max_price: 40.0,
            auto_accept_price: None,
            min_traveler_rating: None,
            required_verification: VerificationLevel::Unverified,
            blacklisted_travelers: Vec::new(),
            status: RequestStatus::Pending,
            accepted_offer_id: None,
            expires_at: now + Duration::days(1),
            created_at: now,
            updated_at: now,
            cancelled_at: None,
            version: 0,
        }
    }

    fn offer(request_id: Uuid, price: f64) -> DeliveryOffer {
        let now = Utc::now();
        DeliveryOffer {
            id: Uuid::new_v4(),
            delivery_request_id: request_id,
            traveler_id: Uuid::new_v4(),
            carrier_trip_id: None,
            price,
            message: None,
            estimated_pickup_at: None,
            estimated_delivery_at: None,
            status: OfferStatus::Pending,
            valid_until: now + Duration::hours(24),
            created_at: now,
            updated_at: now,
            accepted_at: None,
            declined_at: None,
            declined_reason: None,
            withdrawn_at: None,
        }
    }

    #[tokio::test]
    async fn committed_work_is_visible_and_bumps_version() {
        let store = Store::new();
        let req = request();
        let request_id = req.id;
        store.insert_request(req).unwrap();

        let committed = store
            .transaction(request_id, |unit| {
                unit.insert_offer(offer(request_id, 20.0))?;
                unit.request_mut().status = RequestStatus::Matched;
                Ok(())
            })
            .await
            .unwrap();

        let stored = store.request(request_id).unwrap();
        assert_eq!(stored.status, RequestStatus::Matched);
        assert_eq!(stored.version, 1);
        assert_eq!(store.offers_for_request(request_id).len(), 1);
        assert_eq!(committed.touched_offers.len(), 1);
        assert!(committed
            .invalidations
            .contains(&CacheKey::Request(request_id)));
    }

    #[tokio::test]
    async fn failed_work_rolls_back_every_staged_change() {
        let store = Store::new();
        let req = request();
        let request_id = req.id;
        store.insert_request(req.clone()).unwrap();

        let result: Result<Committed<()>, AppError> = store
            .transaction(request_id, |unit| {
                unit.insert_offer(offer(request_id, 20.0))?;
                unit.request_mut().status = RequestStatus::Accepted;
                Err(AppError::Internal("delivery write failed".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.request(request_id).unwrap(), req);
        assert!(store.offers_for_request(request_id).is_empty());
        assert_eq!(store.offer_count(), 0);
    }

    #[tokio::test]
    async fn panicking_work_rolls_back_and_releases_the_lock() {
        let store = Arc::new(Store::new());
        let req = request();
        let request_id = req.id;
        store.insert_request(req.clone()).unwrap();

        let panicking = store.clone();
        let joined = tokio::spawn(async move {
            let _ = panicking
                .transaction(request_id, |unit| -> Result<(), AppError> {
                    unit.request_mut().status = RequestStatus::Cancelled;
                    panic!("boom");
                })
                .await;
        })
        .await;
        assert!(joined.is_err());

        assert_eq!(store.request(request_id).unwrap().status, RequestStatus::Pending);

        let committed = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            store.transaction(request_id, |unit| {
                unit.request_mut().status = RequestStatus::Cancelled;
                Ok(())
            }),
        )
        .await
        .expect("lock released after panic");
        assert!(committed.is_ok());
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let store = Store::new();
        let result = store.transaction(Uuid::new_v4(), |_| Ok(())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
