use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::cache::{CacheKey, CacheLayer};
use crate::engine::auto_accept::AutoAcceptScheduler;
use crate::engine::clock::Clock;
use crate::engine::events::MarketEvent;
use crate::error::AppError;
use crate::models::identity::Caller;
use crate::models::offer::{OfferStatus, DECLINED_REQUEST_CANCELLED, DECLINED_TRAVELER_BLACKLISTED};
use crate::models::request::{DeliveryRequest, NewDeliveryRequest, RequestStatus};
use crate::store::Store;

/// Creation, reads, cancellation and blacklisting of delivery requests.
#[derive(Clone)]
pub struct RequestService {
    store: Arc<Store>,
    cache: CacheLayer,
    clock: Arc<dyn Clock>,
    scheduler: Arc<AutoAcceptScheduler>,
    events: broadcast::Sender<MarketEvent>,
    cache_ttl: Duration,
}

impl RequestService {
    pub fn new(
        store: Arc<Store>,
        cache: CacheLayer,
        clock: Arc<dyn Clock>,
        scheduler: Arc<AutoAcceptScheduler>,
        events: broadcast::Sender<MarketEvent>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            scheduler,
            events,
            cache_ttl,
        }
    }

    pub async fn create_request(
        &self,
        caller: &Caller,
        input: NewDeliveryRequest,
    ) -> Result<DeliveryRequest, AppError> {
        let now = self.clock.now();
        validate_new_request(&input, now)?;

        let mut blacklisted = input.blacklisted_travelers;
        blacklisted.sort();
        blacklisted.dedup();

        let request = DeliveryRequest {
            id: Uuid::new_v4(),
            customer_id: caller.user_id,
            expires_at: input.expires_at.unwrap_or(input.pickup.window.end),
            item: input.item,
            pickup: input.pickup,
            dropoff: input.dropoff,
            max_price: input.max_price,
            auto_accept_price: input.auto_accept_price,
            min_traveler_rating: input.min_traveler_rating,
            required_verification: input.required_verification,
            blacklisted_travelers: blacklisted,
            status: RequestStatus::Pending,
            accepted_offer_id: None,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
            version: 0,
        };

        self.store.insert_request(request.clone())?;
        self.cache
            .invalidate(&[CacheKey::CustomerRequests(request.customer_id)])
            .await;

        let _ = self.events.send(MarketEvent::RequestCreated {
            request: request.clone(),
        });
        info!(
            request_id = %request.id,
            customer_id = %request.customer_id,
            max_price = request.max_price,
            "delivery request created"
        );

        Ok(request)
    }

    /// Requests are readable by any caller so travelers can bid on them.
    pub async fn get_request(&self, request_id: Uuid) -> Result<DeliveryRequest, AppError> {
        self.cache
            .read_through(&CacheKey::Request(request_id), self.cache_ttl, || {
                self.store
                    .request(request_id)
                    .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))
            })
            .await
    }

    pub async fn list_requests(&self, caller: &Caller) -> Vec<DeliveryRequest> {
        let key = CacheKey::CustomerRequests(caller.user_id);
        let Ok(requests) = self
            .cache
            .read_through(&key, self.cache_ttl, || {
                Ok::<_, Infallible>(self.store.requests_for_customer(caller.user_id))
            })
            .await;
        requests
    }

    /// Cancels the request and declines all of its pending offers in the same
    /// unit of work.
    pub async fn cancel_request(
        &self,
        caller: &Caller,
        request_id: Uuid,
    ) -> Result<DeliveryRequest, AppError> {
        let now = self.clock.now();
        let committed = self
            .store
            .transaction(request_id, |unit| {
                ensure_owner(caller, unit.request())?;
                if !matches!(
                    unit.request().status,
                    RequestStatus::Pending | RequestStatus::Matched
                ) {
                    return Err(AppError::Conflict(format!(
                        "request {request_id} is {:?} and can no longer be cancelled",
                        unit.request().status
                    )));
                }

                let declined = unit.decline_pending(None, DECLINED_REQUEST_CANCELLED, now);
                let request = unit.request_mut();
                request.status = RequestStatus::Cancelled;
                request.cancelled_at = Some(now);
                request.updated_at = now;

                Ok((request.clone(), declined))
            })
            .await?;

        self.cache.invalidate(&committed.invalidations).await;
        let (request, declined) = committed.value;
        self.scheduler.cancel_all(&declined);

        info!(
            request_id = %request_id,
            declined = declined.len(),
            "delivery request cancelled"
        );
        let _ = self.events.send(MarketEvent::RequestCancelled {
            request_id,
            declined_offers: declined,
        });

        Ok(request)
    }

    /// Blacklists a traveler on the request. A pending offer of theirs is
    /// declined in the same unit of work.
    pub async fn blacklist_traveler(
        &self,
        caller: &Caller,
        request_id: Uuid,
        traveler_id: Uuid,
    ) -> Result<DeliveryRequest, AppError> {
        let now = self.clock.now();
        let committed = self
            .store
            .transaction(request_id, |unit| {
                ensure_owner(caller, unit.request())?;
                if traveler_id == caller.user_id {
                    return Err(AppError::Validation(
                        "cannot blacklist yourself".to_string(),
                    ));
                }
                if unit.request().is_blacklisted(traveler_id) {
                    return Ok((unit.request().clone(), Vec::new()));
                }

                let pending: Vec<Uuid> = unit
                    .offers()
                    .iter()
                    .filter(|offer| {
                        offer.traveler_id == traveler_id && offer.status == OfferStatus::Pending
                    })
                    .map(|offer| offer.id)
                    .collect();
                for offer_id in &pending {
                    unit.offer_mut(*offer_id)?
                        .mark_declined(now, Some(DECLINED_TRAVELER_BLACKLISTED.to_string()));
                }

                let request = unit.request_mut();
                request.blacklisted_travelers.push(traveler_id);
                request.updated_at = now;

                Ok((request.clone(), pending))
            })
            .await?;

        self.cache.invalidate(&committed.invalidations).await;
        let (request, declined) = committed.value;
        self.scheduler.cancel_all(&declined);

        info!(
            request_id = %request_id,
            traveler_id = %traveler_id,
            declined = declined.len(),
            "traveler blacklisted"
        );
        let _ = self.events.send(MarketEvent::TravelerBlacklisted {
            request_id,
            traveler_id,
            declined_offers: declined,
        });

        Ok(request)
    }
}

fn ensure_owner(caller: &Caller, request: &DeliveryRequest) -> Result<(), AppError> {
    if request.customer_id != caller.user_id {
        return Err(AppError::Forbidden(
            "only the request owner can change this request".to_string(),
        ));
    }
    Ok(())
}

fn validate_new_request(input: &NewDeliveryRequest, now: DateTime<Utc>) -> Result<(), AppError> {
    let item = &input.item;
    if !item.weight_kg.is_finite() || item.weight_kg <= 0.0 {
        return Err(AppError::Validation("item weight must be greater than zero".to_string()));
    }
    if item.volume_l.is_some_and(|volume| !volume.is_finite() || volume <= 0.0) {
        return Err(AppError::Validation("item volume must be greater than zero".to_string()));
    }
    if item.quantity == 0 {
        return Err(AppError::Validation("item quantity must be at least 1".to_string()));
    }
    if item.declared_value.is_some_and(|value| !value.is_finite() || value < 0.0) {
        return Err(AppError::Validation("declared value cannot be negative".to_string()));
    }

    if !input.pickup.point.is_valid() || !input.dropoff.point.is_valid() {
        return Err(AppError::Validation("coordinates are out of range".to_string()));
    }
    if !input.pickup.window.is_ordered() || !input.dropoff.window.is_ordered() {
        return Err(AppError::Validation(
            "time windows must start before they end".to_string(),
        ));
    }
    if input.dropoff.window.end < input.pickup.window.start {
        return Err(AppError::Validation(
            "drop-off window ends before pickup window starts".to_string(),
        ));
    }

    if !input.max_price.is_finite() || input.max_price <= 0.0 {
        return Err(AppError::Validation("maximum price must be greater than zero".to_string()));
    }
    if let Some(auto) = input.auto_accept_price {
        if !auto.is_finite() || auto <= 0.0 || auto > input.max_price {
            return Err(AppError::Validation(
                "auto-accept price must be positive and at most the maximum price".to_string(),
            ));
        }
    }
    if input
        .min_traveler_rating
        .is_some_and(|rating| !(0.0..=5.0).contains(&rating))
    {
        return Err(AppError::Validation(
            "minimum traveler rating must be between 0 and 5".to_string(),
        ));
    }

    let expires_at = input.expires_at.unwrap_or(input.pickup.window.end);
    if expires_at <= now {
        return Err(AppError::Validation("request expiry must be in the future".to_string()));
    }

    Ok(())
}
