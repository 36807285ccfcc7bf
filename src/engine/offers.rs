//! Offer lifecycle: submit, update, accept, decline, withdraw, expire.
//!
//! `pending` is the only state an offer can leave. Every transition runs as one
//! [`Store::transaction`] on the offer's request, so an accept, a decline, a
//! withdrawal and the expiration sweep touching the same request are applied
//! one after another and each re-checks state against what the previous one
//! committed.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{CacheKey, CacheLayer};
use crate::engine::auto_accept::AutoAcceptScheduler;
use crate::engine::clock::Clock;
use crate::engine::events::MarketEvent;
use crate::error::AppError;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::identity::Caller;
use crate::models::offer::{
    DeliveryOffer, NewOffer, OfferStatus, OfferUpdate, DECLINED_OTHER_ACCEPTED,
};
use crate::models::request::{DeliveryRequest, RequestStatus};
use crate::observability::metrics::Metrics;
use crate::store::{Committed, Store};

const MAX_MESSAGE_LEN: usize = 1_000;

#[derive(Debug, Clone, Copy)]
pub struct OfferSettings {
    pub default_validity: chrono::Duration,
    pub auto_accept_delay: Duration,
    pub entity_cache_ttl: Duration,
}

impl Default for OfferSettings {
    fn default() -> Self {
        Self {
            default_validity: chrono::Duration::hours(24),
            auto_accept_delay: Duration::from_secs(2),
            entity_cache_ttl: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptedOffer {
    pub offer: DeliveryOffer,
    pub delivery: Delivery,
    pub declined_offers: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub offers_expired: usize,
    pub requests_expired: usize,
    pub auto_accepted: usize,
    pub cache_entries_purged: usize,
}

#[derive(Debug, Clone, Copy)]
enum AcceptActor {
    Customer(Uuid),
    Automatic,
}

#[derive(Clone)]
pub struct OfferService {
    store: Arc<Store>,
    cache: CacheLayer,
    clock: Arc<dyn Clock>,
    scheduler: Arc<AutoAcceptScheduler>,
    events: broadcast::Sender<MarketEvent>,
    metrics: Metrics,
    settings: OfferSettings,
}

impl OfferService {
    pub fn new(
        store: Arc<Store>,
        cache: CacheLayer,
        clock: Arc<dyn Clock>,
        scheduler: Arc<AutoAcceptScheduler>,
        events: broadcast::Sender<MarketEvent>,
        metrics: Metrics,
        settings: OfferSettings,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            scheduler,
            events,
            metrics,
            settings,
        }
    }

    pub fn scheduler(&self) -> &AutoAcceptScheduler {
        &self.scheduler
    }

    pub async fn submit_offer(
        &self,
        caller: &Caller,
        request_id: Uuid,
        input: NewOffer,
    ) -> Result<DeliveryOffer, AppError> {
        let now = self.clock.now();
        let result = self.try_submit(caller, request_id, input, now).await;
        if result.is_err() {
            self.metrics.offer_outcome("rejected");
        }
        let (offer, auto_accept) = result?;

        self.metrics.offer_outcome("submitted");
        self.publish(MarketEvent::OfferSubmitted {
            offer: offer.clone(),
        });
        info!(
            request_id = %request_id,
            offer_id = %offer.id,
            traveler_id = %offer.traveler_id,
            price = offer.price,
            "offer submitted"
        );

        if auto_accept {
            self.schedule_auto_accept(offer.id);
        }

        Ok(offer)
    }

    async fn try_submit(
        &self,
        caller: &Caller,
        request_id: Uuid,
        input: NewOffer,
        now: chrono::DateTime<Utc>,
    ) -> Result<(DeliveryOffer, bool), AppError> {
        validate_price(input.price)?;
        validate_message(input.message.as_deref())?;
        if input.valid_until.is_some_and(|until| until <= now) {
            return Err(AppError::Validation(
                "valid_until must be in the future".to_string(),
            ));
        }
        validate_estimates(input.estimated_pickup_at, input.estimated_delivery_at)?;

        let offer = DeliveryOffer {
            id: Uuid::new_v4(),
            delivery_request_id: request_id,
            traveler_id: caller.user_id,
            carrier_trip_id: input.carrier_trip_id,
            price: input.price,
            message: input.message,
            estimated_pickup_at: input.estimated_pickup_at,
            estimated_delivery_at: input.estimated_delivery_at,
            status: OfferStatus::Pending,
            valid_until: input
                .valid_until
                .unwrap_or(now + self.settings.default_validity),
            created_at: now,
            updated_at: now,
            accepted_at: None,
            declined_at: None,
            declined_reason: None,
            withdrawn_at: None,
        };

        let committed = self
            .store
            .transaction(request_id, |unit| {
                let request = unit.request();
                if request.customer_id == caller.user_id {
                    return Err(AppError::Validation(
                        "cannot make an offer on your own request".to_string(),
                    ));
                }
                if !request.can_receive_offers(now) {
                    return Err(AppError::Conflict(format!(
                        "request {request_id} is not accepting offers"
                    )));
                }
                if unit
                    .offers()
                    .iter()
                    .any(|existing| existing.traveler_id == caller.user_id && existing.is_active())
                {
                    return Err(AppError::Conflict(
                        "traveler already has an active offer on this request".to_string(),
                    ));
                }
                check_price_ceiling(offer.price, request)?;
                if request.is_blacklisted(caller.user_id) {
                    return Err(AppError::Forbidden(
                        "traveler is blacklisted for this request".to_string(),
                    ));
                }
                check_traveler_minimums(caller, request)?;

                let auto_accept = request.qualifies_for_auto_accept(offer.price);
                unit.insert_offer(offer.clone())?;
                Ok(auto_accept)
            })
            .await?;

        self.finish(&committed).await;
        Ok((offer, committed.value))
    }

    pub async fn update_offer(
        &self,
        caller: &Caller,
        offer_id: Uuid,
        update: OfferUpdate,
    ) -> Result<DeliveryOffer, AppError> {
        if update.price.is_none()
            && update.message.is_none()
            && update.estimated_pickup_at.is_none()
            && update.estimated_delivery_at.is_none()
            && update.valid_until.is_none()
        {
            return Err(AppError::Validation("no changes supplied".to_string()));
        }
        if let Some(price) = update.price {
            validate_price(price)?;
        }
        validate_message(update.message.as_deref())?;

        let now = self.clock.now();
        if update.valid_until.is_some_and(|until| until <= now) {
            return Err(AppError::Validation(
                "valid_until must be in the future".to_string(),
            ));
        }

        let request_id = self.request_of(offer_id)?;
        let committed = self
            .store
            .transaction(request_id, |unit| {
                let current = unit.offer(offer_id)?;
                if current.traveler_id != caller.user_id {
                    return Err(AppError::Forbidden(
                        "only the offering traveler can update this offer".to_string(),
                    ));
                }
                ensure_pending(current)?;
                if current.is_stale(now) {
                    return Err(AppError::Conflict(format!("offer {offer_id} has expired")));
                }
                let request = unit.request();
                if !request.can_receive_offers(now) {
                    return Err(AppError::Conflict(format!(
                        "request {request_id} is not accepting offers"
                    )));
                }
                let price = update.price.unwrap_or(current.price);
                check_price_ceiling(price, request)?;
                validate_estimates(
                    update.estimated_pickup_at.or(current.estimated_pickup_at),
                    update.estimated_delivery_at.or(current.estimated_delivery_at),
                )?;
                let auto_accept = request.qualifies_for_auto_accept(price);

                let offer = unit.offer_mut(offer_id)?;
                offer.price = price;
                if let Some(message) = &update.message {
                    offer.message = Some(message.clone());
                }
                if let Some(at) = update.estimated_pickup_at {
                    offer.estimated_pickup_at = Some(at);
                }
                if let Some(at) = update.estimated_delivery_at {
                    offer.estimated_delivery_at = Some(at);
                }
                if let Some(until) = update.valid_until {
                    offer.valid_until = until;
                }
                offer.updated_at = now;

                Ok((offer.clone(), auto_accept))
            })
            .await?;

        self.finish(&committed).await;
        let (offer, auto_accept) = committed.value;

        self.metrics.offer_outcome("updated");
        self.publish(MarketEvent::OfferUpdated {
            offer: offer.clone(),
        });
        info!(offer_id = %offer_id, price = offer.price, "offer updated");

        if auto_accept {
            self.schedule_auto_accept(offer_id);
        } else {
            self.scheduler.cancel(offer_id);
        }

        Ok(offer)
    }

    /// Customer acceptance. Runs the whole accept protocol as one unit of work:
    /// re-check, accept the offer, decline its siblings, close the request and
    /// create the delivery.
    pub async fn accept_offer(&self, caller: &Caller, offer_id: Uuid) -> Result<AcceptedOffer, AppError> {
        let request_id = self.request_of(offer_id)?;
        self.accept(request_id, offer_id, AcceptActor::Customer(caller.user_id))
            .await
    }

    /// Auto-accept attempt for one offer. Any reason the offer can no longer be
    /// accepted turns this into a no-op.
    pub async fn try_auto_accept(&self, offer_id: Uuid) -> Option<AcceptedOffer> {
        let Some(offer) = self.store.offer(offer_id) else {
            debug!(offer_id = %offer_id, "auto-accept skipped: offer not found");
            return None;
        };

        match self
            .accept(offer.delivery_request_id, offer_id, AcceptActor::Automatic)
            .await
        {
            Ok(accepted) => Some(accepted),
            Err(err) => {
                debug!(offer_id = %offer_id, reason = %err, "auto-accept skipped");
                None
            }
        }
    }

    /// Accepts the best pending offer on `request_id` that sits within the
    /// auto-accept threshold and has been visible for the configured delay.
    /// Called on reads and writes touching the request and by the sweep, so a
    /// lost timer never loses the auto-accept.
    pub async fn reconcile_auto_accept(&self, request_id: Uuid) -> bool {
        let Some(record) = self.store.record(request_id) else {
            return false;
        };

        let now = self.clock.now();
        let request = &record.request;
        if request.auto_accept_price.is_none() || !request.can_receive_offers(now) {
            return false;
        }

        let visible_after =
            chrono::Duration::from_std(self.settings.auto_accept_delay)
                .unwrap_or_else(|_| chrono::Duration::zero());
        let candidate = record
            .offers
            .iter()
            .filter(|offer| {
                offer.can_be_accepted(now)
                    && request.qualifies_for_auto_accept(offer.price)
                    && offer.updated_at + visible_after <= now
            })
            .min_by(|a, b| {
                a.price
                    .total_cmp(&b.price)
                    .then_with(|| a.created_at.cmp(&b.created_at))
            });

        match candidate {
            Some(offer) => self.try_auto_accept(offer.id).await.is_some(),
            None => false,
        }
    }

    async fn accept(
        &self,
        request_id: Uuid,
        offer_id: Uuid,
        actor: AcceptActor,
    ) -> Result<AcceptedOffer, AppError> {
        let now = self.clock.now();
        let result = self
            .store
            .transaction(request_id, |unit| {
                if let AcceptActor::Customer(caller_id) = actor {
                    if unit.request().customer_id != caller_id {
                        return Err(AppError::Forbidden(
                            "only the request owner can accept offers".to_string(),
                        ));
                    }
                }

                let offer = unit.offer(offer_id)?;
                ensure_pending(offer)?;
                if offer.is_stale(now) {
                    return Err(AppError::Conflict(format!("offer {offer_id} has expired")));
                }
                let request = unit.request();
                if !request.can_receive_offers(now) {
                    return Err(AppError::Conflict(format!(
                        "request {request_id} is no longer accepting offers"
                    )));
                }
                if request.is_blacklisted(offer.traveler_id) {
                    return Err(AppError::Conflict(
                        "traveler has been blacklisted for this request".to_string(),
                    ));
                }
                if matches!(actor, AcceptActor::Automatic)
                    && !request.qualifies_for_auto_accept(offer.price)
                {
                    return Err(AppError::Conflict(
                        "offer no longer qualifies for auto-accept".to_string(),
                    ));
                }
                let customer_id = request.customer_id;

                let accepted = unit.offer_mut(offer_id)?;
                accepted.mark_accepted(now);
                let accepted = accepted.clone();

                let declined = unit.decline_pending(Some(offer_id), DECLINED_OTHER_ACCEPTED, now);

                let request = unit.request_mut();
                request.status = RequestStatus::Accepted;
                request.accepted_offer_id = Some(offer_id);
                request.updated_at = now;

                let delivery = Delivery {
                    id: Uuid::new_v4(),
                    delivery_request_id: request_id,
                    offer_id,
                    customer_id,
                    traveler_id: accepted.traveler_id,
                    final_price: accepted.price,
                    status: DeliveryStatus::Accepted,
                    created_at: now,
                };
                unit.create_delivery(delivery.clone())?;

                Ok(AcceptedOffer {
                    offer: accepted,
                    delivery,
                    declined_offers: declined,
                })
            })
            .await;

        let committed = match result {
            Ok(committed) => committed,
            Err(err) => {
                if err.is_conflict() {
                    self.metrics.accept_conflicts_total.inc();
                }
                return Err(err);
            }
        };

        self.finish(&committed).await;
        let accepted = committed.value;
        self.scheduler.cancel(offer_id);
        self.scheduler.cancel_all(&accepted.declined_offers);

        let automatic = matches!(actor, AcceptActor::Automatic);
        self.metrics
            .offer_outcome(if automatic { "auto_accepted" } else { "accepted" });
        self.publish(MarketEvent::OfferAccepted {
            offer: accepted.offer.clone(),
            delivery: accepted.delivery.clone(),
            automatic,
            declined_offers: accepted.declined_offers.clone(),
        });
        info!(
            request_id = %request_id,
            offer_id = %offer_id,
            delivery_id = %accepted.delivery.id,
            final_price = accepted.delivery.final_price,
            declined = accepted.declined_offers.len(),
            automatic,
            "offer accepted"
        );

        Ok(accepted)
    }

    pub async fn decline_offer(
        &self,
        caller: &Caller,
        offer_id: Uuid,
        reason: Option<String>,
    ) -> Result<DeliveryOffer, AppError> {
        validate_message(reason.as_deref())?;
        let now = self.clock.now();
        let request_id = self.request_of(offer_id)?;

        let committed = self
            .store
            .transaction(request_id, |unit| {
                if unit.request().customer_id != caller.user_id {
                    return Err(AppError::Forbidden(
                        "only the request owner can decline offers".to_string(),
                    ));
                }
                ensure_pending(unit.offer(offer_id)?)?;

                let offer = unit.offer_mut(offer_id)?;
                offer.mark_declined(now, reason);
                Ok(offer.clone())
            })
            .await?;

        self.finish(&committed).await;
        self.scheduler.cancel(offer_id);
        let offer = committed.value;

        self.metrics.offer_outcome("declined");
        self.publish(MarketEvent::OfferDeclined {
            offer: offer.clone(),
        });
        info!(request_id = %request_id, offer_id = %offer_id, "offer declined");

        Ok(offer)
    }

    pub async fn withdraw_offer(&self, caller: &Caller, offer_id: Uuid) -> Result<DeliveryOffer, AppError> {
        let now = self.clock.now();
        let request_id = self.request_of(offer_id)?;

        let committed = self
            .store
            .transaction(request_id, |unit| {
                let current = unit.offer(offer_id)?;
                if current.traveler_id != caller.user_id {
                    return Err(AppError::Forbidden(
                        "only the offering traveler can withdraw this offer".to_string(),
                    ));
                }
                ensure_pending(current)?;

                let offer = unit.offer_mut(offer_id)?;
                offer.mark_withdrawn(now);
                Ok(offer.clone())
            })
            .await?;

        self.finish(&committed).await;
        self.scheduler.cancel(offer_id);
        let offer = committed.value;

        self.metrics.offer_outcome("withdrawn");
        self.publish(MarketEvent::OfferWithdrawn {
            offer: offer.clone(),
        });
        info!(request_id = %request_id, offer_id = %offer_id, "offer withdrawn");

        Ok(offer)
    }

    pub async fn get_offer(&self, caller: &Caller, offer_id: Uuid) -> Result<DeliveryOffer, AppError> {
        let offer = self.load_offer(offer_id).await?;
        let request = self.load_request(offer.delivery_request_id).await?;
        if !(caller.is_admin()
            || caller.user_id == offer.traveler_id
            || caller.user_id == request.customer_id)
        {
            return Err(AppError::Forbidden(
                "offer is visible to its traveler and the request owner only".to_string(),
            ));
        }

        if offer.status == OfferStatus::Pending
            && self.reconcile_auto_accept(offer.delivery_request_id).await
        {
            return self
                .store
                .offer(offer_id)
                .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")));
        }

        Ok(offer)
    }

    /// All offers for the request owner; a traveler sees only their own.
    pub async fn offers_for_request(
        &self,
        caller: &Caller,
        request_id: Uuid,
    ) -> Result<Vec<DeliveryOffer>, AppError> {
        let request = self.load_request(request_id).await?;
        if request.auto_accept_price.is_some() {
            self.reconcile_auto_accept(request_id).await;
        }

        let offers: Vec<DeliveryOffer> = self
            .cache
            .read_through(
                &CacheKey::RequestOffers(request_id),
                self.settings.entity_cache_ttl,
                || Ok::<_, AppError>(self.store.offers_for_request(request_id)),
            )
            .await?;

        if caller.is_admin() || caller.user_id == request.customer_id {
            return Ok(offers);
        }
        Ok(offers
            .into_iter()
            .filter(|offer| offer.traveler_id == caller.user_id)
            .collect())
    }

    pub async fn offers_for_traveler(&self, caller: &Caller) -> Vec<DeliveryOffer> {
        let Ok(offers) = self
            .cache
            .read_through(
                &CacheKey::TravelerOffers(caller.user_id),
                self.settings.entity_cache_ttl,
                || Ok::<_, Infallible>(self.store.offers_for_traveler(caller.user_id)),
            )
            .await;
        offers
    }

    pub async fn delivery_for_request(&self, caller: &Caller, request_id: Uuid) -> Result<Delivery, AppError> {
        let request = self
            .store
            .request(request_id)
            .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))?;
        if request.auto_accept_price.is_some() {
            self.reconcile_auto_accept(request_id).await;
        }

        let delivery = self
            .store
            .delivery_for_request(request_id)
            .ok_or_else(|| AppError::NotFound(format!("request {request_id} has no delivery")))?;

        if !(caller.is_admin()
            || caller.user_id == delivery.customer_id
            || caller.user_id == delivery.traveler_id)
        {
            return Err(AppError::Forbidden(
                "delivery is visible to its customer and traveler only".to_string(),
            ));
        }
        Ok(delivery)
    }

    /// Expires lapsed requests and stale pending offers, then retries any
    /// auto-accept that is due. Safe to run repeatedly and concurrently with
    /// the other transitions.
    pub async fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        for request_id in self.store.lapsed_requests(now) {
            let result = self
                .store
                .transaction(request_id, |unit| {
                    let request = unit.request();
                    if request.status != RequestStatus::Pending || request.expires_at > now {
                        return Ok(None);
                    }
                    let request = unit.request_mut();
                    request.status = RequestStatus::Expired;
                    request.updated_at = now;
                    Ok(Some(unit.expire_pending(now, true)))
                })
                .await;

            match result {
                Ok(committed) => {
                    self.finish(&committed).await;
                    if let Some(expired) = committed.value {
                        self.scheduler.cancel_all(&expired);
                        report.requests_expired += 1;
                        report.offers_expired += expired.len();
                        self.publish(MarketEvent::RequestExpired {
                            request_id,
                            expired_offers: expired,
                        });
                    }
                }
                Err(err) => warn!(request_id = %request_id, error = %err, "failed to expire request"),
            }
        }

        for request_id in self.store.requests_with_stale_offers(now) {
            let result = self
                .store
                .transaction(request_id, |unit| Ok(unit.expire_pending(now, false)))
                .await;

            match result {
                Ok(committed) => {
                    self.finish(&committed).await;
                    let expired = committed.value;
                    if !expired.is_empty() {
                        self.scheduler.cancel_all(&expired);
                        report.offers_expired += expired.len();
                        self.publish(MarketEvent::OffersExpired {
                            request_id,
                            offer_ids: expired,
                        });
                    }
                }
                Err(err) => warn!(request_id = %request_id, error = %err, "failed to expire offers"),
            }
        }

        for request_id in self.store.auto_accept_candidates(now) {
            if self.reconcile_auto_accept(request_id).await {
                report.auto_accepted += 1;
            }
        }

        report.cache_entries_purged = self.cache.purge_expired().await;

        self.metrics
            .sweep_transitions_total
            .with_label_values(&["offer"])
            .inc_by(report.offers_expired as u64);
        self.metrics
            .sweep_transitions_total
            .with_label_values(&["request"])
            .inc_by(report.requests_expired as u64);
        self.metrics
            .offers_total
            .with_label_values(&["expired"])
            .inc_by(report.offers_expired as u64);

        report
    }

    fn schedule_auto_accept(&self, offer_id: Uuid) {
        let service = self.clone();
        self.scheduler
            .schedule(offer_id, self.settings.auto_accept_delay, move || async move {
                service.try_auto_accept(offer_id).await;
            });
    }

    fn request_of(&self, offer_id: Uuid) -> Result<Uuid, AppError> {
        self.store
            .offer(offer_id)
            .map(|offer| offer.delivery_request_id)
            .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))
    }

    async fn load_offer(&self, offer_id: Uuid) -> Result<DeliveryOffer, AppError> {
        self.cache
            .read_through(
                &CacheKey::Offer(offer_id),
                self.settings.entity_cache_ttl,
                || {
                    self.store
                        .offer(offer_id)
                        .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))
                },
            )
            .await
    }

    async fn load_request(&self, request_id: Uuid) -> Result<DeliveryRequest, AppError> {
        self.cache
            .read_through(
                &CacheKey::Request(request_id),
                self.settings.entity_cache_ttl,
                || {
                    self.store
                        .request(request_id)
                        .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))
                },
            )
            .await
    }

    /// Post-commit bookkeeping shared by every write path: stale cache entries
    /// are removed before the caller hears about success.
    async fn finish<T>(&self, committed: &Committed<T>) {
        self.cache.invalidate(&committed.invalidations).await;
    }

    fn publish(&self, event: MarketEvent) {
        let _ = self.events.send(event);
    }
}

fn validate_price(price: f64) -> Result<(), AppError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(AppError::Validation(
            "offer price must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn check_price_ceiling(price: f64, request: &DeliveryRequest) -> Result<(), AppError> {
    if price > request.max_price {
        return Err(AppError::Validation(format!(
            "offer price {price} exceeds maximum price {}",
            request.max_price
        )));
    }
    Ok(())
}

fn validate_message(message: Option<&str>) -> Result<(), AppError> {
    if message.is_some_and(|text| text.chars().count() > MAX_MESSAGE_LEN) {
        return Err(AppError::Validation(format!(
            "message must be at most {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_estimates(
    pickup: Option<chrono::DateTime<Utc>>,
    delivery: Option<chrono::DateTime<Utc>>,
) -> Result<(), AppError> {
    if let (Some(pickup), Some(delivery)) = (pickup, delivery) {
        if delivery < pickup {
            return Err(AppError::Validation(
                "estimated delivery cannot precede estimated pickup".to_string(),
            ));
        }
    }
    Ok(())
}

fn ensure_pending(offer: &DeliveryOffer) -> Result<(), AppError> {
    if offer.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "offer {} is {:?}, not pending",
            offer.id, offer.status
        )));
    }
    Ok(())
}

fn check_traveler_minimums(caller: &Caller, request: &DeliveryRequest) -> Result<(), AppError> {
    if let Some(minimum) = request.min_traveler_rating {
        if caller.rating.is_none_or(|rating| rating < minimum) {
            return Err(AppError::Forbidden(format!(
                "traveler rating below the required {minimum}"
            )));
        }
    }
    if caller.verification < request.required_verification {
        return Err(AppError::Forbidden(
            "traveler verification below the required level".to_string(),
        ));
    }
    Ok(())
}
