use std::fmt;

use uuid::Uuid;

use crate::models::matching::MatchCriteria;
use crate::models::offer::DeliveryOffer;
use crate::models::request::DeliveryRequest;

/// Every cache entry the service reads or writes. Keys are only ever built
/// through this type so invalidation can enumerate them exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheKey {
    Request(Uuid),
    CustomerRequests(Uuid),
    RequestOffers(Uuid),
    Offer(Uuid),
    TravelerOffers(Uuid),
    Matches {
        request_id: Uuid,
        criteria: MatchCriteria,
    },
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Request(id) => write!(f, "request:{id}"),
            CacheKey::CustomerRequests(id) => write!(f, "customer:{id}:requests"),
            CacheKey::RequestOffers(id) => write!(f, "request:{id}:offers"),
            CacheKey::Offer(id) => write!(f, "offer:{id}"),
            CacheKey::TravelerOffers(id) => write!(f, "traveler:{id}:offers"),
            CacheKey::Matches {
                request_id,
                criteria,
            } => write!(f, "matches:{request_id}:{}", criteria.fingerprint()),
        }
    }
}

/// Keys made stale by a committed change to `request` and `touched` offers.
///
/// Match entries are not listed: they carry the request version they were
/// computed against and are discarded on read once that version moves on.
pub fn for_request_change(request: &DeliveryRequest, touched: &[DeliveryOffer]) -> Vec<CacheKey> {
    let mut keys = vec![
        CacheKey::Request(request.id),
        CacheKey::CustomerRequests(request.customer_id),
        CacheKey::RequestOffers(request.id),
    ];
    keys.extend(offer_keys(touched));
    dedup(keys)
}

/// Keys made stale when only offers changed and the request row did not.
pub fn for_offer_change(request_id: Uuid, touched: &[DeliveryOffer]) -> Vec<CacheKey> {
    let mut keys = vec![CacheKey::RequestOffers(request_id)];
    keys.extend(offer_keys(touched));
    dedup(keys)
}

fn offer_keys(offers: &[DeliveryOffer]) -> Vec<CacheKey> {
    offers
        .iter()
        .flat_map(|offer| {
            [
                CacheKey::Offer(offer.id),
                CacheKey::TravelerOffers(offer.traveler_id),
            ]
        })
        .collect()
}

fn dedup(keys: Vec<CacheKey>) -> Vec<CacheKey> {
    let mut unique: Vec<CacheKey> = Vec::with_capacity(keys.len());
    for key in keys {
        if !unique.contains(&key) {
            unique.push(key);
        }
    }
    unique
}
