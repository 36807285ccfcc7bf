use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::DateTime;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{CacheKey, CacheLayer};
use crate::directory::TripDirectory;
use crate::engine::clock::Clock;
use crate::engine::scoring::{score_candidate, MIN_MATCH_SCORE};
use crate::error::AppError;
use crate::geo::detour_km;
use crate::models::carrier::{CandidateCarrier, TripQuery, TripStatus};
use crate::models::matching::{CarrierMatch, MatchCriteria, MatchResult};
use crate::models::request::DeliveryRequest;
use crate::observability::metrics::Metrics;
use crate::store::Store;

pub const MAX_MATCHES: usize = 10;

#[derive(Serialize, Deserialize)]
struct CachedMatches {
    request_version: u64,
    result: MatchResult,
}

/// Finds and ranks carriers for a request. Read-only: it never mutates
/// request or offer state.
#[derive(Clone)]
pub struct MatchingEngine {
    store: Arc<Store>,
    directory: Arc<dyn TripDirectory>,
    cache: CacheLayer,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    directory_timeout: Duration,
    cache_ttl: Duration,
}

impl MatchingEngine {
    pub fn new(
        store: Arc<Store>,
        directory: Arc<dyn TripDirectory>,
        cache: CacheLayer,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
        directory_timeout: Duration,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            directory,
            cache,
            clock,
            metrics,
            directory_timeout,
            cache_ttl,
        }
    }

    pub async fn find_matches(
        &self,
        request_id: Uuid,
        criteria: MatchCriteria,
    ) -> Result<MatchResult, AppError> {
        criteria.validate()?;

        let request = self
            .store
            .request(request_id)
            .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))?;

        let now = self.clock.now();
        if !request.can_receive_offers(now) {
            return Err(AppError::Conflict(format!(
                "request {request_id} is no longer open for offers"
            )));
        }

        let key = CacheKey::Matches {
            request_id,
            criteria,
        };
        if let Some(cached) = self.cache.get_json::<CachedMatches>(&key).await {
            if cached.request_version == request.version && cached.result.criteria == criteria {
                self.metrics
                    .match_requests_total
                    .with_label_values(&["cached"])
                    .inc();
                debug!(request_id = %request_id, "serving matches from cache");
                return Ok(cached.result);
            }
        }

        let start = Instant::now();
        let (candidates, degraded) = self.discover(&request, &criteria).await;
        let candidate_count = candidates.len();
        let matches = rank_candidates(&request, &criteria, candidates);

        let result = MatchResult {
            request_id,
            criteria,
            matches,
            degraded,
            generated_at: now,
        };

        let outcome = if degraded { "degraded" } else { "ok" };
        self.metrics
            .match_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .match_requests_total
            .with_label_values(&[outcome])
            .inc();

        if !degraded {
            let entry = CachedMatches {
                request_version: request.version,
                result: result.clone(),
            };
            self.cache.set_json(&key, &entry, self.cache_ttl).await;
        }

        info!(
            request_id = %request_id,
            candidates = candidate_count,
            matches = result.matches.len(),
            degraded,
            "matches computed"
        );

        Ok(result)
    }

    /// Queries the trip directory under a timeout. Failures degrade to an
    /// empty candidate set.
    async fn discover(
        &self,
        request: &DeliveryRequest,
        criteria: &MatchCriteria,
    ) -> (Vec<CandidateCarrier>, bool) {
        let query = trip_query(request, criteria);

        match tokio::time::timeout(self.directory_timeout, self.directory.search_trips(&query)).await
        {
            Ok(Ok(candidates)) => (candidates, false),
            Ok(Err(err)) => {
                self.metrics
                    .directory_failures_total
                    .with_label_values(&["error"])
                    .inc();
                warn!(request_id = %request.id, error = %err, "trip directory failed; returning no candidates");
                (Vec::new(), true)
            }
            Err(_) => {
                self.metrics
                    .directory_failures_total
                    .with_label_values(&["timeout"])
                    .inc();
                warn!(
                    request_id = %request.id,
                    timeout_ms = self.directory_timeout.as_millis() as u64,
                    "trip directory timed out; returning no candidates"
                );
                (Vec::new(), true)
            }
        }
    }
}

pub fn trip_query(request: &DeliveryRequest, criteria: &MatchCriteria) -> TripQuery {
    let flexibility = hours(criteria.time_flexibility);

    TripQuery {
        origin: request.pickup.point,
        origin_radius_km: criteria.max_distance,
        destination: request.dropoff.point,
        destination_radius_km: criteria.max_distance,
        departure_from: shift(request.pickup.window.start, -flexibility),
        departure_to: shift(request.pickup.window.end, flexibility),
        min_weight_kg: request.item.weight_kg,
        min_items: request.item.quantity,
        status: TripStatus::Upcoming,
    }
}

/// Detour filter, scoring, threshold and top-N selection.
pub fn rank_candidates(
    request: &DeliveryRequest,
    criteria: &MatchCriteria,
    candidates: Vec<CandidateCarrier>,
) -> Vec<CarrierMatch> {
    let mut matches: Vec<CarrierMatch> = candidates
        .into_iter()
        .filter(|carrier| {
            carrier.traveler_id != request.customer_id && !request.is_blacklisted(carrier.traveler_id)
        })
        .filter(|carrier| {
            let detour = detour_km(
                &carrier.origin,
                &request.pickup.point,
                &request.dropoff.point,
                &carrier.destination,
            );
            detour <= criteria.max_detour
        })
        .map(|carrier| score_candidate(request, &carrier, criteria))
        .filter(|candidate| candidate.score >= MIN_MATCH_SCORE)
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.features.detour_km.total_cmp(&b.features.detour_km))
            .then_with(|| a.trip_id.cmp(&b.trip_id))
    });
    matches.truncate(MAX_MATCHES);
    matches
}

fn hours(value: f64) -> chrono::Duration {
    chrono::Duration::milliseconds((value * 3_600_000.0) as i64)
}

fn shift(at: DateTime<Utc>, by: chrono::Duration) -> DateTime<Utc> {
    at.checked_add_signed(by).unwrap_or(at)
}
