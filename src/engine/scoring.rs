//! Additive rule-based compatibility scoring.
//!
//! Every candidate starts at [`BASE_SCORE`] and each feature adds or subtracts a
//! bounded increment. Each rule is monotone in its feature, so a candidate that
//! is closer, or needs a smaller detour, never scores below an otherwise
//! identical one.

use chrono::{DateTime, Utc};

use crate::geo::{detour_km, haversine_km};
use crate::models::carrier::CandidateCarrier;
use crate::models::identity::VerificationLevel;
use crate::models::matching::{CarrierMatch, MatchCriteria, MatchFeatures, ScoreBreakdown};
use crate::models::request::{DeliveryRequest, TimeWindow};

pub const BASE_SCORE: f64 = 0.5;
pub const MIN_MATCH_SCORE: f64 = 0.6;

pub fn extract_features(request: &DeliveryRequest, carrier: &CandidateCarrier) -> MatchFeatures {
    let item = &request.item;

    let volume_utilization = match (item.volume_l, carrier.remaining_volume_l) {
        (Some(volume), Some(remaining)) => Some(ratio(volume, remaining)),
        _ => None,
    };

    MatchFeatures {
        origin_distance_km: haversine_km(&carrier.origin, &request.pickup.point),
        destination_distance_km: haversine_km(&carrier.destination, &request.dropoff.point),
        detour_km: detour_km(
            &carrier.origin,
            &request.pickup.point,
            &request.dropoff.point,
            &carrier.destination,
        ),
        weight_utilization: ratio(item.weight_kg, carrier.remaining_weight_kg),
        volume_utilization,
        rating: carrier.rating,
        completed_deliveries: carrier.completed_deliveries,
        verification_tier: verification_tier(carrier.verification),
        category_compatible: carrier.accepts_category(item.category),
        fragile_compatible: !item.fragile || carrier.accepts_fragile,
        value_compatible: match (item.declared_value, carrier.max_item_value) {
            (Some(value), Some(limit)) => value <= limit,
            _ => true,
        },
        time_offset_hours: hours_outside(&request.pickup.window, carrier.departure_at),
        time_flexibility_hours: carrier.departure_flexibility_hours.max(0.0),
    }
}

pub fn compatibility_score(features: &MatchFeatures, criteria: &MatchCriteria) -> f64 {
    let mut score = BASE_SCORE;

    score += proximity_bonus(features.origin_distance_km);
    score += proximity_bonus(features.destination_distance_km);

    score += if features.detour_km < 5.0 {
        0.10
    } else if features.detour_km < 10.0 {
        0.05
    } else if features.detour_km > 15.0 {
        -0.10
    } else {
        0.0
    };

    score += if features.weight_utilization >= 0.7 {
        0.10
    } else if features.weight_utilization >= 0.4 {
        0.05
    } else {
        0.0
    };
    if features.volume_utilization.is_some_and(|volume| volume >= 0.7) {
        score += 0.05;
    }

    score += if features.rating >= 4.5 {
        0.15
    } else if features.rating >= 4.0 {
        0.10
    } else if features.rating < 3.0 {
        -0.20
    } else {
        0.0
    };

    score += if features.completed_deliveries >= 50 {
        0.10
    } else if features.completed_deliveries >= 10 {
        0.05
    } else {
        0.0
    };

    score += match features.verification_tier {
        2 => 0.10,
        1 => 0.05,
        _ => 0.0,
    };

    if !features.category_compatible {
        score -= 0.30;
    }
    if !features.fragile_compatible {
        score -= 0.30;
    }
    if !features.value_compatible {
        score -= 0.20;
    }

    if features.time_offset_hours <= 2.0 {
        score += 0.10;
    } else if features.time_offset_hours > criteria.time_flexibility * 0.75 {
        score -= 0.10;
    }

    if features.time_flexibility_hours >= 2.0 {
        score += 0.05;
    }

    score.clamp(0.0, 1.0)
}

pub fn breakdown(
    features: &MatchFeatures,
    criteria: &MatchCriteria,
    request: &DeliveryRequest,
    estimated_price: Option<f64>,
) -> ScoreBreakdown {
    let route_budget = 2.0 * criteria.max_distance + criteria.max_detour;
    let route_cost =
        features.origin_distance_km + features.destination_distance_km + features.detour_km;

    ScoreBreakdown {
        route: unit(1.0 - route_cost / route_budget),
        timing: unit(1.0 - features.time_offset_hours / criteria.time_flexibility),
        capacity: unit(features.weight_utilization),
        price: estimated_price
            .map(|price| unit(1.0 - price / request.max_price))
            .unwrap_or(0.5),
        rating: unit(features.rating / 5.0),
    }
}

pub fn estimated_price(request: &DeliveryRequest, carrier: &CandidateCarrier) -> Option<f64> {
    carrier
        .price_per_kg
        .map(|rate| rate * request.item.weight_kg)
}

/// Scores one candidate end to end.
pub fn score_candidate(
    request: &DeliveryRequest,
    carrier: &CandidateCarrier,
    criteria: &MatchCriteria,
) -> CarrierMatch {
    let features = extract_features(request, carrier);
    let estimated_price = estimated_price(request, carrier);

    CarrierMatch {
        trip_id: carrier.trip_id,
        traveler_id: carrier.traveler_id,
        score: compatibility_score(&features, criteria),
        breakdown: breakdown(&features, criteria, request, estimated_price),
        features,
        estimated_price,
    }
}

fn proximity_bonus(distance_km: f64) -> f64 {
    if distance_km < 5.0 {
        0.20
    } else if distance_km < 15.0 {
        0.10
    } else if distance_km < 30.0 {
        0.05
    } else {
        0.0
    }
}

fn verification_tier(level: VerificationLevel) -> u8 {
    match level {
        VerificationLevel::Unverified => 0,
        VerificationLevel::Basic => 1,
        VerificationLevel::Verified => 2,
    }
}

fn ratio(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 1.0;
    }
    unit(part / whole)
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Hours by which `at` falls outside `window`; zero inside it.
fn hours_outside(window: &TimeWindow, at: DateTime<Utc>) -> f64 {
    let seconds = if at < window.start {
        (window.start - at).num_seconds()
    } else if at > window.end {
        (at - window.end).num_seconds()
    } else {
        0
    };
    seconds as f64 / 3600.0
}
