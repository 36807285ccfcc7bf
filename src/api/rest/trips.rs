use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::carrier::{CandidateCarrier, TripStatus};
use crate::models::identity::Caller;
use crate::models::request::ItemCategory;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/trips", post(register_trip).get(list_trips))
}

/// A trip announced by the calling traveler. Rating and verification come
/// from the caller identity, not the body.
#[derive(Deserialize)]
pub struct RegisterTripRequest {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub departure_at: DateTime<Utc>,
    pub arrival_at: DateTime<Utc>,
    pub remaining_weight_kg: f64,
    #[serde(default)]
    pub remaining_volume_l: Option<f64>,
    pub remaining_items: u32,
    #[serde(default)]
    pub completed_deliveries: u32,
    #[serde(default)]
    pub accepted_categories: Vec<ItemCategory>,
    #[serde(default = "default_true")]
    pub accepts_fragile: bool,
    #[serde(default)]
    pub max_item_value: Option<f64>,
    #[serde(default)]
    pub departure_flexibility_hours: f64,
    #[serde(default)]
    pub price_per_kg: Option<f64>,
}

fn default_true() -> bool {
    true
}

async fn register_trip(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<RegisterTripRequest>,
) -> Result<(StatusCode, Json<CandidateCarrier>), AppError> {
    if !payload.origin.is_valid() || !payload.destination.is_valid() {
        return Err(AppError::Validation("coordinates are out of range".to_string()));
    }
    if payload.arrival_at <= payload.departure_at {
        return Err(AppError::Validation(
            "arrival must be after departure".to_string(),
        ));
    }
    if !payload.remaining_weight_kg.is_finite() || payload.remaining_weight_kg <= 0.0 {
        return Err(AppError::Validation(
            "remaining weight must be greater than zero".to_string(),
        ));
    }
    if payload.remaining_items == 0 {
        return Err(AppError::Validation(
            "remaining items must be at least 1".to_string(),
        ));
    }
    if !payload.departure_flexibility_hours.is_finite() || payload.departure_flexibility_hours < 0.0 {
        return Err(AppError::Validation(
            "departure flexibility cannot be negative".to_string(),
        ));
    }

    let trip = CandidateCarrier {
        trip_id: Uuid::new_v4(),
        traveler_id: caller.user_id,
        origin: payload.origin,
        destination: payload.destination,
        departure_at: payload.departure_at,
        arrival_at: payload.arrival_at,
        remaining_weight_kg: payload.remaining_weight_kg,
        remaining_volume_l: payload.remaining_volume_l,
        remaining_items: payload.remaining_items,
        rating: caller.rating.unwrap_or(0.0),
        completed_deliveries: payload.completed_deliveries,
        verification: caller.verification,
        accepted_categories: payload.accepted_categories,
        accepts_fragile: payload.accepts_fragile,
        max_item_value: payload.max_item_value,
        departure_flexibility_hours: payload.departure_flexibility_hours,
        price_per_kg: payload.price_per_kg,
        status: TripStatus::Upcoming,
    };

    state.trips.register(trip.clone());
    info!(
        trip_id = %trip.trip_id,
        traveler_id = %trip.traveler_id,
        departure_at = %trip.departure_at,
        "trip registered"
    );

    Ok((StatusCode::CREATED, Json(trip)))
}

async fn list_trips(State(state): State<Arc<AppState>>) -> Json<Vec<CandidateCarrier>> {
    Json(state.trips.list())
}
