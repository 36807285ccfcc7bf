use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::delivery::Delivery;
use crate::models::identity::Caller;
use crate::models::matching::{MatchCriteria, MatchResult};
use crate::models::request::{DeliveryRequest, NewDeliveryRequest};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/cancel", post(cancel_request))
        .route("/requests/:id/blacklist", post(blacklist_traveler))
        .route("/requests/:id/matches", get(find_matches))
        .route("/requests/:id/delivery", get(get_delivery))
}

#[derive(Deserialize)]
pub struct BlacklistRequest {
    pub traveler_id: Uuid,
}

/// Match criteria as query parameters; anything omitted takes the default.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchQuery {
    pub max_distance: Option<f64>,
    pub max_detour: Option<f64>,
    pub time_flexibility: Option<f64>,
}

impl MatchQuery {
    fn criteria(&self) -> MatchCriteria {
        let defaults = MatchCriteria::default();
        MatchCriteria {
            max_distance: self.max_distance.unwrap_or(defaults.max_distance),
            max_detour: self.max_detour.unwrap_or(defaults.max_detour),
            time_flexibility: self.time_flexibility.unwrap_or(defaults.time_flexibility),
        }
    }
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<NewDeliveryRequest>,
) -> Result<(StatusCode, Json<DeliveryRequest>), AppError> {
    let request = state.requests.create_request(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn list_requests(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Json<Vec<DeliveryRequest>> {
    Json(state.requests.list_requests(&caller).await)
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    Ok(Json(state.requests.get_request(id).await?))
}

async fn cancel_request(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    Ok(Json(state.requests.cancel_request(&caller, id).await?))
}

async fn blacklist_traveler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<BlacklistRequest>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let request = state
        .requests
        .blacklist_traveler(&caller, id, payload.traveler_id)
        .await?;
    Ok(Json(request))
}

async fn find_matches(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<MatchQuery>,
) -> Result<Json<MatchResult>, AppError> {
    Ok(Json(state.matching.find_matches(id, query.criteria()).await?))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    Ok(Json(state.offers.delivery_for_request(&caller, id).await?))
}
