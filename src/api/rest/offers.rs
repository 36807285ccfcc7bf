use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::offers::AcceptedOffer;
use crate::error::AppError;
use crate::models::identity::Caller;
use crate::models::offer::{DeliveryOffer, NewOffer, OfferUpdate};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/requests/:id/offers",
            post(submit_offer).get(list_request_offers),
        )
        .route("/offers", get(list_my_offers))
        .route("/offers/:id", get(get_offer).patch(update_offer))
        .route("/offers/:id/accept", post(accept_offer))
        .route("/offers/:id/decline", post(decline_offer))
        .route("/offers/:id/withdraw", post(withdraw_offer))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeclineRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

async fn submit_offer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<NewOffer>,
) -> Result<(StatusCode, Json<DeliveryOffer>), AppError> {
    let offer = state
        .offers
        .submit_offer(&caller, request_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

async fn list_request_offers(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Vec<DeliveryOffer>>, AppError> {
    Ok(Json(
        state.offers.offers_for_request(&caller, request_id).await?,
    ))
}

async fn list_my_offers(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Json<Vec<DeliveryOffer>> {
    Json(state.offers.offers_for_traveler(&caller).await)
}

async fn get_offer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOffer>, AppError> {
    Ok(Json(state.offers.get_offer(&caller, id).await?))
}

async fn update_offer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<OfferUpdate>,
) -> Result<Json<DeliveryOffer>, AppError> {
    Ok(Json(state.offers.update_offer(&caller, id, payload).await?))
}

async fn accept_offer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<AcceptedOffer>, AppError> {
    Ok(Json(state.offers.accept_offer(&caller, id).await?))
}

async fn decline_offer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Option<Json<DeclineRequest>>,
) -> Result<Json<DeliveryOffer>, AppError> {
    let reason = payload.and_then(|Json(body)| body.reason);
    Ok(Json(state.offers.decline_offer(&caller, id, reason).await?))
}

async fn withdraw_offer(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOffer>, AppError> {
    Ok(Json(state.offers.withdraw_offer(&caller, id).await?))
}
