use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use courier_match::api::rest::router;
use courier_match::config::Config;
use courier_match::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn setup() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(&Config::default()));
    (router(state.clone()), state)
}

struct Actor {
    user_id: Uuid,
    role: &'static str,
    rating: Option<&'static str>,
    verification: Option<&'static str>,
}

impl Actor {
    fn customer() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            role: "customer",
            rating: None,
            verification: None,
        }
    }

    fn traveler() -> Self {
        Self {
            user_id: Uuid::new_v4(),
            role: "traveler",
            rating: Some("4.8"),
            verification: Some("verified"),
        }
    }

    fn builder(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", self.user_id.to_string())
            .header("x-user-role", self.role);
        if let Some(rating) = self.rating {
            builder = builder.header("x-user-rating", rating);
        }
        if let Some(verification) = self.verification {
            builder = builder.header("x-user-verification", verification);
        }
        builder
    }

    fn json(&self, method: &str, uri: &str, body: Value) -> Request<Body> {
        self.builder(method, uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    fn get(&self, uri: &str) -> Request<Body> {
        self.builder("GET", uri).body(Body::empty()).unwrap()
    }

    fn post(&self, uri: &str) -> Request<Body> {
        self.builder("POST", uri).body(Body::empty()).unwrap()
    }
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn request_body() -> Value {
    let now = Utc::now();
    json!({
        "item": { "weight_kg": 2.5, "category": "electronics", "fragile": true },
        "pickup": {
            "point": { "lat": 52.52, "lng": 13.405 },
            "window": {
                "start": (now + Duration::hours(2)).to_rfc3339(),
                "end": (now + Duration::hours(6)).to_rfc3339()
            }
        },
        "dropoff": {
            "point": { "lat": 52.39, "lng": 13.065 },
            "window": {
                "start": (now + Duration::hours(4)).to_rfc3339(),
                "end": (now + Duration::hours(10)).to_rfc3339()
            }
        },
        "max_price": 50.0
    })
}

async fn create_request(app: &axum::Router, owner: &Actor) -> Value {
    let response = app
        .clone()
        .oneshot(owner.json("POST", "/requests", request_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn submit_offer(
    app: &axum::Router,
    traveler: &Actor,
    request_id: &str,
    price: f64,
) -> axum::response::Response {
    app.clone()
        .oneshot(traveler.json(
            "POST",
            &format!("/requests/{request_id}/offers"),
            json!({ "price": price, "message": "heading there anyway" }),
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["requests"], 0);
    assert_eq!(body["offers"], 0);
    assert_eq!(body["deliveries"], 0);
    assert_eq!(body["trips"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("scheduled_auto_accepts"));
    assert!(body.contains("accept_conflicts_total"));
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/requests")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("identity"));
}

#[tokio::test]
async fn create_request_returns_pending_request() {
    let (app, _state) = setup();
    let owner = Actor::customer();

    let body = create_request(&app, &owner).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["customer_id"], owner.user_id.to_string());
    assert_eq!(body["max_price"], 50.0);
    assert_eq!(body["item"]["quantity"], 1);
    assert_eq!(body["expires_at"], body["pickup"]["window"]["end"]);

    let id = body["id"].as_str().unwrap();
    let response = app
        .clone()
        .oneshot(Actor::traveler().get(&format!("/requests/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(owner.get("/requests")).await.unwrap();
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn create_request_rejects_bad_input() {
    let (app, _state) = setup();
    let owner = Actor::customer();

    let mut body = request_body();
    body["max_price"] = json!(0.0);
    let response = app
        .clone()
        .oneshot(owner.json("POST", "/requests", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut body = request_body();
    body["auto_accept_price"] = json!(80.0);
    let response = app
        .clone()
        .oneshot(owner.json("POST", "/requests", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut body = request_body();
    body["pickup"]["point"]["lat"] = json!(123.0);
    let response = app
        .oneshot(owner.json("POST", "/requests", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_request_returns_404() {
    let (app, _state) = setup();
    let response = app
        .oneshot(Actor::customer().get(&format!("/requests/{}", Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn offer_above_max_price_is_a_bad_request() {
    let (app, _state) = setup();
    let owner = Actor::customer();
    let request = create_request(&app, &owner).await;
    let request_id = request["id"].as_str().unwrap();

    let response = submit_offer(&app, &Actor::traveler(), request_id, 60.0).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("exceeds maximum price"));
}

#[tokio::test]
async fn offer_accept_flow_over_http() {
    let (app, state) = setup();
    let owner = Actor::customer();
    let winner = Actor::traveler();
    let loser = Actor::traveler();
    let request = create_request(&app, &owner).await;
    let request_id = request["id"].as_str().unwrap();

    let response = submit_offer(&app, &winner, request_id, 30.0).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let winning = body_json(response).await;
    assert_eq!(winning["status"], "pending");
    let winning_id = winning["id"].as_str().unwrap().to_string();

    let response = submit_offer(&app, &loser, request_id, 35.0).await;
    let losing_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(owner.get(&format!("/requests/{request_id}/offers")))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(loser.post(&format!("/offers/{winning_id}/accept")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(owner.post(&format!("/offers/{winning_id}/accept")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let accepted = body_json(response).await;
    assert_eq!(accepted["offer"]["status"], "accepted");
    assert_eq!(accepted["delivery"]["final_price"], 30.0);
    assert_eq!(accepted["delivery"]["status"], "accepted");
    assert_eq!(accepted["declined_offers"][0], losing_id);

    let response = app
        .clone()
        .oneshot(owner.post(&format!("/offers/{losing_id}/accept")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(loser.get(&format!("/offers/{losing_id}")))
        .await
        .unwrap();
    let declined = body_json(response).await;
    assert_eq!(declined["status"], "declined");
    assert_eq!(declined["declined_reason"], "another offer was accepted");

    let response = app
        .clone()
        .oneshot(winner.get(&format!("/requests/{request_id}/delivery")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["offer_id"], winning_id);

    let response = app
        .oneshot(owner.get(&format!("/requests/{request_id}")))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["status"], "accepted");
    assert_eq!(state.store.delivery_count(), 1);
}

#[tokio::test]
async fn traveler_updates_and_withdraws_offer() {
    let (app, _state) = setup();
    let owner = Actor::customer();
    let traveler = Actor::traveler();
    let request = create_request(&app, &owner).await;
    let request_id = request["id"].as_str().unwrap();

    let response = submit_offer(&app, &traveler, request_id, 30.0).await;
    let offer_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(traveler.json(
            "PATCH",
            &format!("/offers/{offer_id}"),
            json!({ "price": 27.5 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["price"], 27.5);

    let response = app
        .clone()
        .oneshot(traveler.get("/offers"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(traveler.post(&format!("/offers/{offer_id}/withdraw")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "withdrawn");

    let response = app
        .oneshot(traveler.post(&format!("/offers/{offer_id}/withdraw")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn customer_declines_offer_with_reason() {
    let (app, _state) = setup();
    let owner = Actor::customer();
    let request = create_request(&app, &owner).await;
    let request_id = request["id"].as_str().unwrap();

    let response = submit_offer(&app, &Actor::traveler(), request_id, 30.0).await;
    let offer_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(owner.json(
            "POST",
            &format!("/offers/{offer_id}/decline"),
            json!({ "reason": "found someone closer" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "declined");
    assert_eq!(body["declined_reason"], "found someone closer");
}

#[tokio::test]
async fn cancel_and_blacklist_routes() {
    let (app, _state) = setup();
    let owner = Actor::customer();
    let traveler = Actor::traveler();
    let request = create_request(&app, &owner).await;
    let request_id = request["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(owner.json(
            "POST",
            &format!("/requests/{request_id}/blacklist"),
            json!({ "traveler_id": traveler.user_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["blacklisted_travelers"][0], traveler.user_id.to_string());

    let response = submit_offer(&app, &traveler, request_id, 30.0).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(traveler.post(&format!("/requests/{request_id}/cancel")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(owner.post(&format!("/requests/{request_id}/cancel")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "cancelled");

    let response = submit_offer(&app, &Actor::traveler(), request_id, 30.0).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn registered_trip_shows_up_in_matches() {
    let (app, _state) = setup();
    let owner = Actor::customer();
    let carrier = Actor::traveler();
    let request = create_request(&app, &owner).await;
    let request_id = request["id"].as_str().unwrap();

    let departure = Utc::now() + Duration::hours(3);
    let response = app
        .clone()
        .oneshot(carrier.json(
            "POST",
            "/trips",
            json!({
                "origin": { "lat": 52.52, "lng": 13.40 },
                "destination": { "lat": 52.39, "lng": 13.07 },
                "departure_at": departure.to_rfc3339(),
                "arrival_at": (departure + Duration::hours(1)).to_rfc3339(),
                "remaining_weight_kg": 3.0,
                "remaining_items": 2,
                "completed_deliveries": 12,
                "departure_flexibility_hours": 2.0,
                "price_per_kg": 6.0
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let trip = body_json(response).await;
    assert_eq!(trip["traveler_id"], carrier.user_id.to_string());
    assert_eq!(trip["rating"], 4.8);
    assert_eq!(trip["status"], "upcoming");

    let response = app.clone().oneshot(owner.get("/trips")).await.unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(owner.get(&format!(
            "/requests/{request_id}/matches?maxDistance=30&maxDetour=10&timeFlexibility=12"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result = body_json(response).await;
    assert_eq!(result["degraded"], false);
    assert_eq!(result["criteria"]["maxDistance"], 30.0);
    let matches = result["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["trip_id"], trip["trip_id"]);
    assert_eq!(matches[0]["estimated_price"], 15.0);
    assert!(matches[0]["score"].as_f64().unwrap() >= 0.6);

    let response = app
        .oneshot(owner.get(&format!("/requests/{request_id}/matches?maxDetour=-1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
