use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::events::MarketEvent;
use crate::state::AppState;

/// `?request_id=` narrows the feed to one delivery request.
#[derive(Debug, Default, Deserialize)]
pub struct FeedFilter {
    pub request_id: Option<Uuid>,
}

impl FeedFilter {
    fn admits(&self, event: &MarketEvent) -> bool {
        self.request_id
            .map_or(true, |request_id| event.request_id() == request_id)
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<FeedFilter>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, filter))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, filter: FeedFilter) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.events_tx.subscribe();

    info!(request_id = ?filter.request_id, "market feed subscriber connected");

    let send_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "market feed subscriber lagging, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !filter.admits(&event) {
                continue;
            }

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize market event");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("market feed subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_admits_only_matching_request() {
        let watched = Uuid::new_v4();
        let event = MarketEvent::RequestCancelled {
            request_id: watched,
            declined_offers: vec![],
        };
        let other = MarketEvent::RequestCancelled {
            request_id: Uuid::new_v4(),
            declined_offers: vec![],
        };

        let filter = FeedFilter {
            request_id: Some(watched),
        };
        assert!(filter.admits(&event));
        assert!(!filter.admits(&other));
        assert!(FeedFilter::default().admits(&other));
    }
}
