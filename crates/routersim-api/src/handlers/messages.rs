//! /inbox and /messages/send handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use routersim_core::now_ms;
use routersim_services::Delivery;

use super::ApiState;

// ── /inbox (GET) ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct InboxResponse {
    pub messages: Vec<Delivery>,
}

pub async fn handle_inbox(State(state): State<ApiState>) -> Json<InboxResponse> {
    Json(InboxResponse {
        messages: state.inbox.all(),
    })
}

// ── /messages/send (POST) ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub to: String,
    pub text: String,
}

#[derive(Serialize)]
pub struct SendMessageResponse {
    pub msg_id: String,
    pub timestamp: u64,
}

pub async fn handle_send_message(
    State(state): State<ApiState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, (StatusCode, String)> {
    if req.to.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "destination is empty".to_string()));
    }
    let timestamp = now_ms();
    let msg_id = state.node.send_user_message(&req.to, &req.text).await;
    tracing::info!(to = %req.to, msg_id = %msg_id, "message queued via API");
    Ok(Json(SendMessageResponse { msg_id, timestamp }))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use routersim_core::Algorithm;
    use routersim_services::{new_broker, ChannelTransport, EngineConfig, Inbox, NodeEngine};

    use crate::{router, ApiState};

    pub(crate) fn state() -> ApiState {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut neighbors = BTreeMap::new();
        neighbors.insert("B".to_string(), 1.0);
        let engine = NodeEngine::new(
            EngineConfig::new("A", Algorithm::DistanceVector),
            neighbors,
            Arc::new(ChannelTransport::unnamed("A", new_broker())),
            tx,
        );
        ApiState {
            node: engine.handle(),
            inbox: Inbox::new(),
        }
    }

    #[tokio::test]
    async fn send_returns_message_id() {
        let app = router(state());
        let req = Request::post("/api/messages/send")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"to":"A","text":"hi"}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["msg_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn empty_destination_is_rejected() {
        let app = router(state());
        let req = Request::post("/api/messages/send")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"to":"","text":"hi"}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
