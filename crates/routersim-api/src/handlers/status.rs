//! /status and /routes handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use routersim_services::{NeighborStatus, StatsSnapshot};

use super::ApiState;

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub node_id: String,
    pub algorithm: String,
    pub neighbors: Vec<NeighborStatus>,
    pub routes: usize,
    pub counters: StatsSnapshot,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let table = state.node.routing_table().await;
    Json(StatusResponse {
        node_id: state.node.node_id().to_string(),
        algorithm: state.node.algorithm().to_string(),
        neighbors: state.node.neighbors().await,
        routes: table.len(),
        counters: state.node.stats(),
    })
}

// ── /routes ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct RoutesResponse {
    pub routes: Vec<RouteRow>,
}

#[derive(Serialize)]
pub struct RouteRow {
    pub destination: String,
    pub next_hop: String,
    pub cost: f64,
}

pub async fn handle_routes(State(state): State<ApiState>) -> Json<RoutesResponse> {
    let table = state.node.routing_table().await;
    let routes = table
        .iter()
        .map(|(dest, route)| RouteRow {
            destination: dest.clone(),
            next_hop: route.next_hop.clone(),
            cost: route.cost,
        })
        .collect();
    Json(RoutesResponse { routes })
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::handlers::messages::tests::state;
    use crate::router;

    #[tokio::test]
    async fn routes_lists_direct_neighbor() {
        let app = router(state());
        let resp = app
            .oneshot(Request::get("/api/routes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["routes"][0]["destination"], "B");
        assert_eq!(json["routes"][0]["next_hop"], "B");
    }

    #[tokio::test]
    async fn status_reports_node_and_neighbors() {
        let app = router(state());
        let resp = app
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["node_id"], "A");
        assert_eq!(json["algorithm"], "dvr");
        assert_eq!(json["neighbors"][0]["id"], "B");
        assert_eq!(json["counters"]["packets_received"], 0);
    }
}
