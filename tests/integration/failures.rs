use std::time::Duration;

use routersim_core::Algorithm;

use crate::*;

async fn reroutes_around_dead_node(algorithm: Algorithm) {
    let mut net = TestNetwork::start(SQUARE, algorithm, Some(Duration::from_secs(3))).unwrap();
    settle(20).await;

    let a = net.node("A").routing_table().await;
    assert!(a.get("C").is_some());
    assert_eq!(a.next_hop("B").map(String::as_str), Some("B"));

    net.stop_node("B").await.unwrap();
    settle(30).await;

    let neighbors = net.node("A").neighbors().await;
    let b = neighbors.iter().find(|n| n.id == "B").unwrap();
    assert!(!b.up);
    assert_eq!(b.cost, None);

    let a = net.node("A").routing_table().await;
    assert_eq!(a.next_hop("C").map(String::as_str), Some("D"));

    let msg_id = net.node("A").send_user_message("C", "detour").await;
    settle(2).await;
    let delivered = net.drain_deliveries();
    assert_eq!(delivered.len(), 1, "{delivered:?}");
    assert_eq!(delivered[0].msg_id, msg_id);
    assert_eq!(delivered[0].relayed_by, "D");

    net.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn distance_vector_reroutes_when_a_node_dies() {
    reroutes_around_dead_node(Algorithm::DistanceVector).await;
}

#[tokio::test(start_paused = true)]
async fn link_state_reroutes_when_a_node_dies() {
    reroutes_around_dead_node(Algorithm::LinkState).await;
}
