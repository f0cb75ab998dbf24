use routersim_core::Algorithm;

use crate::*;

async fn line_converges(algorithm: Algorithm) {
    let net = TestNetwork::start(LINE, algorithm, None).unwrap();
    settle(20).await;

    let a = net.node("A").routing_table().await;
    for dest in ["B", "C", "D"] {
        assert_eq!(a.next_hop(dest).map(String::as_str), Some("B"), "A -> {dest}");
    }
    assert!(a.get("D").unwrap().cost >= 3.0);

    let d = net.node("D").routing_table().await;
    for dest in ["A", "B", "C"] {
        assert_eq!(d.next_hop(dest).map(String::as_str), Some("C"), "D -> {dest}");
    }

    let b = net.node("B").routing_table().await;
    assert_eq!(b.next_hop("A").map(String::as_str), Some("A"));
    assert_eq!(b.next_hop("D").map(String::as_str), Some("C"));
    assert!(b.get("B").is_none());

    net.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn distance_vector_converges_on_a_line() {
    line_converges(Algorithm::DistanceVector).await;
}

#[tokio::test(start_paused = true)]
async fn link_state_converges_on_a_line() {
    line_converges(Algorithm::LinkState).await;
}

#[tokio::test(start_paused = true)]
async fn flooding_keeps_no_routing_table() {
    let net = TestNetwork::start(LINE, Algorithm::Flooding, None).unwrap();
    settle(10).await;

    assert!(net.node("A").routing_table().await.is_empty());
    let neighbors = net.node("B").neighbors().await;
    assert_eq!(neighbors.len(), 2);
    assert!(neighbors.iter().all(|n| n.up));

    net.shutdown().await.unwrap();
}
