use routersim_core::Algorithm;

use crate::*;

async fn end_to_end(algorithm: Algorithm) {
    let mut net = TestNetwork::start(LINE, algorithm, None).unwrap();
    settle(20).await;

    let msg_id = net.node("A").send_user_message("D", "hello D").await;
    settle(2).await;

    let delivered = net.drain_deliveries();
    assert_eq!(delivered.len(), 1, "{delivered:?}");
    let d = &delivered[0];
    assert_eq!(d.msg_id, msg_id);
    assert_eq!(d.origin, "A");
    assert_eq!(d.relayed_by, "C");
    assert_eq!(d.text, "hello D");

    assert_eq!(net.node("D").stats().messages_delivered, 1);
    assert!(net.node("B").stats().messages_forwarded >= 1);

    net.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn distance_vector_delivers_across_the_line() {
    end_to_end(Algorithm::DistanceVector).await;
}

#[tokio::test(start_paused = true)]
async fn link_state_delivers_across_the_line() {
    end_to_end(Algorithm::LinkState).await;
}

#[tokio::test(start_paused = true)]
async fn flooding_delivers_exactly_once_in_a_cycle() {
    let mut net = TestNetwork::start(SQUARE, Algorithm::Flooding, None).unwrap();
    settle(5).await;

    net.node("A").send_user_message("C", "around").await;
    settle(2).await;

    let delivered = net.drain_deliveries();
    assert_eq!(delivered.len(), 1, "{delivered:?}");
    assert_eq!(delivered[0].origin, "A");
    assert_eq!(net.node("C").stats().messages_delivered, 1);

    net.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn message_to_self_is_delivered_locally() {
    let mut net = TestNetwork::start(LINE, Algorithm::LinkState, None).unwrap();
    settle(1).await;

    net.node("B").send_user_message("B", "note").await;
    let delivered = net.drain_deliveries();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].origin, "B");

    net.shutdown().await.unwrap();
}
