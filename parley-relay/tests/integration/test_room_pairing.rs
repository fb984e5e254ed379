use tokio_tungstenite::tungstenite::Message;

use crate::integration::{connect, init_tracing, next, next_text, start_relay};

#[tokio::test]
async fn test_joiner_gets_connect_and_first_party_gets_connected_peer() {
    init_tracing();
    let addr = start_relay().await;

    let mut first = connect(addr, "1234567").await;
    assert_eq!(next_text(&mut first).await, r#"{"event":"connect"}"#);

    let mut second = connect(addr, "1234567").await;
    assert_eq!(next_text(&mut second).await, r#"{"event":"connect"}"#);
    assert_eq!(next_text(&mut first).await, r#"{"event":"connected peer"}"#);
}

#[tokio::test]
async fn test_third_party_is_refused() {
    init_tracing();
    let addr = start_relay().await;
    let mut a = connect(addr, "2222222").await;
    let mut b = connect(addr, "2222222").await;
    next_text(&mut a).await;
    next_text(&mut b).await;

    let mut c = connect(addr, "2222222").await;
    assert!(matches!(next(&mut c).await, Some(Message::Close(_)) | None));
}

#[tokio::test]
async fn test_invalid_room_is_rejected() {
    init_tracing();
    let addr = start_relay().await;

    let result = tokio_tungstenite::connect_async(format!("ws://{}/ws/abc", addr)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_departure_is_announced() {
    init_tracing();
    let addr = start_relay().await;
    let mut a = connect(addr, "3333333").await;
    next_text(&mut a).await;
    let mut b = connect(addr, "3333333").await;
    next_text(&mut b).await;
    next_text(&mut a).await;

    b.close(None).await.unwrap();
    assert_eq!(next_text(&mut a).await, r#"{"event":"disconnected peer"}"#);
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    init_tracing();
    let addr = start_relay().await;
    let mut a = connect(addr, "4444444").await;
    next_text(&mut a).await;
    let mut b = connect(addr, "5555555").await;
    next_text(&mut b).await;

    assert!(next(&mut a).await.is_none());
}
