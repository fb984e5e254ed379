use crate::integration::{connect, init_tracing, next, next_text, send_text, start_relay};

#[tokio::test]
async fn test_signals_are_forwarded_verbatim_in_order() {
    init_tracing();
    let addr = start_relay().await;
    let mut a = connect(addr, "6666666").await;
    next_text(&mut a).await;
    let mut b = connect(addr, "6666666").await;
    next_text(&mut b).await;
    next_text(&mut a).await;

    let offer = r#"{"event":"signal","data":{"description":{"type":"offer","sdp":"v=0"}}}"#;
    let candidate = r#"{"event":"signal","data":{"candidate":{"candidate":"","sdpMid":"0","sdpMLineIndex":0}}}"#;
    send_text(&mut a, offer).await;
    send_text(&mut a, candidate).await;

    assert_eq!(next_text(&mut b).await, offer);
    assert_eq!(next_text(&mut b).await, candidate);
    // Nothing echoes back to the sender.
    assert!(next(&mut a).await.is_none());
}

#[tokio::test]
async fn test_non_signal_frames_are_not_forwarded() {
    init_tracing();
    let addr = start_relay().await;
    let mut a = connect(addr, "7777777").await;
    next_text(&mut a).await;
    let mut b = connect(addr, "7777777").await;
    next_text(&mut b).await;
    next_text(&mut a).await;

    send_text(&mut a, r#"{"event":"connect"}"#).await;
    send_text(&mut a, "not json").await;
    assert!(next(&mut b).await.is_none());
}
