use parley_engine::{EngineConfig, SessionNotice};
use serde_json::json;
use tokio::task::LocalSet;

use crate::integration::{init_tracing, spawn_session};
use crate::utils::{recv_matching, wait_until};

#[tokio::test]
async fn test_full_state_is_announced_on_open() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let h = spawn_session(EngineConfig::default()).await;
            h.handle.join();
            let ep = h.factory.endpoint(0);
            assert!(wait_until(|| ep.channel("features").is_some(), 2000).await);

            ep.open("features");
            let features = ep.channel("features").unwrap();
            assert!(wait_until(|| features.sent().len() == 1, 2000).await);
            assert_eq!(features.sent_json()[0], json!({"audio": false}));
        })
        .await;
}

#[tokio::test]
async fn test_change_is_shared_only_once_open() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let h = spawn_session(EngineConfig::default()).await;
            h.handle.join();
            let ep = h.factory.endpoint(0);
            assert!(wait_until(|| ep.channel("features").is_some(), 2000).await);
            let features = ep.channel("features").unwrap();

            h.handle.set_feature("audio", true);
            assert!(
                wait_until(|| h.me.borrow().features.get("audio") == Some(&true), 2000).await
            );
            assert!(features.sent().is_empty());

            ep.open("features");
            assert!(wait_until(|| features.sent().len() == 1, 2000).await);
            assert_eq!(features.sent_json()[0], json!({"audio": true}));

            h.handle.set_feature("video", false);
            assert!(wait_until(|| features.sent().len() == 2, 2000).await);
            assert_eq!(features.sent_json()[1], json!({"video": false}));
        })
        .await;
}

#[tokio::test]
async fn test_peer_announcement_is_merged_and_reported() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let mut h = spawn_session(EngineConfig::default()).await;
            h.handle.join();
            let ep = h.factory.endpoint(0);
            assert!(wait_until(|| ep.has_sink(), 2000).await);

            ep.deliver("features", r#"{"audio":true,"screen":true}"#);
            let changed = recv_matching(&mut h.notices, 2000, |n| match n {
                SessionNotice::PeerFeatureChanged { name, enabled } => Some((name, enabled)),
                _ => None,
            })
            .await;
            assert_eq!(changed, Some(("audio".to_string(), true)));

            let peer = h.peer.borrow();
            assert_eq!(peer.features.get("audio"), Some(&true));
            assert_eq!(peer.features.get("screen"), Some(&true));
        })
        .await;
}
