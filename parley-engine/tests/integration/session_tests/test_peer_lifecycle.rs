use parley_engine::{ConnectionState, EndpointEvent, EngineConfig, RelayEvent, Role, SessionNotice};
use tokio::task::LocalSet;

use crate::integration::{init_tracing, spawn_session};
use crate::utils::{recv_matching, wait_until};

#[tokio::test]
async fn test_join_wires_channels_and_tracks() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let h = spawn_session(EngineConfig::default()).await;
            h.handle.join();
            let ep = h.factory.endpoint(0);

            assert!(wait_until(|| ep.tracks().len() == 1, 2000).await);
            assert_eq!(h.relay.opened(), 1);
            assert_eq!(
                ep.channel_labels(),
                vec!["features".to_string(), "text chat".to_string()]
            );
            let peer = h.peer.borrow();
            assert!(peer.chat_channel.is_some());
            assert!(peer.feature_channel.is_some());
        })
        .await;
}

#[tokio::test]
async fn test_second_party_makes_us_polite_once() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let mut h = spawn_session(EngineConfig::default()).await;
            h.handle.join();

            h.relay.push(RelayEvent::PeerJoined);
            h.relay.push(RelayEvent::PeerJoined);
            let role = recv_matching(&mut h.notices, 2000, |n| match n {
                SessionNotice::RoleAssigned(role) => Some(role),
                _ => None,
            })
            .await;
            assert_eq!(role, Some(Role::Polite));
            assert_eq!(h.me.borrow().role(), Role::Polite);
        })
        .await;
}

#[tokio::test]
async fn test_peer_leaving_resets_and_drops_stale_callbacks() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let mut h = spawn_session(EngineConfig::default()).await;
            h.handle.join();
            h.relay.push(RelayEvent::PeerJoined);
            let old = h.factory.endpoint(0);
            assert!(wait_until(|| old.tracks().len() == 1, 2000).await);
            old.fire(EndpointEvent::IncomingTrack(parley_engine::TrackInfo::local(
                parley_engine::TrackKind::Audio,
                "remote-mic",
            )));
            assert!(wait_until(|| h.peer.borrow().tracks.len() == 1, 2000).await);
            h.me.borrow_mut().flags.making_offer = true;

            h.relay.push(RelayEvent::PeerLeft);
            recv_matching(&mut h.notices, 2000, |n| match n {
                SessionNotice::RemoteMediaDetached => Some(()),
                _ => None,
            })
            .await
            .unwrap();

            assert!(old.is_closed());
            assert_eq!(h.factory.created(), 2);
            let fresh = h.factory.endpoint(1);
            assert!(wait_until(|| fresh.channel("text chat").is_some(), 2000).await);
            assert_eq!(h.peer.borrow().generation, 1);
            assert!(h.peer.borrow().tracks.is_empty());
            assert!(!h.me.borrow().flags.making_offer);
            // The role survives a peer leaving.
            assert_eq!(h.me.borrow().role(), Role::Polite);

            old.fire(EndpointEvent::ConnectionStateChanged(ConnectionState::Failed));
            fresh.fire(EndpointEvent::ConnectionStateChanged(ConnectionState::Connecting));
            let state = recv_matching(&mut h.notices, 2000, |n| match n {
                SessionNotice::ConnectionStateChanged(state) => Some(state),
                _ => None,
            })
            .await;
            assert_eq!(state, Some(ConnectionState::Connecting));
        })
        .await;
}

#[tokio::test]
async fn test_leave_closes_relay_and_forgets_role() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let mut h = spawn_session(EngineConfig::default()).await;
            h.handle.join();
            h.relay.push(RelayEvent::PeerJoined);
            recv_matching(&mut h.notices, 2000, |n| match n {
                SessionNotice::RoleAssigned(_) => Some(()),
                _ => None,
            })
            .await
            .unwrap();

            h.handle.leave();
            assert!(wait_until(|| h.factory.created() == 2, 2000).await);
            assert_eq!(h.relay.closed(), 1);
            assert_eq!(h.me.borrow().role(), Role::Impolite);
            assert!(h.factory.endpoint(0).is_closed());
            // Nothing is wired until the next join.
            assert!(!h.factory.endpoint(1).has_sink());
        })
        .await;
}

#[tokio::test]
async fn test_local_candidates_are_forwarded() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let h = spawn_session(EngineConfig::default()).await;
            h.handle.join();
            let ep = h.factory.endpoint(0);
            assert!(wait_until(|| ep.has_sink(), 2000).await);

            ep.fire(EndpointEvent::IceCandidate(
                parley_core::IceCandidate::end_of_candidates(),
            ));
            assert!(wait_until(|| h.relay.emitted().len() == 1, 2000).await);
            assert!(matches!(
                &h.relay.emitted()[0],
                parley_core::SignalEnvelope::Candidate(c) if c.is_end_of_candidates()
            ));
        })
        .await;
}

#[tokio::test]
async fn test_negotiation_needed_offers_through_relay() {
    init_tracing();
    LocalSet::new()
        .run_until(async {
            let h = spawn_session(EngineConfig::default()).await;
            h.handle.join();
            let ep = h.factory.endpoint(0);
            assert!(wait_until(|| ep.has_sink(), 2000).await);

            ep.fire(EndpointEvent::NegotiationNeeded);
            assert!(
                wait_until(
                    || h.relay.descriptions(parley_core::SdpType::Offer) == 1,
                    2000
                )
                .await
            );
            assert!(!h.me.borrow().flags.making_offer);
        })
        .await;
}
